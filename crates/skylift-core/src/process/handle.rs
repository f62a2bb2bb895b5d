//! Child process ownership with merged output capture.
//!
//! A [`ManagedProcess`] owns one OS child and its combined stdout+stderr as
//! a line stream. Two reader tasks drain the OS pipes from the moment of
//! spawn, so an unread stream can never fill a pipe and stall the child.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::ProcessConfig;
use crate::error::{Result, SkyliftError};

/// Description of a command to run: program, arguments, working directory.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl ProcessSpec {
    /// Create a spec for the given program with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Split an opaque argument string on whitespace and append the tokens.
    pub fn args_str(mut self, raw: &str) -> Self {
        self.args.extend(raw.split_whitespace().map(String::from));
        self
    }

    /// Set the working directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// One-line rendering for log output.
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// What a single non-blocking read of a [`LineStream`] produced.
#[derive(Debug, PartialEq, Eq)]
pub enum PolledLine {
    Line(String),
    /// No line buffered right now; the stream is still open.
    Pending,
    /// Both pipes reached end of stream (the process has exited).
    Closed,
}

/// Exclusively-owned merged stdout+stderr line sequence of a child process.
///
/// Lines arrive lazily as the child emits them; the sequence is finite and
/// not restartable.
#[derive(Debug)]
pub struct LineStream {
    rx: mpsc::UnboundedReceiver<String>,
}

impl LineStream {
    /// Next line, waiting until one is available. `None` once the stream
    /// has ended.
    pub async fn next_line(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Non-blocking read, used by the bounded poll scanner.
    pub fn poll_line(&mut self) -> PolledLine {
        match self.rx.try_recv() {
            Ok(line) => PolledLine::Line(line),
            Err(mpsc::error::TryRecvError::Empty) => PolledLine::Pending,
            Err(mpsc::error::TryRecvError::Disconnected) => PolledLine::Closed,
        }
    }

    #[cfg(test)]
    pub(crate) fn from_receiver(rx: mpsc::UnboundedReceiver<String>) -> Self {
        Self { rx }
    }
}

/// An owned OS child process with a merged output stream and a termination
/// handle. Exactly one owner may terminate it.
#[derive(Debug)]
pub struct ManagedProcess {
    name: String,
    child: Child,
    lines: Option<LineStream>,
}

impl ManagedProcess {
    /// Spawn the command with stdout and stderr piped and merged into one
    /// line stream.
    ///
    /// Fails with [`SkyliftError::Spawn`] if the executable cannot be
    /// started (not found, permission denied).
    pub fn spawn(spec: &ProcessSpec) -> Result<Self> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Backstop only; the sequencer terminates children explicitly.
            .kill_on_drop(true);
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| SkyliftError::Spawn {
            program: spec.program.clone(),
            source: e,
        })?;

        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, tx);
        }

        debug!("Spawned {} (pid {:?})", spec.display(), child.id());

        Ok(Self {
            name: spec.program.clone(),
            child,
            lines: Some(LineStream { rx }),
        })
    }

    /// Program name this process was spawned from.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// OS process id, if the process has not been reaped yet.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Take exclusive ownership of the merged output stream.
    ///
    /// Returns `None` on the second and later calls; the stream has exactly
    /// one consumer.
    pub fn take_lines(&mut self) -> Option<LineStream> {
        self.lines.take()
    }

    /// Request termination and wait for the process to go away.
    ///
    /// Idempotent: terminating a process that has already exited is a no-op.
    /// Unix: SIGTERM, a bounded grace wait, then SIGKILL. The exit status is
    /// always reaped.
    pub async fn terminate(&mut self) -> Result<()> {
        if self.child.try_wait()?.is_some() {
            debug!("{} already exited", self.name);
            return Ok(());
        }

        #[cfg(unix)]
        if let Some(pid) = self.child.id() {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                Ok(()) => debug!("Sent SIGTERM to {} ({})", self.name, pid),
                Err(nix::errno::Errno::ESRCH) => return Ok(()),
                Err(e) => warn!("Failed to send SIGTERM to {} ({}): {}", self.name, pid, e),
            }
        }

        match tokio::time::timeout(ProcessConfig::TERM_GRACE, self.child.wait()).await {
            Ok(status) => {
                debug!("{} exited with {:?}", self.name, status?);
                Ok(())
            }
            Err(_) => {
                warn!(
                    "{} still running after {:?}, killing",
                    self.name,
                    ProcessConfig::TERM_GRACE
                );
                self.child.kill().await?;
                Ok(())
            }
        }
    }

    /// Wait for natural exit and return the status.
    pub async fn wait(&mut self) -> Result<ExitStatus> {
        Ok(self.child.wait().await?)
    }
}

fn forward_lines(reader: impl AsyncRead + Unpin + Send + 'static, tx: mpsc::UnboundedSender<String>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).is_err() {
                // Receiver gone. Keep reading so the pipe cannot fill and
                // stall the child.
                while let Ok(Some(_)) = lines.next_line().await {}
                break;
            }
        }
    });
}

/// Check whether a process with the given pid is alive.
#[cfg(unix)]
pub fn is_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    // Signal 0: existence check only.
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

#[cfg(not(unix))]
pub fn is_alive(_pid: u32) -> bool {
    false
}
