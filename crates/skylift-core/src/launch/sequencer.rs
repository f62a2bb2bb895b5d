//! Launch sequencing.
//!
//! Drives one launch through its phases: primary spawn, readiness wait,
//! tunnel spawn, URL discovery, fallback resolution, log streaming, and
//! teardown. Phases are strictly forward; `Streaming` is the terminal steady
//! state, and `Terminating` is reached from any phase on interruption or
//! when the primary process exits.
//!
//! The sequencer is the sole owner of both child processes and the only
//! component that requests their termination.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{fallback, readiness, tunnel};
use crate::cancel::CancellationToken;
use crate::config::{ServerConfig, TunnelConfig};
use crate::error::{Result, SkyliftError};
use crate::process::{ManagedProcess, ProcessSpec};

/// What to launch: the primary server command, the optional tunnel command,
/// the port the tunnel targets, and the wait budgets.
#[derive(Debug, Clone)]
pub struct LaunchPlan {
    pub primary: ProcessSpec,
    pub tunnel: Option<ProcessSpec>,
    pub port: u16,
    /// Whether to watch the primary's output for a readiness marker before
    /// starting the tunnel.
    pub await_readiness: bool,
    pub ready_attempts: u32,
    pub ready_poll: Duration,
    pub url_attempts: u32,
    pub url_poll: Duration,
}

impl LaunchPlan {
    /// Server-mode plan: `python -u main.py <args>` in the root directory,
    /// the tunnel client pointed at the bound port.
    pub fn server(root_dir: impl Into<PathBuf>, args: &str, port: u16) -> Self {
        let primary = ProcessSpec::new("python")
            .arg("-u")
            .arg("main.py")
            .args_str(args)
            .current_dir(root_dir);
        let tunnel_spec = ProcessSpec::new(TunnelConfig::BINARY_PATH)
            .arg("tunnel")
            .arg("--url")
            .arg(format!("http://127.0.0.1:{port}"));

        Self {
            primary,
            tunnel: Some(tunnel_spec),
            port,
            await_readiness: true,
            ready_attempts: ServerConfig::READY_MAX_ATTEMPTS,
            ready_poll: ServerConfig::READY_POLL_INTERVAL,
            url_attempts: TunnelConfig::URL_MAX_ATTEMPTS,
            url_poll: TunnelConfig::URL_POLL_INTERVAL,
        }
    }

    /// Script-mode plan: the script in the foreground, no tunnel, no
    /// readiness wait.
    pub fn script(root_dir: impl Into<PathBuf>, script_name: &str) -> Self {
        let primary = ProcessSpec::new("python")
            .arg("-u")
            .arg(script_name)
            .current_dir(root_dir);

        Self {
            primary,
            tunnel: None,
            port: ServerConfig::DEFAULT_PORT,
            await_readiness: false,
            ready_attempts: ServerConfig::READY_MAX_ATTEMPTS,
            ready_poll: ServerConfig::READY_POLL_INTERVAL,
            url_attempts: TunnelConfig::URL_MAX_ATTEMPTS,
            url_poll: TunnelConfig::URL_POLL_INTERVAL,
        }
    }

    /// Override the readiness wait budget.
    pub fn with_ready_budget(mut self, attempts: u32, poll: Duration) -> Self {
        self.ready_attempts = attempts;
        self.ready_poll = poll;
        self
    }

    /// Override the URL discovery wait budget.
    pub fn with_url_budget(mut self, attempts: u32, poll: Duration) -> Self {
        self.url_attempts = attempts;
        self.url_poll = poll;
        self
    }
}

/// Everything one run learned, for the caller's final summary.
#[derive(Debug, Clone, Default)]
pub struct LaunchReport {
    pub ready: bool,
    pub tunnel_url: Option<String>,
    pub fallback_url: Option<String>,
    pub interrupted: bool,
    pub primary_pid: Option<u32>,
    pub tunnel_pid: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    StartingPrimary,
    AwaitingReadiness,
    StartingTunnel,
    AwaitingUrl,
    ResolvingFallback,
    Streaming,
    Terminating,
}

/// Drives one launch. Sole owner and terminator of both child processes.
pub struct LaunchSequencer {
    plan: LaunchPlan,
    phase: Phase,
    primary: Option<ManagedProcess>,
    tunnel: Option<ManagedProcess>,
    report: LaunchReport,
}

impl LaunchSequencer {
    pub fn new(plan: LaunchPlan) -> Self {
        Self {
            plan,
            phase: Phase::StartingPrimary,
            primary: None,
            tunnel: None,
            report: LaunchReport::default(),
        }
    }

    /// Run the launch to completion.
    ///
    /// Returns `Ok` on natural primary exit and on operator interruption
    /// (after teardown). The only hard failure is a primary spawn error;
    /// readiness and discovery timeouts are soft and only shape the report.
    /// Both children are terminated on every exit path.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<LaunchReport> {
        let outcome = self.drive(cancel).await;

        self.enter(Phase::Terminating);
        self.terminate_children().await;

        match outcome {
            Ok(()) => Ok(self.report.clone()),
            Err(SkyliftError::Interrupted) => {
                info!("Interrupted; child processes terminated");
                self.report.interrupted = true;
                Ok(self.report.clone())
            }
            Err(e) => Err(e),
        }
    }

    async fn drive(&mut self, cancel: &CancellationToken) -> Result<()> {
        cancel.check()?;

        info!("Starting server: {}", self.plan.primary.display());
        let mut primary = ManagedProcess::spawn(&self.plan.primary)?;
        self.report.primary_pid = primary.id();
        let mut primary_lines = primary
            .take_lines()
            .ok_or_else(|| SkyliftError::Other("primary output stream already claimed".into()))?;
        self.primary = Some(primary);

        if self.plan.await_readiness {
            self.enter(Phase::AwaitingReadiness);
            let signal = tokio::select! {
                _ = cancel.cancelled() => return Err(SkyliftError::Interrupted),
                signal = readiness::await_ready(
                    &mut primary_lines,
                    ServerConfig::READY_MARKERS,
                    self.plan.ready_attempts,
                    self.plan.ready_poll,
                    print_line,
                ) => signal,
            };
            self.report.ready = signal.ready;
        }

        let mut discovery = None;
        if let Some(tunnel_spec) = self.plan.tunnel.clone() {
            self.enter(Phase::StartingTunnel);
            info!("Starting tunnel: {}", tunnel_spec.display());
            match ManagedProcess::spawn(&tunnel_spec) {
                Ok(mut tunnel_proc) => {
                    self.report.tunnel_pid = tunnel_proc.id();
                    if let Some(tunnel_lines) = tunnel_proc.take_lines() {
                        discovery = Some(tunnel::spawn_discovery(
                            tunnel_lines,
                            self.plan.url_attempts,
                            self.plan.url_poll,
                        ));
                    }
                    self.tunnel = Some(tunnel_proc);
                }
                Err(e) => {
                    warn!(
                        "Tunnel failed to start: {e}; the server stays reachable locally on port {}",
                        self.plan.port
                    );
                }
            }
        }

        if let Some(rx) = discovery {
            self.enter(Phase::AwaitingUrl);
            info!("Waiting for public URL (this takes ~10-15 seconds)...");
            let result = tokio::select! {
                _ = cancel.cancelled() => return Err(SkyliftError::Interrupted),
                result = rx => result.unwrap_or(tunnel::TunnelResult { url: None, lines_seen: 0 }),
            };
            match &result.url {
                Some(url) => print_url_banner(url),
                None => {
                    warn!(
                        "Could not capture the tunnel URL within the wait ({} lines observed)",
                        result.lines_seen
                    );
                    warn!("The tunnel may still be starting; watch the logs below for its URL");
                }
            }
            self.report.tunnel_url = result.url;
        }

        if self.plan.tunnel.is_some() && self.report.tunnel_url.is_none() {
            self.enter(Phase::ResolvingFallback);
            if let Some(url) = fallback::try_fallback(self.plan.port).await {
                info!("Host proxy fallback URL: {url}");
                self.report.fallback_url = Some(url);
            }
        }

        self.enter(Phase::Streaming);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Err(SkyliftError::Interrupted),
                line = primary_lines.next_line() => match line {
                    Some(line) => print_line(&line),
                    None => {
                        info!("Server exited");
                        break;
                    }
                },
            }
        }

        Ok(())
    }

    /// Request termination of both children, tunnel first, each exactly
    /// once.
    async fn terminate_children(&mut self) {
        if let Some(mut tunnel_proc) = self.tunnel.take() {
            if let Err(e) = tunnel_proc.terminate().await {
                warn!("Failed to stop tunnel: {e}");
            }
        }
        if let Some(mut primary_proc) = self.primary.take() {
            if let Err(e) = primary_proc.terminate().await {
                warn!("Failed to stop server: {e}");
            }
        }
    }

    fn enter(&mut self, phase: Phase) {
        debug!("phase {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }
}

/// Raw passthrough of child output; intentional stdout, not a tracing event.
fn print_line(line: &str) {
    println!("{line}");
}

fn print_url_banner(url: &str) {
    println!();
    println!("{}", "=".repeat(60));
    println!("  PUBLIC URL: {url}");
    println!("{}", "=".repeat(60));
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::is_alive;

    fn sh(script: &str) -> ProcessSpec {
        ProcessSpec::new("sh").arg("-c").arg(script)
    }

    fn quick(plan: LaunchPlan) -> LaunchPlan {
        plan.with_ready_budget(20, Duration::from_millis(50))
            .with_url_budget(20, Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_primary_spawn_failure_is_fatal() {
        let plan = LaunchPlan {
            primary: ProcessSpec::new("no-such-binary-skylift"),
            ..LaunchPlan::script(".", "main.py")
        };
        let mut seq = LaunchSequencer::new(plan);

        let result = seq.run(&CancellationToken::new()).await;
        assert!(matches!(result, Err(SkyliftError::Spawn { .. })));
    }

    #[tokio::test]
    async fn test_natural_exit_without_tunnel() {
        let plan = LaunchPlan {
            primary: sh("echo one; echo two"),
            ..LaunchPlan::script(".", "main.py")
        };
        let mut seq = LaunchSequencer::new(plan);

        let report = seq.run(&CancellationToken::new()).await.unwrap();
        assert!(!report.interrupted);
        assert_eq!(report.tunnel_url, None);
    }

    #[tokio::test]
    async fn test_tunnel_spawn_failure_degrades() {
        let mut plan = quick(LaunchPlan::server(".", "", 8188));
        plan.primary = sh("echo 'Starting server'; echo tail");
        plan.tunnel = Some(ProcessSpec::new("no-such-tunnel-binary"));
        let mut seq = LaunchSequencer::new(plan);

        let report = seq.run(&CancellationToken::new()).await.unwrap();
        assert!(report.ready);
        assert_eq!(report.tunnel_url, None);
        assert!(!report.interrupted);
    }

    #[tokio::test]
    async fn test_missing_readiness_marker_still_starts_tunnel() {
        let mut plan = quick(LaunchPlan::server(".", "", 8188));
        plan.primary = sh("echo 'no marker here'; sleep 30");
        plan.tunnel = Some(sh("echo 'https://soft-fail.trycloudflare.com'; sleep 30"));
        plan = plan.with_ready_budget(4, Duration::from_millis(50));
        let mut seq = LaunchSequencer::new(plan);

        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            canceller.cancel();
        });

        let report = seq.run(&cancel).await.unwrap();
        assert!(!report.ready);
        assert_eq!(
            report.tunnel_url.as_deref(),
            Some("https://soft-fail.trycloudflare.com")
        );
    }

    #[tokio::test]
    async fn test_discovery_timeout_falls_back_and_still_tears_down() {
        let mut plan = quick(LaunchPlan::server(".", "", 8188));
        plan.primary = sh("echo 'Starting server'; echo tail");
        plan.tunnel = Some(sh("echo 'INF no url in this output'; sleep 30"));
        plan = plan.with_url_budget(4, Duration::from_millis(50));
        let mut seq = LaunchSequencer::new(plan);

        let report = seq.run(&CancellationToken::new()).await.unwrap();

        // No URL was confirmed, fallback was consulted (and unavailable on
        // this host), and the still-running tunnel was terminated when the
        // primary exited.
        assert_eq!(report.tunnel_url, None);
        assert_eq!(report.fallback_url, None);
        assert!(!report.interrupted);
        let tunnel_pid = report.tunnel_pid.expect("tunnel pid recorded");
        assert!(!is_alive(tunnel_pid));
    }

    #[tokio::test]
    async fn test_interrupt_during_streaming_terminates_both_children() {
        let mut plan = quick(LaunchPlan::server(".", "", 8188));
        plan.primary = sh("echo 'Starting server'; sleep 30");
        plan.tunnel = Some(sh("echo 'https://abc123.trycloudflare.com'; sleep 30"));
        let mut seq = LaunchSequencer::new(plan);

        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            canceller.cancel();
        });

        let report = seq.run(&cancel).await.unwrap();
        assert!(report.interrupted);
        assert_eq!(
            report.tunnel_url.as_deref(),
            Some("https://abc123.trycloudflare.com")
        );

        let primary_pid = report.primary_pid.expect("primary pid recorded");
        let tunnel_pid = report.tunnel_pid.expect("tunnel pid recorded");
        assert!(!is_alive(primary_pid));
        assert!(!is_alive(tunnel_pid));
    }

    #[tokio::test]
    async fn test_cancel_before_start_spawns_nothing() {
        let plan = LaunchPlan {
            primary: sh("sleep 30"),
            ..LaunchPlan::script(".", "main.py")
        };
        let mut seq = LaunchSequencer::new(plan);

        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = seq.run(&cancel).await.unwrap();
        assert!(report.interrupted);
        assert_eq!(report.primary_pid, None);
    }

    #[test]
    fn test_server_plan_shape() {
        let plan = LaunchPlan::server("/srv/comfy", "--listen 0.0.0.0 --port 8200", 8200);
        assert_eq!(plan.primary.program, "python");
        assert_eq!(
            plan.primary.args,
            vec!["-u", "main.py", "--listen", "0.0.0.0", "--port", "8200"]
        );
        let tunnel_spec = plan.tunnel.expect("server plan has a tunnel");
        assert!(tunnel_spec
            .args
            .contains(&"http://127.0.0.1:8200".to_string()));
        assert!(plan.await_readiness);
    }

    #[test]
    fn test_script_plan_shape() {
        let plan = LaunchPlan::script("/srv/comfy", "app.py");
        assert_eq!(plan.primary.args, vec!["-u", "app.py"]);
        assert!(plan.tunnel.is_none());
        assert!(!plan.await_readiness);
    }
}
