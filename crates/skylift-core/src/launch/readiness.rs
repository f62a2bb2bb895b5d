//! Server readiness detection.
//!
//! Watches the primary process's startup output for one of the known
//! readiness markers. This is a best-effort heuristic over log text, not a
//! handshake: a server that is slow to log simply times out softly and the
//! launch continues.

use std::time::Duration;

use tracing::{info, warn};

use crate::process::{scanner, LineStream};

/// Outcome of the readiness wait, produced once per primary-process
/// lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessSignal {
    pub ready: bool,
    /// The line that triggered readiness, when one was seen.
    pub line: Option<String>,
}

/// Wait for the server to report readiness, up to `max_attempts` polls of
/// `poll_interval` each.
///
/// On timeout the signal has `ready == false` and the caller proceeds
/// anyway; blocking the launch forever on a quiet server is worse than
/// optimistic continuation.
pub async fn await_ready<S>(
    stream: &mut LineStream,
    markers: &[&str],
    max_attempts: u32,
    poll_interval: Duration,
    sink: S,
) -> ReadinessSignal
where
    S: FnMut(&str),
{
    info!("Waiting for server to initialize...");

    let matched = scanner::scan_for(
        stream,
        |line| markers.iter().any(|marker| line.contains(marker)),
        max_attempts,
        poll_interval,
        sink,
    )
    .await;

    match matched {
        Some(line) => {
            info!("Server reported ready");
            ReadinessSignal {
                ready: true,
                line: Some(line),
            }
        }
        None => {
            warn!("Server did not report ready in time; continuing anyway");
            ReadinessSignal {
                ready: false,
                line: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{ManagedProcess, ProcessSpec};

    const MARKERS: &[&str] = &["Starting server", "To see the GUI"];

    fn sh(script: &str) -> ProcessSpec {
        ProcessSpec::new("sh").arg("-c").arg(script)
    }

    #[tokio::test]
    async fn test_marker_at_line_three_within_budget_ten() {
        let mut proc = ManagedProcess::spawn(&sh(
            "echo 'loading nodes'; echo 'loading models'; echo 'Starting server'; sleep 30",
        ))
        .unwrap();
        let mut lines = proc.take_lines().unwrap();

        let signal = await_ready(
            &mut lines,
            MARKERS,
            10,
            Duration::from_millis(200),
            |_| {},
        )
        .await;

        assert!(signal.ready);
        assert_eq!(signal.line.as_deref(), Some("Starting server"));
        proc.terminate().await.unwrap();
    }

    #[tokio::test]
    async fn test_no_marker_times_out_softly() {
        let mut proc = ManagedProcess::spawn(&sh("echo 'still importing'; sleep 30")).unwrap();
        let mut lines = proc.take_lines().unwrap();

        let signal = await_ready(&mut lines, MARKERS, 5, Duration::from_millis(10), |_| {}).await;

        assert!(!signal.ready);
        assert_eq!(signal.line, None);
        proc.terminate().await.unwrap();
    }

    #[tokio::test]
    async fn test_startup_lines_reach_sink() {
        let mut proc =
            ManagedProcess::spawn(&sh("echo 'one'; echo 'To see the GUI go to: http://x'")).unwrap();
        let mut lines = proc.take_lines().unwrap();

        let mut seen = Vec::new();
        let signal = await_ready(&mut lines, MARKERS, 20, Duration::from_millis(20), |l| {
            seen.push(l.to_string())
        })
        .await;

        assert!(signal.ready);
        assert_eq!(seen.len(), 2);
        proc.wait().await.unwrap();
    }
}
