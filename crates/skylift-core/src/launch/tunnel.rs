//! Tunnel URL discovery.
//!
//! The tunnel client prints its assigned public URL somewhere in its early
//! log output. Discovery runs as an independent task so the primary
//! process's own draining is never blocked, and hands its one result to the
//! sequencer through a oneshot channel. After the result is delivered the
//! task keeps draining the tunnel stream: the URL can still appear after the
//! bounded wait, and the pipe must keep flowing either way.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tokio::sync::oneshot;
use tracing::info;

use crate::config::TunnelConfig;
use crate::process::{scanner, LineStream};

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(TunnelConfig::URL_PATTERN).unwrap());

/// Result of one tunnel discovery, written exactly once by the discovery
/// task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelResult {
    /// The public URL, exactly as matched from the log text.
    pub url: Option<String>,
    /// Raw lines observed during the scan, for diagnostics.
    pub lines_seen: usize,
}

/// Extract the public URL from a single log line, if present.
pub fn extract_url(line: &str) -> Option<String> {
    URL_RE.find(line).map(|m| m.as_str().to_string())
}

/// Scan the tunnel stream for the provider URL, bounded by
/// `max_attempts * poll_interval`.
pub async fn discover_url(
    stream: &mut LineStream,
    max_attempts: u32,
    poll_interval: Duration,
) -> TunnelResult {
    let mut lines_seen = 0;
    let matched = scanner::scan_for(
        stream,
        |line| URL_RE.is_match(line),
        max_attempts,
        poll_interval,
        |line| {
            lines_seen += 1;
            info!(target: "tunnel", "{}", line);
        },
    )
    .await;

    TunnelResult {
        url: matched.as_deref().and_then(extract_url),
        lines_seen,
    }
}

/// Spawn the discovery task over an owned tunnel stream.
///
/// The returned receiver yields the single [`TunnelResult`]; the task then
/// drains the stream until the tunnel process exits.
pub fn spawn_discovery(
    mut stream: LineStream,
    max_attempts: u32,
    poll_interval: Duration,
) -> oneshot::Receiver<TunnelResult> {
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let result = discover_url(&mut stream, max_attempts, poll_interval).await;
        let _ = tx.send(result);
        while let Some(line) = stream.next_line().await {
            info!(target: "tunnel", "{}", line);
        }
    });
    rx
}
