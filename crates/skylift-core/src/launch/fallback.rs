//! Host proxy fallback.
//!
//! Some hosting environments (Colab-style notebooks) expose a kernel proxy
//! that can forward a local port without any tunnel. When tunnel discovery
//! comes up empty, the sequencer asks the host for such a proxy URL. Every
//! failure on this path means "no fallback available"; it never aborts the
//! launch.

use std::path::Path;

use tokio::process::Command;
use tracing::debug;

use crate::config::FallbackConfig;

/// Try to resolve a host-provided proxy URL for `port`.
///
/// Returns `None` unless the host marker directory exists, the host Python
/// answers within the bounded wait, and the answer looks like a URL.
pub async fn try_fallback(port: u16) -> Option<String> {
    try_fallback_at(Path::new(FallbackConfig::HOST_MARKER), port).await
}

async fn try_fallback_at(marker: &Path, port: u16) -> Option<String> {
    if !marker.exists() {
        return None;
    }

    let script = format!(
        "from google.colab.output import eval_js; \
         print(eval_js('google.colab.kernel.proxyPort({port})'))"
    );

    let output = tokio::time::timeout(
        FallbackConfig::PROXY_QUERY_TIMEOUT,
        Command::new("python").arg("-c").arg(&script).output(),
    )
    .await;

    match output {
        Ok(Ok(out)) if out.status.success() => {
            let url = String::from_utf8_lossy(&out.stdout).trim().to_string();
            if url.starts_with("http") {
                Some(url)
            } else {
                debug!("Host proxy answered with a non-URL: {url:?}");
                None
            }
        }
        Ok(Ok(out)) => {
            debug!("Host proxy query exited with {:?}", out.status.code());
            None
        }
        Ok(Err(e)) => {
            debug!("Host proxy query could not run: {e}");
            None
        }
        Err(_) => {
            debug!(
                "Host proxy query timed out after {:?}",
                FallbackConfig::PROXY_QUERY_TIMEOUT
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_absent_marker_resolves_to_none_quickly() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("content");

        let start = std::time::Instant::now();
        let url = try_fallback_at(&missing, 8188).await;

        assert_eq!(url, None);
        // No subprocess, no waiting.
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_failure_is_swallowed_when_marker_exists() {
        // The marker exists but this host has no Colab runtime; the query
        // must fail silently, not error.
        let temp = TempDir::new().unwrap();
        let url = try_fallback_at(temp.path(), 8188).await;
        assert_eq!(url, None);
    }
}
