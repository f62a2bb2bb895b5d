//! Tunnel client acquisition.
//!
//! Cloudflared ships as a single static binary; one download per host is
//! enough.

use std::path::{Path, PathBuf};

use tracing::info;

use super::download_file;
use crate::config::TunnelConfig;
use crate::error::{Result, SkyliftError};

/// Make sure the cloudflared binary exists and is executable, downloading
/// it when missing. Returns its path.
pub async fn ensure_cloudflared() -> Result<PathBuf> {
    ensure_at(Path::new(TunnelConfig::BINARY_PATH), TunnelConfig::BINARY_URL).await
}

async fn ensure_at(path: &Path, url: &str) -> Result<PathBuf> {
    if !path.exists() {
        info!("Downloading cloudflared...");
        download_file(url, path).await?;
    }
    mark_executable(path)?;
    Ok(path.to_path_buf())
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = std::fs::metadata(path)
        .map_err(|e| SkyliftError::io_with_path(e, path))?
        .permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms).map_err(|e| SkyliftError::io_with_path(e, path))
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> Result<()> {
    Ok(())
}
