//! Idempotent environment provisioning.
//!
//! Every step checks for its own result before doing work, so re-running a
//! manifest against an existing environment is cheap and safe. Provisioning
//! failures are hard errors; the launch never starts against a half-built
//! environment.

pub mod models;
pub mod repo;
pub mod requirements;
pub mod scripts;
pub mod tunnel_bin;

use std::path::{Path, PathBuf};

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::config::ProvisionConfig;
use crate::error::{Result, SkyliftError};
use crate::manifest::{EnvManifest, LaunchMode};
use crate::process::{ManagedProcess, ProcessSpec};

/// Runs all provisioning steps for a manifest, in order.
pub struct Provisioner {
    root_dir: PathBuf,
    manifest: EnvManifest,
}

impl Provisioner {
    pub fn new(root_dir: impl Into<PathBuf>, manifest: EnvManifest) -> Self {
        Self {
            root_dir: root_dir.into(),
            manifest,
        }
    }

    /// Bring the environment to its ready state: repository, custom nodes,
    /// model files, Python requirements, tunnel client.
    pub async fn run(&self) -> Result<()> {
        repo::install_comfy(
            &self.root_dir,
            self.manifest.execution.comfy_commit.as_deref(),
        )
        .await?;
        repo::install_custom_nodes(&self.root_dir, &self.manifest.custom_nodes).await?;
        models::acquire_models(&self.root_dir, &self.manifest.models).await?;
        requirements::install(&self.root_dir, self.manifest.execution.mode).await?;
        if self.manifest.execution.mode == LaunchMode::Server {
            tunnel_bin::ensure_cloudflared().await?;
        }
        Ok(())
    }
}

/// Run one provisioning command to completion, forwarding its output lines.
///
/// A non-zero exit is a hard [`SkyliftError::CommandFailed`].
pub(crate) async fn run_step(spec: &ProcessSpec) -> Result<()> {
    info!("Executing: {}", spec.display());

    let mut proc = ManagedProcess::spawn(spec)?;
    if let Some(mut lines) = proc.take_lines() {
        while let Some(line) = lines.next_line().await {
            println!("{line}");
        }
    }

    let status = proc.wait().await?;
    if !status.success() {
        return Err(SkyliftError::CommandFailed {
            program: spec.program.clone(),
            code: status.code(),
        });
    }
    Ok(())
}

/// Stream an HTTP download to `<dest>.part`, then rename into place.
pub(crate) async fn download_file(url: &str, dest: &Path) -> Result<()> {
    let part = PathBuf::from(format!(
        "{}{}",
        dest.display(),
        ProvisionConfig::DOWNLOAD_TEMP_SUFFIX
    ));

    let response = reqwest::get(url)
        .await?
        .error_for_status()
        .map_err(|e| SkyliftError::DownloadFailed {
            url: url.to_string(),
            message: e.to_string(),
        })?;

    let mut file = tokio::fs::File::create(&part)
        .await
        .map_err(|e| SkyliftError::io_with_path(e, &part))?;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| SkyliftError::DownloadFailed {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        file.write_all(&chunk)
            .await
            .map_err(|e| SkyliftError::io_with_path(e, &part))?;
    }
    file.flush()
        .await
        .map_err(|e| SkyliftError::io_with_path(e, &part))?;
    drop(file);

    tokio::fs::rename(&part, dest)
        .await
        .map_err(|e| SkyliftError::io_with_path(e, dest))?;
    Ok(())
}
