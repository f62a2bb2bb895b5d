//! Model file acquisition.
//!
//! Files land either under the ComfyUI root (relative `dest_path`) or in
//! external storage (absolute `dest_path`); external files additionally get
//! a symlink inside the root's models tree so ComfyUI can see them.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::download_file;
use crate::config::ProvisionConfig;
use crate::error::{Result, SkyliftError};
use crate::manifest::{AcquireMethod, ModelSpec};

/// Place every model file from the manifest. Existing files are skipped.
pub async fn acquire_models(root: &Path, models: &[ModelSpec]) -> Result<()> {
    for spec in models {
        acquire_model(root, spec).await?;
    }
    Ok(())
}

async fn acquire_model(root: &Path, spec: &ModelSpec) -> Result<()> {
    let external = Path::new(&spec.dest_path).is_absolute();
    let dest_dir = if external {
        PathBuf::from(&spec.dest_path)
    } else {
        root.join(&spec.dest_path)
    };

    tokio::fs::create_dir_all(&dest_dir)
        .await
        .map_err(|e| SkyliftError::io_with_path(e, &dest_dir))?;
    let full_path = dest_dir.join(&spec.filename);

    if full_path.exists() {
        info!(
            "Model {} already exists at {}",
            spec.filename,
            full_path.display()
        );
    } else {
        match spec.method {
            AcquireMethod::Download => {
                let Some(url) = spec.url.as_deref() else {
                    return Err(SkyliftError::Config {
                        message: format!("model {} has no url to download from", spec.filename),
                    });
                };
                info!("Downloading {}...", spec.filename);
                download_file(url, &full_path).await?;
            }
            AcquireMethod::Symlink => match spec.source_path.as_deref() {
                Some(source) if Path::new(source).exists() => {
                    symlink(Path::new(source), &full_path)?;
                }
                source => {
                    // A missing symlink source is reported, not fatal.
                    warn!("Symlink source not found for {}: {:?}", spec.filename, source);
                }
            },
        }
    }

    // External storage: make the file visible inside the ComfyUI models
    // tree, e.g. /tmp/comfy_models/clip -> <root>/models/clip.
    if external && full_path.exists() {
        let Some(subdir) = dest_dir.file_name() else {
            return Ok(());
        };
        let comfy_model_dir = root.join(ProvisionConfig::MODELS_DIR_NAME).join(subdir);
        tokio::fs::create_dir_all(&comfy_model_dir)
            .await
            .map_err(|e| SkyliftError::io_with_path(e, &comfy_model_dir))?;

        let link_path = comfy_model_dir.join(&spec.filename);
        if !link_path.exists() {
            info!(
                "Creating symlink: {} -> {}",
                link_path.display(),
                full_path.display()
            );
            symlink(&full_path, &link_path)?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn symlink(src: &Path, dest: &Path) -> Result<()> {
    std::os::unix::fs::symlink(src, dest).map_err(|e| SkyliftError::SymlinkFailed {
        src: src.to_path_buf(),
        dest: dest.to_path_buf(),
        reason: e.to_string(),
    })
}

#[cfg(windows)]
fn symlink(src: &Path, dest: &Path) -> Result<()> {
    std::os::windows::fs::symlink_file(src, dest).map_err(|e| SkyliftError::SymlinkFailed {
        src: src.to_path_buf(),
        dest: dest.to_path_buf(),
        reason: e.to_string(),
    })
}
