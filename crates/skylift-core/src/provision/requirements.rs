//! Python requirements installation.

use std::path::Path;

use tracing::info;

use super::run_step;
use crate::config::ProvisionConfig;
use crate::error::Result;
use crate::manifest::LaunchMode;
use crate::process::ProcessSpec;

/// Install the checkout's requirements; script mode additionally needs
/// gradio for its UI.
pub async fn install(root: &Path, mode: LaunchMode) -> Result<()> {
    info!("Installing Python requirements");
    run_step(
        &ProcessSpec::new("pip")
            .args(["install", "-r", ProvisionConfig::REQUIREMENTS_FILE])
            .current_dir(root),
    )
    .await?;

    if mode == LaunchMode::Script {
        info!("Ensuring gradio is installed");
        run_step(&ProcessSpec::new("pip").args(["install", "gradio"])).await?;
    }

    Ok(())
}
