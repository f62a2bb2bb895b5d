//! Script-mode entry point placement.

use std::path::Path;

use tracing::info;

use super::download_file;
use crate::error::{Result, SkyliftError};
use crate::manifest::ExecutionSpec;

/// Place the script-mode entry point inside the root directory and return
/// its file name.
///
/// A `script_url` is downloaded into the root; otherwise an existing local
/// `script_path` is copied in. A script already sitting in the root is used
/// as-is.
pub async fn fetch_script(root: &Path, execution: &ExecutionSpec) -> Result<String> {
    let script_path = execution
        .script_path
        .clone()
        .unwrap_or_else(|| "main.py".to_string());
    let script_name = script_path
        .rsplit('/')
        .next()
        .unwrap_or(script_path.as_str())
        .to_string();

    if let Some(url) = execution.script_url.as_deref() {
        info!("Fetching script from {url}");
        download_file(url, &root.join(&script_name)).await?;
    } else if Path::new(&script_path).exists() {
        info!("Copying local script {script_path} to {}", root.display());
        tokio::fs::copy(&script_path, root.join(&script_name))
            .await
            .map_err(|e| SkyliftError::io_with_path(e, &script_path))?;
    } else if !root.join(&script_name).exists() {
        return Err(SkyliftError::Config {
            message: format!("script {script_path} not found and no script_url given"),
        });
    }

    Ok(script_name)
}
