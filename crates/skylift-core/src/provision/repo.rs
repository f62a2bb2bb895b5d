//! Repository provisioning: the ComfyUI checkout and its custom nodes.

use std::path::Path;

use tracing::info;

use super::run_step;
use crate::config::{AppConfig, ProvisionConfig};
use crate::error::{Result, SkyliftError};
use crate::process::ProcessSpec;

/// Clone ComfyUI into `root` when missing, and pin it to `commit` when one
/// is given.
pub async fn install_comfy(root: &Path, commit: Option<&str>) -> Result<()> {
    if !root.exists() {
        info!("Cloning ComfyUI into {}", root.display());
        run_step(
            &ProcessSpec::new("git")
                .arg("clone")
                .arg(AppConfig::COMFY_REPO_URL)
                .arg(root.to_string_lossy().to_string()),
        )
        .await?;
    }

    if let Some(commit) = commit {
        info!("Resetting ComfyUI to commit {commit}");
        run_step(
            &ProcessSpec::new("git")
                .args(["fetch", "--all", "-q"])
                .current_dir(root),
        )
        .await?;
        run_step(
            &ProcessSpec::new("git")
                .args(["reset", "--hard", commit])
                .current_dir(root),
        )
        .await?;
    }

    Ok(())
}

/// Clone each custom node repository that is not already present.
pub async fn install_custom_nodes(root: &Path, urls: &[String]) -> Result<()> {
    let nodes_dir = root.join(ProvisionConfig::CUSTOM_NODES_DIR_NAME);
    if !urls.is_empty() {
        tokio::fs::create_dir_all(&nodes_dir)
            .await
            .map_err(|e| SkyliftError::io_with_path(e, &nodes_dir))?;
    }

    for url in urls {
        let name = node_name_from_url(url);
        let node_path = nodes_dir.join(&name);
        if node_path.exists() {
            info!("Custom node {name} already exists");
            continue;
        }

        info!("Installing custom node: {name}");
        run_step(
            &ProcessSpec::new("git")
                .arg("clone")
                .arg(url)
                .current_dir(&nodes_dir),
        )
        .await?;
    }

    Ok(())
}

/// Repository name from a git URL, without a trailing `.git`.
fn node_name_from_url(url: &str) -> String {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(url)
        .trim_end_matches(".git")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_node_name_from_url() {
        assert_eq!(
            node_name_from_url("https://github.com/user/ComfyUI-Manager.git"),
            "ComfyUI-Manager"
        );
        assert_eq!(
            node_name_from_url("https://github.com/user/ComfyUI-Impact-Pack"),
            "ComfyUI-Impact-Pack"
        );
        assert_eq!(
            node_name_from_url("https://github.com/user/trailing-slash/"),
            "trailing-slash"
        );
    }

    #[tokio::test]
    async fn test_existing_custom_node_is_skipped() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        let node_path = root.join("custom_nodes").join("ComfyUI-Manager");
        std::fs::create_dir_all(&node_path).unwrap();

        // git is never invoked for an existing node, so this succeeds even
        // though the URL is unreachable.
        install_custom_nodes(
            root,
            &["https://invalid.invalid/user/ComfyUI-Manager.git".to_string()],
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_no_custom_nodes_is_a_noop() {
        let temp = TempDir::new().unwrap();
        install_custom_nodes(temp.path(), &[]).await.unwrap();
    }
}
