//! Declarative environment manifest.
//!
//! The manifest is a JSON document describing what to provision (repository
//! pin, custom nodes, model files) and how to launch (server or script mode,
//! launch arguments). The launch arguments are an opaque string passed
//! through to the server; the bound port is extracted from them so the
//! tunnel can target it.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::config::ServerConfig;
use crate::error::{Result, SkyliftError};

static PORT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"--port[=\s]+(\d+)").unwrap());

/// Top-level manifest document.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct EnvManifest {
    #[serde(default)]
    pub execution: ExecutionSpec,
    /// Git URLs of custom node repositories to install.
    #[serde(default)]
    pub custom_nodes: Vec<String>,
    #[serde(default)]
    pub models: Vec<ModelSpec>,
}

impl EnvManifest {
    /// Load and parse a manifest file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SkyliftError::io_with_path(e, path))?;
        serde_json::from_str(&raw).map_err(|e| SkyliftError::Json {
            message: format!("invalid manifest {}: {}", path.display(), e),
            source: Some(e),
        })
    }
}

/// How the provisioned environment is launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LaunchMode {
    /// Long-running ComfyUI server exposed through a tunnel.
    #[default]
    Server,
    /// One-shot foreground script (e.g. a gradio app), no tunnel.
    Script,
}

/// The `execution` section of the manifest.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ExecutionSpec {
    #[serde(default)]
    pub mode: LaunchMode,
    /// Opaque argument string appended to the server command.
    #[serde(default)]
    pub args: String,
    /// Optional commit to pin the ComfyUI checkout to.
    pub comfy_commit: Option<String>,
    /// Script-mode entry point, relative to the invocation directory.
    pub script_path: Option<String>,
    /// Script-mode download source; takes precedence over `script_path`.
    pub script_url: Option<String>,
}

impl ExecutionSpec {
    /// Port the server will bind, parsed from the launch arguments.
    ///
    /// Accepts `--port 8188` and `--port=8188`; absent means the default.
    /// The port must be in 1..=65535.
    pub fn port(&self) -> Result<u16> {
        let Some(caps) = PORT_RE.captures(&self.args) else {
            return Ok(ServerConfig::DEFAULT_PORT);
        };
        let raw = &caps[1];
        let value: u64 = raw.parse().map_err(|_| SkyliftError::Validation {
            field: "execution.args".into(),
            message: format!("port {raw} is not a valid integer"),
        })?;
        if value == 0 || value > u64::from(u16::MAX) {
            return Err(SkyliftError::Validation {
                field: "execution.args".into(),
                message: format!("port {value} is outside 1..=65535"),
            });
        }
        Ok(value as u16)
    }
}

/// How a model file is placed into the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcquireMethod {
    /// Fetch over HTTP. `aria2c` is accepted as a legacy manifest alias.
    #[default]
    #[serde(alias = "aria2c")]
    Download,
    /// Link from an existing local file.
    Symlink,
}

/// One model file to place during provisioning.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelSpec {
    pub url: Option<String>,
    pub filename: String,
    /// Destination directory. Relative paths are under the ComfyUI root;
    /// absolute paths are external storage that additionally gets a symlink
    /// inside the root's models tree.
    pub dest_path: String,
    #[serde(default)]
    pub method: AcquireMethod,
    /// Symlink source for `method: symlink`.
    pub source_path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_default_when_absent() {
        let exec = ExecutionSpec {
            args: "--listen 0.0.0.0".into(),
            ..Default::default()
        };
        assert_eq!(exec.port().unwrap(), ServerConfig::DEFAULT_PORT);
    }

    #[test]
    fn test_port_space_form() {
        let exec = ExecutionSpec {
            args: "--listen 0.0.0.0 --port 8200".into(),
            ..Default::default()
        };
        assert_eq!(exec.port().unwrap(), 8200);
    }

    #[test]
    fn test_port_equals_form() {
        let exec = ExecutionSpec {
            args: "--port=9001".into(),
            ..Default::default()
        };
        assert_eq!(exec.port().unwrap(), 9001);
    }

    #[test]
    fn test_port_out_of_range() {
        let exec = ExecutionSpec {
            args: "--port 70000".into(),
            ..Default::default()
        };
        assert!(matches!(
            exec.port(),
            Err(SkyliftError::Validation { .. })
        ));
    }

    #[test]
    fn test_port_zero_rejected() {
        let exec = ExecutionSpec {
            args: "--port 0".into(),
            ..Default::default()
        };
        assert!(exec.port().is_err());
    }

    #[test]
    fn test_manifest_parse() {
        let manifest: EnvManifest = serde_json::from_str(
            r#"{
                "execution": {"mode": "server", "args": "--port 8188", "comfy_commit": "abc123"},
                "custom_nodes": ["https://github.com/user/ComfyUI-Node.git"],
                "models": [
                    {"url": "https://example.com/m.safetensors",
                     "filename": "m.safetensors",
                     "dest_path": "models/checkpoints",
                     "method": "aria2c"},
                    {"filename": "v.safetensors",
                     "dest_path": "/tmp/store/vae",
                     "method": "symlink",
                     "source_path": "/data/v.safetensors"}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(manifest.execution.mode, LaunchMode::Server);
        assert_eq!(manifest.execution.comfy_commit.as_deref(), Some("abc123"));
        assert_eq!(manifest.custom_nodes.len(), 1);
        assert_eq!(manifest.models[0].method, AcquireMethod::Download);
        assert_eq!(manifest.models[1].method, AcquireMethod::Symlink);
    }

    #[test]
    fn test_manifest_defaults() {
        let manifest: EnvManifest = serde_json::from_str("{}").unwrap();
        assert_eq!(manifest.execution.mode, LaunchMode::Server);
        assert!(manifest.custom_nodes.is_empty());
        assert!(manifest.models.is_empty());
        assert_eq!(manifest.execution.port().unwrap(), 8188);
    }

    #[test]
    fn test_script_mode_parse() {
        let manifest: EnvManifest = serde_json::from_str(
            r#"{"execution": {"mode": "script", "script_url": "https://example.com/app.py"}}"#,
        )
        .unwrap();
        assert_eq!(manifest.execution.mode, LaunchMode::Script);
        assert_eq!(
            manifest.execution.script_url.as_deref(),
            Some("https://example.com/app.py")
        );
    }
}
