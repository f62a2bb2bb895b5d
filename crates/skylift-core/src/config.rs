//! Centralized configuration for Skylift.
//!
//! Tuning constants for the launch sequence, tunnel discovery, and
//! provisioning. The readiness markers and the tunnel URL shape are exact
//! strings emitted by the wrapped programs; they are configuration, not a
//! guarantee about those programs' log formats.

use std::time::Duration;

/// Application-level configuration.
pub struct AppConfig;

impl AppConfig {
    pub const APP_NAME: &'static str = "Skylift";
    pub const COMFY_REPO_URL: &'static str = "https://github.com/comfyanonymous/ComfyUI";
    pub const DEFAULT_ROOT_DIR: &'static str = "ComfyUI";
}

/// Primary server launch configuration.
pub struct ServerConfig;

impl ServerConfig {
    /// Port ComfyUI binds when `--port` is absent from the launch args.
    pub const DEFAULT_PORT: u16 = 8188;

    /// Substrings ComfyUI prints once its web server is accepting
    /// connections. Case-sensitive, matched anywhere in a line.
    pub const READY_MARKERS: &'static [&'static str] = &["Starting server", "To see the GUI"];

    /// One poll attempt runs every interval while no output is buffered;
    /// 120 attempts at 500ms bounds the readiness wait to one minute.
    pub const READY_MAX_ATTEMPTS: u32 = 120;
    pub const READY_POLL_INTERVAL: Duration = Duration::from_millis(500);
}

/// Tunnel client configuration.
pub struct TunnelConfig;

impl TunnelConfig {
    pub const BINARY_URL: &'static str =
        "https://github.com/cloudflare/cloudflared/releases/latest/download/cloudflared-linux-amd64";
    pub const BINARY_PATH: &'static str = "/tmp/cloudflared_bin";

    /// Shape of the public URL cloudflared prints for quick tunnels.
    pub const URL_PATTERN: &'static str = r"https://[a-zA-Z0-9-]+\.trycloudflare\.com";

    /// The URL usually appears within 10-15 seconds of tunnel startup.
    pub const URL_MAX_ATTEMPTS: u32 = 30;
    pub const URL_POLL_INTERVAL: Duration = Duration::from_millis(500);
}

/// Child process lifecycle configuration.
pub struct ProcessConfig;

impl ProcessConfig {
    /// Grace period between the termination request and a forced kill.
    pub const TERM_GRACE: Duration = Duration::from_secs(5);
}

/// Provisioning configuration.
pub struct ProvisionConfig;

impl ProvisionConfig {
    pub const DOWNLOAD_TEMP_SUFFIX: &'static str = ".part";
    pub const REQUIREMENTS_FILE: &'static str = "requirements.txt";
    pub const CUSTOM_NODES_DIR_NAME: &'static str = "custom_nodes";
    pub const MODELS_DIR_NAME: &'static str = "models";
}

/// Host proxy fallback configuration.
pub struct FallbackConfig;

impl FallbackConfig {
    /// Directory whose presence identifies a Colab-style host.
    pub const HOST_MARKER: &'static str = "/content";
    pub const PROXY_QUERY_TIMEOUT: Duration = Duration::from_secs(10);
}
