//! Skylift core — provisioning and tunnel-launch library for ComfyUI
//! environments.
//!
//! A manifest describes what to provision (repository pin, custom nodes,
//! model files) and how to launch. Provisioning is idempotent; the launch
//! sequencer then supervises the server process and a tunnel client,
//! discovers the public URL from the tunnel's log output, and tears both
//! down on interruption.
//!
//! # Example
//!
//! ```rust,no_run
//! use skylift_core::{CancellationToken, EnvManifest, LaunchPlan, LaunchSequencer, Provisioner};
//!
//! #[tokio::main]
//! async fn main() -> skylift_core::Result<()> {
//!     let manifest = EnvManifest::from_file("environment.json")?;
//!     Provisioner::new("ComfyUI", manifest.clone()).run().await?;
//!
//!     let port = manifest.execution.port()?;
//!     let plan = LaunchPlan::server("ComfyUI", &manifest.execution.args, port);
//!     let cancel = CancellationToken::new();
//!     let report = LaunchSequencer::new(plan).run(&cancel).await?;
//!     println!("public url: {:?}", report.tunnel_url);
//!     Ok(())
//! }
//! ```

pub mod cancel;
pub mod config;
pub mod error;
pub mod launch;
pub mod manifest;
pub mod process;
pub mod provision;

// Re-export commonly used types
pub use cancel::{CancellationToken, CancelledError};
pub use error::{Result, SkyliftError};
pub use launch::{LaunchPlan, LaunchReport, LaunchSequencer, ReadinessSignal, TunnelResult};
pub use manifest::{AcquireMethod, EnvManifest, ExecutionSpec, LaunchMode, ModelSpec};
pub use process::{LineStream, ManagedProcess, ProcessSpec};
pub use provision::Provisioner;
