//! Skylift — provision a ComfyUI environment from a manifest and launch it
//! behind a public tunnel.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use skylift_core::provision::scripts;
use skylift_core::{
    CancellationToken, EnvManifest, LaunchMode, LaunchPlan, LaunchSequencer, Provisioner,
};

#[derive(Parser, Debug)]
#[command(name = "skylift")]
#[command(about = "Provision and launch a ComfyUI environment behind a public tunnel")]
struct Args {
    /// Path to the environment manifest (JSON)
    manifest: PathBuf,

    /// Root directory of the ComfyUI checkout
    #[arg(long, default_value = "ComfyUI")]
    root_dir: PathBuf,

    /// Skip provisioning and launch against the existing environment
    #[arg(long)]
    skip_provision: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let manifest = EnvManifest::from_file(&args.manifest)?;

    let root_dir = if args.root_dir.is_absolute() {
        args.root_dir.clone()
    } else {
        std::env::current_dir()?.join(&args.root_dir)
    };

    if args.skip_provision {
        info!("Skipping provisioning");
    } else {
        Provisioner::new(&root_dir, manifest.clone()).run().await?;
    }

    // One token shared with the Ctrl-C handler; the sequencer turns it into
    // child teardown.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, shutting down");
                cancel.cancel();
            }
        });
    }

    let plan = match manifest.execution.mode {
        LaunchMode::Server => {
            let port = manifest.execution.port()?;
            info!("Launching server mode on port {port}");
            LaunchPlan::server(&root_dir, &manifest.execution.args, port)
        }
        LaunchMode::Script => {
            let script_name = scripts::fetch_script(&root_dir, &manifest.execution).await?;
            info!("Launching script: {script_name}");
            LaunchPlan::script(&root_dir, &script_name)
        }
    };

    let report = LaunchSequencer::new(plan).run(&cancel).await?;

    match (&report.tunnel_url, &report.fallback_url) {
        (Some(url), _) => info!("Run finished; public URL was {url}"),
        (None, Some(url)) => info!("Run finished; host proxy URL was {url}"),
        (None, None) => info!("Run finished"),
    }

    Ok(())
}
