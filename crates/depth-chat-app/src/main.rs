#![warn(missing_docs)]
//! # depth-chat binary
//!
//! Headless front end: stages image files, submits them in one request and
//! writes the returned depth maps to disk.
//!
//! ```bash
//! depth-chat photo.jpg scan.png --output-dir out/
//! RUST_LOG=debug depth-chat --endpoint http://10.0.0.5:8000/predict photo.jpg
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use depth_chat_app::{
    AppConfig, DEFAULT_ENDPOINT, DEFAULT_TIMEOUT_SECS, SubmitOutcome, app_version,
    build_orchestrator, lock_state, new_shared_state,
};
use depth_chat_contract::download_artifacts;
use depth_chat_core::{ConversationEntry, FAILURE_MESSAGE};
use tracing::{error, info};

/// Submit images to a depth estimation service and save the depth maps.
#[derive(Parser, Debug)]
#[command(name = "depth-chat", version, about, long_about = None)]
struct Args {
    /// Image files to submit, in order.
    #[arg(required = true, value_name = "IMAGE")]
    images: Vec<PathBuf>,

    /// Inference endpoint URL.
    #[arg(short = 'e', long, env = "DEPTH_CHAT_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Directory receiving `depth_batch_{i}.png` files.
    #[arg(short = 'o', long, env = "DEPTH_CHAT_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Whole-request timeout in seconds.
    #[arg(long, env = "DEPTH_CHAT_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long, env = "DEPTH_CHAT_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

/// CLI entry point.
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);
    info!(version = app_version(), "depth-chat starting");

    let config = AppConfig::new(args.endpoint.clone())
        .context("invalid configuration")?
        .with_timeout(Duration::from_secs(args.timeout_secs));
    let orchestrator = build_orchestrator(&config).context("failed to build uploader")?;

    let state = new_shared_state();
    let mut staged = Vec::with_capacity(args.images.len());
    for path in &args.images {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        staged.push((name, bytes));
    }
    lock_state(&state).staging.add(staged);

    match orchestrator.submit(&state).await {
        SubmitOutcome::Completed { depth_maps } => {
            info!(depth_maps, "submission completed");
        }
        SubmitOutcome::Failed { error } => {
            error!(error = %error, "submission failed");
            bail!("{FAILURE_MESSAGE}");
        }
        SubmitOutcome::NothingStaged | SubmitOutcome::AlreadyInFlight => {
            bail!("nothing was submitted");
        }
    }

    let output = lock_state(&state)
        .log
        .snapshot()
        .iter()
        .rev()
        .find(|entry| matches!(entry, ConversationEntry::Output { .. }))
        .cloned()
        .context("no depth maps were recorded")?;

    tokio::fs::create_dir_all(&args.output_dir)
        .await
        .with_context(|| format!("failed to create {}", args.output_dir.display()))?;
    for artifact in download_artifacts(&output).context("depth map payload was not base64")? {
        let path = args.output_dir.join(&artifact.filename);
        tokio::fs::write(&path, &artifact.bytes)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("{}", path.display());
    }

    Ok(())
}

/// Initialize logging with the specified level; `RUST_LOG` takes precedence.
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "depth_chat={level},depth_chat_app={level},depth_chat_camera={level},depth_chat_upload={level}"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
