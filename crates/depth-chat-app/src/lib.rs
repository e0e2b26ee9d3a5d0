#![warn(missing_docs)]
//! # depth-chat-app
//!
//! ## Purpose
//! Orchestrates staging, camera capture, normalization, upload, and the
//! conversation log for `depth-chat`.
//!
//! ## Responsibilities
//! - Run one submission end to end with optimistic history updates.
//! - Route camera captures into the staging area.
//! - Build validated runtime configuration and wire the HTTP transport.
//!
//! ## Data flow
//! Staged images -> concurrent normalization -> `Input` entry + staging clear
//! -> one multipart exchange -> `Output` or `Error` entry.
//!
//! ## Ownership and lifetimes
//! Shared UI state lives in a [`SharedState`] mutex. Every step locks it
//! briefly and releases it before awaiting, so picker/drop/camera events keep
//! flowing while a submission is in flight.
//!
//! ## Error model
//! Normalization and upload failures are collapsed into one generic `Error`
//! log entry; the detailed [`PipelineError`] is logged and returned to the
//! caller for diagnostics. Configuration problems surface as [`AppError`].

mod camera;
mod config;
mod orchestrator;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use depth_chat_camera::CameraError;
use depth_chat_normalize::NormalizeError;
use depth_chat_ui::AppState;
use depth_chat_upload::UploadError;
use thiserror::Error;

pub use camera::CameraController;
pub use config::{AppConfig, DEFAULT_ENDPOINT, DEFAULT_TIMEOUT_SECS, build_orchestrator};
pub use orchestrator::{
    BlockingNormalizer, PipelineError, SubmitOutcome, UploadNormalizer, UploadOrchestrator,
};

/// Build-time application version loaded from root `VERSION` file.
pub const APP_VERSION: &str = env!("DEPTH_CHAT_VERSION");

/// UI state shared between input handlers and the orchestrator.
pub type SharedState = Arc<Mutex<AppState>>;

/// Returns the app version sourced from root `VERSION`.
pub fn app_version() -> &'static str {
    APP_VERSION
}

/// Creates empty shared state.
pub fn new_shared_state() -> SharedState {
    Arc::new(Mutex::new(AppState::new()))
}

/// Locks shared state, recovering the data if a previous holder panicked.
pub fn lock_state(state: &SharedState) -> MutexGuard<'_, AppState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// App integration error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Endpoint or transport setup failure.
    #[error("upload setup error: {0}")]
    Upload(#[from] UploadError),
    /// Invalid normalization preset.
    #[error("normalize config error: {0}")]
    Normalize(#[from] NormalizeError),
    /// Camera failure.
    #[error("camera error: {0}")]
    Camera(#[from] CameraError),
}
