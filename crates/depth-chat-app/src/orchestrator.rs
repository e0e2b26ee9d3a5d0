//! Submission pipeline: normalize, record, upload, record.

use std::sync::Arc;

use async_trait::async_trait;
use depth_chat_core::{ConversationEntry, NormalizedImage, upload_filename};
use depth_chat_normalize::{NormalizeError, NormalizeSpec, normalize};
use depth_chat_upload::{InferenceClient, ProgressObserver, UploadError};
use futures::future::try_join_all;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{SharedState, lock_state};

/// Async seam over image normalization.
#[async_trait]
pub trait UploadNormalizer: Send + Sync {
    /// Normalizes one staged image under `filename`.
    ///
    /// # Errors
    /// Returns the underlying [`NormalizeError`].
    async fn normalize(
        &self,
        raw: Arc<[u8]>,
        filename: String,
    ) -> Result<NormalizedImage, NormalizeError>;
}

/// Runs [`depth_chat_normalize::normalize`] on the blocking thread pool.
#[derive(Debug, Clone, Copy)]
pub struct BlockingNormalizer {
    spec: NormalizeSpec,
}

impl BlockingNormalizer {
    /// Creates a normalizer for `spec`.
    pub fn new(spec: NormalizeSpec) -> Self {
        Self { spec }
    }
}

impl Default for BlockingNormalizer {
    fn default() -> Self {
        Self::new(NormalizeSpec::upload())
    }
}

#[async_trait]
impl UploadNormalizer for BlockingNormalizer {
    async fn normalize(
        &self,
        raw: Arc<[u8]>,
        filename: String,
    ) -> Result<NormalizedImage, NormalizeError> {
        let spec = self.spec;
        tokio::task::spawn_blocking(move || normalize(&raw, spec, filename))
            .await
            .map_err(|error| NormalizeError::Encode(format!("normalize task failed: {error}")))?
    }
}

/// Internal failure taxonomy of one submission.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// An image could not be decoded or re-encoded.
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    /// The exchange failed or returned a malformed reply.
    #[error(transparent)]
    Upload(#[from] UploadError),
}

/// Result of one [`UploadOrchestrator::submit`] call.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// Nothing was staged; no state changed.
    NothingStaged,
    /// Another submission holds the in-flight flag; no state changed.
    AlreadyInFlight,
    /// Depth maps were recorded.
    Completed {
        /// Number of maps received.
        depth_maps: usize,
    },
    /// A generic error entry was recorded.
    Failed {
        /// Diagnostic cause.
        error: PipelineError,
    },
}

/// Drives one submission from staged images to a terminal log entry.
pub struct UploadOrchestrator {
    client: InferenceClient,
    normalizer: Arc<dyn UploadNormalizer>,
}

impl UploadOrchestrator {
    /// Creates an orchestrator over `client` and `normalizer`.
    pub fn new(client: InferenceClient, normalizer: Arc<dyn UploadNormalizer>) -> Self {
        Self { client, normalizer }
    }

    /// Submits everything currently staged.
    ///
    /// Appends `Input` before the staged images leave the staging area, then
    /// exactly one `Output` or `Error`, even if the chat was cleared while the
    /// exchange ran. The in-flight flag is released on every exit path.
    pub async fn submit(&self, state: &SharedState) -> SubmitOutcome {
        let (staged, previews) = {
            let mut guard = lock_state(state);
            if guard.staging.is_empty() {
                return SubmitOutcome::NothingStaged;
            }
            let staged = guard.staging.snapshot();
            let previews: Vec<_> = staged.iter().map(|image| image.preview().clone()).collect();
            if guard.upload.begin().is_err() {
                warn!(stage = "submit", action = "rejected", reason = "in_flight");
                return SubmitOutcome::AlreadyInFlight;
            }
            (staged, previews)
        };
        let _release = InFlightRelease {
            state: Arc::clone(state),
        };

        info!(stage = "submit", action = "begin", images = staged.len());

        let jobs = staged.iter().enumerate().map(|(index, image)| {
            self.normalizer
                .normalize(image.bytes(), upload_filename(index))
        });
        let normalized = match try_join_all(jobs).await {
            Ok(normalized) => normalized,
            Err(cause) => {
                error!(stage = "normalize", action = "failed", error = %cause);
                record_terminal(state, ConversationEntry::failure());
                return SubmitOutcome::Failed {
                    error: cause.into(),
                };
            }
        };

        {
            let mut guard = lock_state(state);
            guard.log.append(ConversationEntry::input(previews));
            let ids: Vec<u64> = staged.iter().map(|image| image.id).collect();
            guard.staging.remove_submitted(&ids);
        }
        drop(staged);

        let observer = Arc::new(StateProgress {
            state: Arc::clone(state),
        });
        let (entry, outcome) = match self.client.predict(normalized, observer).await {
            Ok(response) => {
                let count = response.depthmaps.len();
                (
                    ConversationEntry::output(response.depthmaps),
                    SubmitOutcome::Completed { depth_maps: count },
                )
            }
            Err(cause) => {
                error!(stage = "upload", action = "failed", error = %cause);
                (
                    ConversationEntry::failure(),
                    SubmitOutcome::Failed {
                        error: cause.into(),
                    },
                )
            }
        };

        record_terminal(state, entry);
        outcome
    }
}

/// Appends the single `Output` or `Error` entry that closes a submission.
fn record_terminal(state: &SharedState, entry: ConversationEntry) {
    let kind = entry.kind();
    lock_state(state).log.append(entry);
    info!(stage = "submit", action = "recorded", entry = kind);
}

struct InFlightRelease {
    state: SharedState,
}

impl Drop for InFlightRelease {
    fn drop(&mut self) {
        lock_state(&self.state).upload.finish();
    }
}

struct StateProgress {
    state: SharedState,
}

impl ProgressObserver for StateProgress {
    fn on_progress(&self, percent: u8) {
        lock_state(&self.state).upload.set_progress(percent);
    }
}
