#![warn(missing_docs)]
//! # depth-chat-ui
//!
//! ## Purpose
//! Defines the UI-facing runtime state model for `depth-chat`.
//!
//! ## Responsibilities
//! - Hold staged images awaiting submission ([`ImageStagingArea`]).
//! - Hold the append-only conversation history ([`ConversationLog`]).
//! - Track the single in-flight upload ([`UploadSession`]).
//! - Model the two-step clear confirmation and project display status.
//!
//! ## Data flow
//! Picker/drop/camera events and orchestrator steps mutate [`AppState`],
//! which drives the rendered history and input bar via [`project_status`].
//!
//! ## Ownership and lifetimes
//! `AppState` owns every collection. Callers that share it across tasks wrap
//! it in a mutex and never hold the guard across an await point.
//!
//! ## Error model
//! This crate favors explicit state over recoverable errors. Out-of-range
//! removals are no-ops; a second upload claim is refused with
//! [`UploadBusy`].

use depth_chat_core::{ConversationEntry, StagedImage};

/// Ordered images selected or captured but not yet submitted.
#[derive(Debug, Clone, Default)]
pub struct ImageStagingArea {
    images: Vec<StagedImage>,
    next_id: u64,
}

impl ImageStagingArea {
    /// Creates an empty staging area.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends raw images in order and returns their assigned ids.
    pub fn add<I, N, B>(&mut self, items: I) -> Vec<u64>
    where
        I: IntoIterator<Item = (N, B)>,
        N: Into<String>,
        B: Into<std::sync::Arc<[u8]>>,
    {
        items
            .into_iter()
            .map(|(name, bytes)| {
                self.next_id += 1;
                let id = self.next_id;
                self.images.push(StagedImage::new(id, name, bytes));
                id
            })
            .collect()
    }

    /// Removes the image at `index`; out-of-range indices are ignored.
    pub fn remove_at(&mut self, index: usize) -> Option<StagedImage> {
        if index < self.images.len() {
            Some(self.images.remove(index))
        } else {
            None
        }
    }

    /// Removes exactly the images whose ids are listed, keeping later adds.
    pub fn remove_submitted(&mut self, ids: &[u64]) {
        self.images.retain(|image| !ids.contains(&image.id));
    }

    /// Empties the area, releasing every preview held by it.
    pub fn clear(&mut self) {
        self.images.clear();
    }

    /// Staged images in insertion order.
    pub fn images(&self) -> &[StagedImage] {
        &self.images
    }

    /// Cloned snapshot for hand-off to a submission.
    pub fn snapshot(&self) -> Vec<StagedImage> {
        self.images.clone()
    }

    /// Number of staged images.
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Returns `true` when nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// Append-only conversation history.
#[derive(Debug, Clone, Default)]
pub struct ConversationLog {
    entries: Vec<ConversationEntry>,
}

impl ConversationLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one entry.
    pub fn append(&mut self, entry: ConversationEntry) {
        self.entries.push(entry);
    }

    /// Empties the log.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Read-only view of every entry.
    pub fn snapshot(&self) -> &[ConversationEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when the log is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Returned when an upload is already in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadBusy;

/// State of the single network submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadSession {
    in_flight: bool,
    progress_percent: u8,
}

impl UploadSession {
    /// Claims the session for a new submission.
    ///
    /// # Errors
    /// Returns [`UploadBusy`] when another submission holds it.
    pub fn begin(&mut self) -> Result<(), UploadBusy> {
        if self.in_flight {
            return Err(UploadBusy);
        }
        self.in_flight = true;
        self.progress_percent = 0;
        Ok(())
    }

    /// Raises progress; lower values and updates while idle are ignored.
    pub fn set_progress(&mut self, percent: u8) {
        if self.in_flight {
            self.progress_percent = self.progress_percent.max(percent.min(100));
        }
    }

    /// Releases the session and resets progress.
    pub fn finish(&mut self) {
        self.in_flight = false;
        self.progress_percent = 0;
    }

    /// Whether a submission is running.
    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Current upload progress.
    pub fn progress_percent(&self) -> u8 {
        self.progress_percent
    }
}

/// Two-step "clear chat" confirmation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClearPrompt {
    /// No confirmation pending.
    #[default]
    Hidden,
    /// User asked to clear and must confirm or cancel.
    Confirming,
}

/// Aggregate UI runtime state.
#[derive(Debug, Default)]
pub struct AppState {
    /// Images awaiting submission.
    pub staging: ImageStagingArea,
    /// Visible history.
    pub log: ConversationLog,
    /// Network submission state.
    pub upload: UploadSession,
    /// Clear confirmation state.
    pub clear_prompt: ClearPrompt,
}

impl AppState {
    /// Creates empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empties history and staging together.
    ///
    /// An upload already in flight keeps its claim and still appends its
    /// terminal entry to the fresh history.
    pub fn clear_chat(&mut self) {
        self.log.clear();
        self.staging.clear();
        self.clear_prompt = ClearPrompt::Hidden;
    }

    /// First step of the clear gesture; ignored while the log is empty.
    pub fn request_clear(&mut self) {
        if !self.log.is_empty() {
            self.clear_prompt = ClearPrompt::Confirming;
        }
    }

    /// Dismisses a pending clear request.
    pub fn cancel_clear(&mut self) {
        self.clear_prompt = ClearPrompt::Hidden;
    }

    /// Confirms a pending clear request.
    ///
    /// # Returns
    /// `true` when the chat was cleared.
    pub fn confirm_clear(&mut self) -> bool {
        if self.clear_prompt != ClearPrompt::Confirming {
            return false;
        }
        self.clear_chat();
        true
    }
}

/// Flat projection of [`AppState`] for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    /// Whether the submit control is enabled.
    pub can_submit: bool,
    /// Input bar hint.
    pub staging_label: String,
    /// Progress line while a submission runs.
    pub progress_label: Option<String>,
    /// Whether the clear control should be shown.
    pub can_clear: bool,
    /// Number of history entries.
    pub entries: usize,
}

/// Projects state into display strings.
pub fn project_status(state: &AppState) -> StatusSnapshot {
    let staged = state.staging.len();
    let staging_label = if staged > 0 {
        format!("{staged} images ready for analysis")
    } else {
        "Drag and drop images or click +".to_string()
    };

    let progress_label = state.upload.in_flight().then(|| {
        let percent = state.upload.progress_percent();
        if percent < 100 {
            format!("Syncing Data: {percent}%")
        } else {
            "Calculating Neural Depth...".to_string()
        }
    });

    StatusSnapshot {
        can_submit: staged > 0 && !state.upload.in_flight(),
        staging_label,
        progress_label,
        can_clear: !state.log.is_empty(),
        entries: state.log.len(),
    }
}
