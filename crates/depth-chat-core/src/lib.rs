#![warn(missing_docs)]
//! # depth-chat-core
//!
//! ## Purpose
//! Defines the pure data model used across the `depth-chat` workspace.
//!
//! ## Responsibilities
//! - Represent staged (raw) images and their display preview handles.
//! - Represent normalized, upload-ready image buffers.
//! - Represent immutable conversation log entries.
//!
//! ## Data flow
//! File/camera input becomes a [`StagedImage`]. Submission normalizes it into a
//! [`NormalizedImage`] and records a [`ConversationEntry`] for every visible
//! step of the exchange.
//!
//! ## Ownership and lifetimes
//! Raw bytes are shared through `Arc<[u8]>` so previews, staged images and the
//! log can reference the same buffer without copying. Normalized images own
//! their encoded buffer (`Vec<u8>`) for the duration of one request.
//!
//! ## Error model
//! Construction-time validation failures return [`CoreError`].
//!
//! ## Example
//! ```rust
//! use depth_chat_core::{ConversationEntry, PreviewHandle, upload_filename};
//!
//! let preview = PreviewHandle::new(1, vec![0xFF, 0xD8].into());
//! let entry = ConversationEntry::input(vec![preview]);
//! assert_eq!(entry.kind(), "input");
//! assert_eq!(upload_filename(0), "upload_0.jpg");
//! ```

use std::fmt;
use std::sync::{Arc, Weak};

use thiserror::Error;

/// User-facing message recorded for every failed submission.
pub const FAILURE_MESSAGE: &str = "Inference failed. Check backend connection and Laptop IP.";

/// Returns the multipart filename for the image at `index` in one submission.
pub fn upload_filename(index: usize) -> String {
    format!("upload_{index}.jpg")
}

/// Returns the filename assigned to a camera capture taken at `captured_at_ms`.
pub fn camera_filename(captured_at_ms: u64) -> String {
    format!("cam_{captured_at_ms}.jpg")
}

/// Shared display handle over the raw bytes of one staged image.
///
/// Cloning is cheap. The handle is released once every clone has been dropped;
/// use [`PreviewHandle::probe`] to observe release.
#[derive(Clone)]
pub struct PreviewHandle {
    id: u64,
    bytes: Arc<[u8]>,
}

impl PreviewHandle {
    /// Creates a preview over `bytes`.
    pub fn new(id: u64, bytes: Arc<[u8]>) -> Self {
        Self { id, bytes }
    }

    /// Staging-unique id of the image this preview was derived from.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Raw bytes backing the preview.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns a weak probe that reports when the preview has been released.
    pub fn probe(&self) -> PreviewProbe {
        PreviewProbe {
            bytes: Arc::downgrade(&self.bytes),
        }
    }
}

impl fmt::Debug for PreviewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreviewHandle")
            .field("id", &self.id)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl PartialEq for PreviewHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Arc::ptr_eq(&self.bytes, &other.bytes)
    }
}

impl Eq for PreviewHandle {}

/// Weak observer of a [`PreviewHandle`].
#[derive(Debug, Clone)]
pub struct PreviewProbe {
    bytes: Weak<[u8]>,
}

impl PreviewProbe {
    /// Returns `true` once no handle (and no staged image) keeps the bytes alive.
    pub fn is_released(&self) -> bool {
        self.bytes.strong_count() == 0
    }
}

/// Raw, un-normalized image selected or captured by the user.
#[derive(Clone, PartialEq, Eq)]
pub struct StagedImage {
    /// Staging-unique id, stable for the lifetime of the image.
    pub id: u64,
    /// Original filename as reported by the picker or capture path.
    pub name: String,
    bytes: Arc<[u8]>,
    preview: PreviewHandle,
}

impl StagedImage {
    /// Creates a staged image and derives its preview handle.
    pub fn new(id: u64, name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes = bytes.into();
        Self {
            id,
            name: name.into(),
            preview: PreviewHandle::new(id, Arc::clone(&bytes)),
            bytes,
        }
    }

    /// Raw input bytes, shared with the preview.
    pub fn bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    /// Preview handle for display.
    pub fn preview(&self) -> &PreviewHandle {
        &self.preview
    }
}

impl fmt::Debug for StagedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagedImage")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Compressed, bounded-dimension image ready for network transfer.
#[derive(Clone, PartialEq, Eq)]
pub struct NormalizedImage {
    /// Filename used for the multipart part.
    pub filename: String,
    /// Encoded width in pixels.
    pub width: u32,
    /// Encoded height in pixels.
    pub height: u32,
    jpeg: Vec<u8>,
}

impl NormalizedImage {
    /// Constructs a validated normalized image.
    ///
    /// # Errors
    /// Returns [`CoreError::EmptyImage`] when `jpeg` is empty and
    /// [`CoreError::InvalidDimensions`] when either side is zero.
    pub fn new(
        filename: impl Into<String>,
        width: u32,
        height: u32,
        jpeg: Vec<u8>,
    ) -> Result<Self, CoreError> {
        if width == 0 || height == 0 {
            return Err(CoreError::InvalidDimensions { width, height });
        }
        if jpeg.is_empty() {
            return Err(CoreError::EmptyImage);
        }

        Ok(Self {
            filename: filename.into(),
            width,
            height,
            jpeg,
        })
    }

    /// Returns a copy carrying a different filename.
    pub fn renamed(self, filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            ..self
        }
    }

    /// Encoded JPEG bytes.
    pub fn jpeg(&self) -> &[u8] {
        &self.jpeg
    }

    /// Consumes the image and returns its encoded bytes.
    pub fn into_jpeg(self) -> Vec<u8> {
        self.jpeg
    }
}

impl fmt::Debug for NormalizedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NormalizedImage")
            .field("filename", &self.filename)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("len", &self.jpeg.len())
            .finish()
    }
}

/// One immutable entry of the visible conversation history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationEntry {
    /// Optimistic record of the images a submission is sending.
    Input {
        /// Previews in submission order.
        previews: Vec<PreviewHandle>,
    },
    /// Depth maps returned by a successful exchange.
    Output {
        /// Base64 payloads, 1:1 with the images sent.
        depth_maps: Vec<String>,
    },
    /// Failed exchange.
    Error {
        /// Fixed user-facing message.
        message: String,
    },
}

impl ConversationEntry {
    /// Builds an input entry.
    pub fn input(previews: Vec<PreviewHandle>) -> Self {
        Self::Input { previews }
    }

    /// Builds an output entry.
    pub fn output(depth_maps: Vec<String>) -> Self {
        Self::Output { depth_maps }
    }

    /// Builds the generic failure entry.
    pub fn failure() -> Self {
        Self::Error {
            message: FAILURE_MESSAGE.to_string(),
        }
    }

    /// Short tag for logs and projections.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Input { .. } => "input",
            Self::Output { .. } => "output",
            Self::Error { .. } => "error",
        }
    }

    /// Returns `true` for entries that close a submission.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Input { .. })
    }
}

/// Error type for core model validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// Encoded buffer is empty.
    #[error("normalized image buffer is empty")]
    EmptyImage,
    /// One of the image sides is zero.
    #[error("invalid image dimensions {width}x{height}")]
    InvalidDimensions {
        /// Declared width.
        width: u32,
        /// Declared height.
        height: u32,
    },
}

#[cfg(test)]
mod tests {
    //! Unit tests for preview lifetime and entry helpers.

    use super::*;

    #[test]
    fn preview_is_released_after_last_owner_drops() {
        let staged = StagedImage::new(7, "a.png", vec![1, 2, 3]);
        let preview = staged.preview().clone();
        let probe = preview.probe();

        drop(staged);
        assert!(!probe.is_released());

        drop(preview);
        assert!(probe.is_released());
    }

    #[test]
    fn failure_entry_is_terminal() {
        assert!(ConversationEntry::failure().is_terminal());
        assert!(!ConversationEntry::input(vec![]).is_terminal());
    }
}
