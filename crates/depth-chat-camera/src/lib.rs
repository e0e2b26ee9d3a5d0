#![warn(missing_docs)]
//! # depth-chat-camera
//!
//! ## Purpose
//! Manages exclusive access to a live video capture device and turns one
//! sampled frame into a normalized square image.
//!
//! ## Responsibilities
//! - Define backend-agnostic camera acquisition traits.
//! - Enforce the `Closed -> Opening -> Open -> Closed` session state machine.
//! - Provide a deterministic synthetic backend for CI and unit tests.
//!
//! ## Data flow
//! UI asks to open -> [`CameraBackend::open_stream`] resolves permission and
//! yields a [`VideoStream`] -> user captures -> frame is normalized to
//! 384x384 and handed back as a [`NormalizedImage`] -> session closes.
//!
//! ## Ownership and lifetimes
//! The session exclusively owns the open stream. Streams are stopped when the
//! session closes, when a capture completes, or when a stream arrives for an
//! open request that was already cancelled.
//!
//! ## Error model
//! Permission and device failures surface as [`CameraError`] and always leave
//! the session `Closed`. Capturing while not open is a tolerated no-op.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use depth_chat_core::{NormalizedImage, camera_filename};
use depth_chat_normalize::{NormalizeError, NormalizeSpec, normalize_frame};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Ideal capture resolution hinted to the device.
pub const IDEAL_RESOLUTION: u32 = 800;

/// Preferred camera direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FacingMode {
    /// Front camera.
    User,
    /// Rear camera.
    #[default]
    Environment,
}

/// Constraints forwarded to the backend when acquiring a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConstraints {
    /// Preferred facing.
    pub facing: FacingMode,
    /// Ideal frame width.
    pub ideal_width: u32,
    /// Ideal frame height.
    pub ideal_height: u32,
}

impl StreamConstraints {
    /// Square-ish constraints for the given facing preference.
    pub fn new(facing: FacingMode) -> Self {
        Self {
            facing,
            ideal_width: IDEAL_RESOLUTION,
            ideal_height: IDEAL_RESOLUTION,
        }
    }
}

/// One sampled RGBA video frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA bytes in row-major order.
    pub rgba: Vec<u8>,
}

/// Live stream handed out by a backend.
pub trait VideoStream: Send {
    /// Samples the current frame.
    ///
    /// # Errors
    /// Returns [`CameraError::Backend`] when no frame is available.
    fn grab_frame(&mut self) -> Result<VideoFrame, CameraError>;

    /// Stops every underlying track. Must be idempotent.
    fn stop(&mut self);
}

/// Trait implemented by concrete camera providers.
#[async_trait]
pub trait CameraBackend: Send + Sync {
    /// Requests a stream, resolving any permission prompt first.
    ///
    /// # Errors
    /// Returns [`CameraError::PermissionDenied`] or
    /// [`CameraError::DeviceUnavailable`].
    async fn open_stream(
        &self,
        constraints: StreamConstraints,
    ) -> Result<Box<dyn VideoStream>, CameraError>;
}

/// Observable session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraState {
    /// No stream and no pending request.
    Closed,
    /// Waiting for the backend to grant a stream.
    Opening,
    /// Stream is live.
    Open,
}

/// Ticket identifying one open request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenTicket(u64);

/// Exclusive camera session.
pub struct CameraSession {
    state: CameraState,
    stream: Option<Box<dyn VideoStream>>,
    pending: Option<OpenTicket>,
    next_ticket: u64,
    spec: NormalizeSpec,
}

impl CameraSession {
    /// Creates a closed session using the 384x384 capture preset.
    pub fn new() -> Self {
        Self::with_spec(NormalizeSpec::camera())
    }

    /// Creates a closed session with a custom capture normalization.
    pub fn with_spec(spec: NormalizeSpec) -> Self {
        Self {
            state: CameraState::Closed,
            stream: None,
            pending: None,
            next_ticket: 0,
            spec,
        }
    }

    /// Current state.
    pub fn state(&self) -> CameraState {
        self.state
    }

    /// Returns `true` while a stream is live.
    pub fn is_open(&self) -> bool {
        self.state == CameraState::Open
    }

    /// Starts an open request.
    ///
    /// # Returns
    /// `None` when the session is already opening or open; the request is
    /// ignored in that case.
    pub fn begin_open(&mut self) -> Option<OpenTicket> {
        if self.state != CameraState::Closed {
            debug!(stage = "camera", action = "open_ignored", state = ?self.state);
            return None;
        }

        self.next_ticket += 1;
        let ticket = OpenTicket(self.next_ticket);
        self.state = CameraState::Opening;
        self.pending = Some(ticket);
        Some(ticket)
    }

    /// Completes an open request with the backend result.
    ///
    /// A stream that arrives for a cancelled or superseded ticket is stopped
    /// immediately and the session state is left unchanged.
    ///
    /// # Errors
    /// Propagates backend failures after returning the session to `Closed`.
    pub fn complete_open(
        &mut self,
        ticket: OpenTicket,
        result: Result<Box<dyn VideoStream>, CameraError>,
    ) -> Result<(), CameraError> {
        let current = self.pending == Some(ticket) && self.state == CameraState::Opening;

        match result {
            Ok(mut stream) if !current => {
                stream.stop();
                info!(stage = "camera", action = "stale_stream_stopped");
                Ok(())
            }
            Ok(stream) => {
                self.pending = None;
                self.stream = Some(stream);
                self.state = CameraState::Open;
                info!(stage = "camera", action = "opened");
                Ok(())
            }
            Err(error) => {
                if current {
                    self.pending = None;
                    self.state = CameraState::Closed;
                }
                warn!(stage = "camera", action = "open_failed", error = %error);
                Err(error)
            }
        }
    }

    /// Opens the session through `backend` when the caller owns the session
    /// across the permission await.
    ///
    /// # Errors
    /// See [`CameraSession::complete_open`].
    pub async fn open(
        &mut self,
        backend: &dyn CameraBackend,
        facing: FacingMode,
    ) -> Result<(), CameraError> {
        let Some(ticket) = self.begin_open() else {
            return Ok(());
        };
        let result = backend.open_stream(StreamConstraints::new(facing)).await;
        self.complete_open(ticket, result)
    }

    /// Samples the live frame and returns it normalized as `cam_{ms}.jpg`.
    ///
    /// # Returns
    /// `Ok(None)` when the session is not open. On success the session closes.
    ///
    /// # Errors
    /// Frame grab or normalization failures leave the session open.
    pub fn capture(&mut self, captured_at_ms: u64) -> Result<Option<NormalizedImage>, CameraError> {
        if self.state != CameraState::Open {
            debug!(stage = "camera", action = "capture_ignored", state = ?self.state);
            return Ok(None);
        }
        let Some(stream) = self.stream.as_mut() else {
            return Ok(None);
        };

        let frame = stream.grab_frame()?;
        let image = normalize_frame(
            frame.width,
            frame.height,
            frame.rgba,
            self.spec,
            camera_filename(captured_at_ms),
        )?;

        info!(
            stage = "camera",
            action = "captured",
            filename = %image.filename,
            bytes = image.jpeg().len()
        );
        self.close();
        Ok(Some(image))
    }

    /// Releases the stream and cancels any pending open. Idempotent.
    pub fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
        }
        if self.state != CameraState::Closed {
            info!(stage = "camera", action = "closed");
        }
        self.pending = None;
        self.state = CameraState::Closed;
    }
}

impl Default for CameraSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
        }
    }
}

/// How the synthetic backend answers open requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntheticBehavior {
    /// Grant a stream of solid frames.
    Grant,
    /// Fail with [`CameraError::PermissionDenied`].
    Deny,
    /// Fail with [`CameraError::DeviceUnavailable`].
    Unavailable,
}

/// Deterministic synthetic backend for test and CI usage.
#[derive(Debug)]
pub struct SyntheticCamera {
    width: u32,
    height: u32,
    behavior: SyntheticBehavior,
    live_tracks: Arc<AtomicUsize>,
}

impl SyntheticCamera {
    /// Creates a backend that grants `width x height` streams.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            behavior: SyntheticBehavior::Grant,
            live_tracks: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Creates a backend with the given open behavior.
    pub fn with_behavior(width: u32, height: u32, behavior: SyntheticBehavior) -> Self {
        Self {
            behavior,
            ..Self::new(width, height)
        }
    }

    /// Number of streams handed out and not yet stopped.
    pub fn live_tracks(&self) -> usize {
        self.live_tracks.load(Ordering::SeqCst)
    }
}

impl Default for SyntheticCamera {
    fn default() -> Self {
        Self::new(IDEAL_RESOLUTION, IDEAL_RESOLUTION)
    }
}

#[async_trait]
impl CameraBackend for SyntheticCamera {
    async fn open_stream(
        &self,
        constraints: StreamConstraints,
    ) -> Result<Box<dyn VideoStream>, CameraError> {
        match self.behavior {
            SyntheticBehavior::Deny => Err(CameraError::PermissionDenied),
            SyntheticBehavior::Unavailable => Err(CameraError::DeviceUnavailable(format!(
                "no {:?} camera attached",
                constraints.facing
            ))),
            SyntheticBehavior::Grant => {
                self.live_tracks.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(SyntheticStream {
                    width: self.width,
                    height: self.height,
                    sequence: 0,
                    stopped: false,
                    live_tracks: Arc::clone(&self.live_tracks),
                }))
            }
        }
    }
}

struct SyntheticStream {
    width: u32,
    height: u32,
    sequence: u64,
    stopped: bool,
    live_tracks: Arc<AtomicUsize>,
}

impl VideoStream for SyntheticStream {
    fn grab_frame(&mut self) -> Result<VideoFrame, CameraError> {
        if self.stopped {
            return Err(CameraError::Backend("stream already stopped".to_string()));
        }

        self.sequence += 1;
        let byte = (self.sequence % 255) as u8;
        let rgba_len = (self.width as usize) * (self.height as usize) * 4;
        Ok(VideoFrame {
            width: self.width,
            height: self.height,
            rgba: vec![byte; rgba_len],
        })
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.live_tracks.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for SyntheticStream {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Camera layer error type.
#[derive(Debug, Error)]
pub enum CameraError {
    /// User or platform refused camera access.
    #[error("camera permission denied")]
    PermissionDenied,
    /// No usable capture device.
    #[error("camera device unavailable: {0}")]
    DeviceUnavailable(String),
    /// Runtime failure of an open stream.
    #[error("camera backend failure: {0}")]
    Backend(String),
    /// Captured frame could not be normalized.
    #[error("camera frame normalization failed: {0}")]
    Normalize(#[from] NormalizeError),
}
