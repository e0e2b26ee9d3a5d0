//! Camera controller that feeds captures into the staging area.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use depth_chat_camera::{
    CameraBackend, CameraError, CameraSession, CameraState, FacingMode, StreamConstraints,
};
use depth_chat_normalize::NormalizeSpec;
use tracing::{info, warn};

use crate::{SharedState, lock_state};

/// Owns the singleton camera session for the app.
pub struct CameraController {
    backend: Arc<dyn CameraBackend>,
    session: Mutex<CameraSession>,
    facing: FacingMode,
}

impl CameraController {
    /// Creates a controller with a closed session.
    pub fn new(backend: Arc<dyn CameraBackend>, facing: FacingMode, spec: NormalizeSpec) -> Self {
        Self {
            backend,
            session: Mutex::new(CameraSession::with_spec(spec)),
            facing,
        }
    }

    /// Current session state.
    pub fn state(&self) -> CameraState {
        self.session().state()
    }

    /// Opens the camera; ignored while already opening or open.
    ///
    /// The session lock is not held while the backend resolves permission.
    ///
    /// # Errors
    /// Returns the backend failure after the session reverted to `Closed`.
    pub async fn open(&self) -> Result<(), CameraError> {
        let Some(ticket) = self.session().begin_open() else {
            return Ok(());
        };

        let result = self
            .backend
            .open_stream(StreamConstraints::new(self.facing))
            .await;
        self.session().complete_open(ticket, result)
    }

    /// Toggles between open and closed, as the camera button does.
    ///
    /// # Errors
    /// See [`CameraController::open`].
    pub async fn toggle(&self) -> Result<(), CameraError> {
        if self.state() == CameraState::Closed {
            self.open().await
        } else {
            self.close();
            Ok(())
        }
    }

    /// Releases the camera. Idempotent.
    pub fn close(&self) {
        self.session().close();
    }

    /// Captures one frame and appends it to the staging area.
    ///
    /// # Returns
    /// `Ok(false)` when the camera was not open.
    ///
    /// # Errors
    /// Frame grab or normalization failures; the camera stays open.
    pub fn capture_into(&self, state: &SharedState, captured_at_ms: u64) -> Result<bool, CameraError> {
        let captured = match self.session().capture(captured_at_ms) {
            Ok(captured) => captured,
            Err(error) => {
                warn!(stage = "camera", action = "capture_failed", error = %error);
                return Err(error);
            }
        };
        let Some(image) = captured else {
            return Ok(false);
        };

        let filename = image.filename.clone();
        let staged = lock_state(state)
            .staging
            .add([(filename.clone(), image.into_jpeg())]);
        info!(stage = "camera", action = "staged", filename = %filename, ids = ?staged);
        Ok(true)
    }

    fn session(&self) -> MutexGuard<'_, CameraSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
