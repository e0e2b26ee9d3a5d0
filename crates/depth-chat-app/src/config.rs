//! Runtime configuration and transport wiring.

use std::sync::Arc;
use std::time::Duration;

use depth_chat_camera::FacingMode;
use depth_chat_normalize::NormalizeSpec;
use depth_chat_upload::{InferenceClient, ReqwestTransport, validate_endpoint};

use crate::{AppError, BlockingNormalizer, UploadOrchestrator};

/// Hosted inference endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "https://bhargav0307-depth-reconstruction-api.hf.space/predict";

/// Default whole-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Validated runtime configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Inference endpoint URL.
    pub endpoint: String,
    /// Whole-request timeout.
    pub request_timeout: Duration,
    /// Normalization applied to staged images on submit.
    pub upload: NormalizeSpec,
    /// Normalization applied to camera captures.
    pub camera: NormalizeSpec,
    /// Preferred camera facing.
    pub facing: FacingMode,
}

impl AppConfig {
    /// Creates configuration with default presets for `endpoint`.
    ///
    /// # Errors
    /// Returns [`AppError::Upload`] for an unusable endpoint.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, AppError> {
        let config = Self {
            endpoint: endpoint.into(),
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Overrides the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Checks the endpoint and both normalization presets.
    ///
    /// # Errors
    /// Returns the first invalid setting.
    pub fn validate(&self) -> Result<(), AppError> {
        validate_endpoint(&self.endpoint)?;
        self.upload.validate()?;
        self.camera.validate()?;
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            upload: NormalizeSpec::upload(),
            camera: NormalizeSpec::camera(),
            facing: FacingMode::Environment,
        }
    }
}

/// Builds an orchestrator talking HTTP to the configured endpoint.
///
/// # Errors
/// Returns [`AppError`] when the configuration or HTTP client is invalid.
pub fn build_orchestrator(config: &AppConfig) -> Result<UploadOrchestrator, AppError> {
    config.validate()?;
    let transport = Arc::new(ReqwestTransport::new(config.request_timeout)?);
    let client = InferenceClient::new(&config.endpoint, transport)?;
    Ok(UploadOrchestrator::new(
        client,
        Arc::new(BlockingNormalizer::new(config.upload)),
    ))
}
