#![warn(missing_docs)]
//! # depth-chat-upload
//!
//! ## Purpose
//! Performs the single multipart exchange with the depth inference endpoint.
//!
//! ## Responsibilities
//! - Validate the endpoint URL.
//! - Build one request carrying every normalized image as a `files` part.
//! - Report byte-level upload progress through [`ProgressObserver`].
//! - Map transport, status and body failures into [`UploadError`].
//!
//! ## Data flow
//! Normalized images -> [`InferenceRequest`] -> [`InferenceTransport::send`]
//! -> [`TransportResponse`] -> [`depth_chat_contract::parse_depth_response`].
//!
//! ## Ownership and lifetimes
//! The request owns its part buffers; the real transport moves each buffer
//! into a chunked body stream so progress can be counted as bytes are handed
//! to the connection.
//!
//! ## Error model
//! Exactly one attempt is made. Every failure is returned to the caller as an
//! [`UploadError`]; nothing is retried here.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use depth_chat_contract::{DepthMapResponse, FILES_FIELD, parse_depth_response};
use depth_chat_core::NormalizedImage;
use futures::{Stream, StreamExt};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

/// MIME type of every uploaded part.
pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";

/// Size of the body chunks used for progress accounting.
const PROGRESS_CHUNK_BYTES: usize = 16 * 1024;

/// One file part of the multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartPart {
    /// Form field name, constant across parts.
    pub field: &'static str,
    /// Part filename.
    pub filename: String,
    /// Part MIME type.
    pub content_type: &'static str,
    /// Encoded image bytes.
    pub bytes: Vec<u8>,
}

/// Fully built inference request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceRequest {
    /// Target endpoint.
    pub endpoint: Url,
    /// File parts in submission order.
    pub parts: Vec<MultipartPart>,
}

impl InferenceRequest {
    /// Builds a request with one `files` part per image, preserving order.
    pub fn new(endpoint: Url, images: Vec<NormalizedImage>) -> Self {
        let parts = images
            .into_iter()
            .map(|image| MultipartPart {
                field: FILES_FIELD,
                filename: image.filename.clone(),
                content_type: JPEG_CONTENT_TYPE,
                bytes: image.into_jpeg(),
            })
            .collect();
        Self { endpoint, parts }
    }

    /// Sum of all part payload sizes.
    pub fn total_bytes(&self) -> u64 {
        self.parts.iter().map(|part| part.bytes.len() as u64).sum()
    }

    /// Stable short digest of the payload, used as a log correlation id.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for part in &self.parts {
            hasher.update(part.filename.as_bytes());
            hasher.update((part.bytes.len() as u64).to_le_bytes());
            hasher.update(&part.bytes);
        }
        let digest = hex::encode(hasher.finalize());
        digest[..16].to_string()
    }
}

/// Raw response returned by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body text.
    pub body: String,
}

/// Receives upload progress as an integer percentage.
pub trait ProgressObserver: Send + Sync {
    /// Called with strictly increasing values in `1..=100`.
    fn on_progress(&self, percent: u8);
}

/// Byte counter that converts sent bytes into monotonic percentages.
pub struct UploadProgress {
    total: u64,
    sent: AtomicU64,
    last: AtomicU8,
    observer: Arc<dyn ProgressObserver>,
}

impl UploadProgress {
    /// Creates a counter for a body of `total` bytes.
    pub fn new(total: u64, observer: Arc<dyn ProgressObserver>) -> Self {
        Self {
            total,
            sent: AtomicU64::new(0),
            last: AtomicU8::new(0),
            observer,
        }
    }

    /// Records `bytes` more as sent and notifies on a higher percentage.
    pub fn advance(&self, bytes: u64) {
        let sent = self.sent.fetch_add(bytes, Ordering::SeqCst).saturating_add(bytes);
        let percent = percent_of(sent, self.total);
        let previous = self.last.fetch_max(percent, Ordering::SeqCst);
        if percent > previous {
            self.observer.on_progress(percent);
        }
    }

    /// Highest percentage reported so far.
    pub fn percent(&self) -> u8 {
        self.last.load(Ordering::SeqCst)
    }
}

fn percent_of(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let percent = (sent.min(total) as u128 * 100 + total as u128 / 2) / total as u128;
    percent as u8
}

/// Abstract transport used by the inference client.
#[async_trait]
pub trait InferenceTransport: Send + Sync {
    /// Sends the request once, advancing `progress` as body bytes go out.
    ///
    /// # Errors
    /// Returns [`UploadError::Network`] or [`UploadError::Timeout`] when no
    /// response was received.
    async fn send(
        &self,
        request: InferenceRequest,
        progress: Arc<UploadProgress>,
    ) -> Result<TransportResponse, UploadError>;
}

/// Client that validates endpoint policy and runs one inference exchange.
#[derive(Clone)]
pub struct InferenceClient {
    endpoint: Url,
    transport: Arc<dyn InferenceTransport>,
}

impl InferenceClient {
    /// Creates a validated client.
    ///
    /// # Errors
    /// Returns [`UploadError::InvalidEndpoint`] when the URL is unusable.
    pub fn new(
        endpoint: &str,
        transport: Arc<dyn InferenceTransport>,
    ) -> Result<Self, UploadError> {
        let endpoint = validate_endpoint(endpoint)?;
        Ok(Self {
            endpoint,
            transport,
        })
    }

    /// Configured endpoint.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Uploads `images` in one request and returns the parsed depth maps.
    ///
    /// # Errors
    /// Returns [`UploadError::Status`] for non-2xx replies and
    /// [`UploadError::BadResponse`] for bodies that violate the contract.
    pub async fn predict(
        &self,
        images: Vec<NormalizedImage>,
        observer: Arc<dyn ProgressObserver>,
    ) -> Result<DepthMapResponse, UploadError> {
        let request = InferenceRequest::new(self.endpoint.clone(), images);
        let expected = request.parts.len();
        let request_id = request.fingerprint();
        let progress = Arc::new(UploadProgress::new(request.total_bytes(), observer));

        info!(
            stage = "upload",
            action = "send",
            request_id = %request_id,
            parts = expected,
            bytes = request.total_bytes()
        );

        let response = self.transport.send(request, progress).await?;
        if !(200..300).contains(&response.status) {
            warn!(
                stage = "upload",
                action = "status",
                request_id = %request_id,
                status = response.status
            );
            return Err(UploadError::Status(response.status));
        }

        let parsed = parse_depth_response(&response.body, expected)
            .map_err(|error| UploadError::BadResponse(error.to_string()))?;
        info!(
            stage = "upload",
            action = "received",
            request_id = %request_id,
            depth_maps = parsed.depthmaps.len()
        );
        Ok(parsed)
    }
}

/// Validates that `endpoint` is an absolute `http`/`https` URL with a host.
///
/// # Errors
/// Returns [`UploadError::InvalidEndpoint`] otherwise.
pub fn validate_endpoint(endpoint: &str) -> Result<Url, UploadError> {
    let parsed = Url::parse(endpoint)
        .map_err(|error| UploadError::InvalidEndpoint(format!("invalid url: {error}")))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(UploadError::InvalidEndpoint(format!(
            "unsupported scheme {}",
            parsed.scheme()
        )));
    }
    if parsed.host_str().is_none() {
        return Err(UploadError::InvalidEndpoint("endpoint has no host".to_string()));
    }

    Ok(parsed)
}

/// HTTP transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a transport with a whole-request timeout.
    ///
    /// # Errors
    /// Returns [`UploadError::Network`] when the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, UploadError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| UploadError::Network(error.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl InferenceTransport for ReqwestTransport {
    async fn send(
        &self,
        request: InferenceRequest,
        progress: Arc<UploadProgress>,
    ) -> Result<TransportResponse, UploadError> {
        let mut form = reqwest::multipart::Form::new();
        for part in request.parts {
            let length = part.bytes.len() as u64;
            let body = reqwest::Body::wrap_stream(progress_stream(part.bytes, Arc::clone(&progress)));
            let file = reqwest::multipart::Part::stream_with_length(body, length)
                .file_name(part.filename)
                .mime_str(part.content_type)
                .map_err(|error| UploadError::Network(error.to_string()))?;
            form = form.part(part.field, file);
        }

        let response = self
            .client
            .post(request.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_reqwest_error)?;
        Ok(TransportResponse { status, body })
    }
}

fn progress_stream(
    bytes: Vec<u8>,
    progress: Arc<UploadProgress>,
) -> impl Stream<Item = Result<Vec<u8>, std::io::Error>> + Send + Sync + 'static {
    let chunks: Vec<Vec<u8>> = bytes.chunks(PROGRESS_CHUNK_BYTES).map(<[u8]>::to_vec).collect();
    futures::stream::iter(chunks).map(move |chunk| {
        progress.advance(chunk.len() as u64);
        Ok(chunk)
    })
}

fn map_reqwest_error(error: reqwest::Error) -> UploadError {
    if error.is_timeout() {
        UploadError::Timeout
    } else {
        UploadError::Network(error.to_string())
    }
}

/// Upload layer error type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UploadError {
    /// Endpoint URL is unusable.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    /// Connection or protocol failure before a response arrived.
    #[error("network failure: {0}")]
    Network(String),
    /// Request exceeded the configured timeout.
    #[error("request timed out")]
    Timeout,
    /// Server replied with a non-2xx status.
    #[error("server replied with status {0}")]
    Status(u16),
    /// Reply body violates the response contract.
    #[error("malformed response: {0}")]
    BadResponse(String),
}
