//! Shared fixtures for app integration tests.

use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use depth_chat_app::{UploadNormalizer, UploadOrchestrator};
use depth_chat_core::NormalizedImage;
use depth_chat_normalize::NormalizeError;
use depth_chat_upload::{
    InferenceClient, InferenceRequest, InferenceTransport, TransportResponse, UploadError,
    UploadProgress,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use tokio::sync::Notify;

pub const ENDPOINT: &str = "https://depth.example.test/predict";

/// Encodes a small PNG fixture.
#[allow(dead_code)]
pub fn png_fixture(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb([90, 160, 220]));
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("png fixture should encode");
    bytes
}

/// Transport replaying a canned reply, optionally parked until released.
#[allow(dead_code)]
pub struct ScriptedTransport {
    reply: Result<TransportResponse, UploadError>,
    gate: Option<Arc<Notify>>,
    pub entered: Arc<Notify>,
    pub requests: Mutex<Vec<InferenceRequest>>,
}

#[allow(dead_code)]
impl ScriptedTransport {
    pub fn ok(body: &str) -> Arc<Self> {
        Self::build(
            Ok(TransportResponse {
                status: 200,
                body: body.to_string(),
            }),
            None,
        )
    }

    pub fn failing(error: UploadError) -> Arc<Self> {
        Self::build(Err(error), None)
    }

    pub fn gated(body: &str, gate: Arc<Notify>) -> Arc<Self> {
        Self::build(
            Ok(TransportResponse {
                status: 200,
                body: body.to_string(),
            }),
            Some(gate),
        )
    }

    fn build(reply: Result<TransportResponse, UploadError>, gate: Option<Arc<Notify>>) -> Arc<Self> {
        Arc::new(Self {
            reply,
            gate,
            entered: Arc::new(Notify::new()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn part_names(&self) -> Vec<String> {
        let requests = self.requests.lock().expect("request log lock");
        requests
            .last()
            .map(|request| request.parts.iter().map(|part| part.filename.clone()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl InferenceTransport for ScriptedTransport {
    async fn send(
        &self,
        request: InferenceRequest,
        progress: Arc<UploadProgress>,
    ) -> Result<TransportResponse, UploadError> {
        for part in &request.parts {
            progress.advance(part.bytes.len() as u64);
        }
        self.requests.lock().expect("request log lock").push(request);
        self.entered.notify_one();
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.reply.clone()
    }
}

/// Normalizer that finishes later for earlier indices, so completion order is
/// the reverse of input order.
#[allow(dead_code)]
#[derive(Default)]
pub struct ReversingNormalizer {
    pub completed: Mutex<Vec<String>>,
}

#[async_trait]
impl UploadNormalizer for ReversingNormalizer {
    async fn normalize(
        &self,
        raw: Arc<[u8]>,
        filename: String,
    ) -> Result<NormalizedImage, NormalizeError> {
        let index: u64 = filename
            .trim_start_matches("upload_")
            .trim_end_matches(".jpg")
            .parse()
            .expect("orchestrator names parts upload_{i}.jpg");
        tokio::time::sleep(Duration::from_millis(50 - index * 10)).await;
        self.completed
            .lock()
            .expect("completion log lock")
            .push(filename.clone());
        NormalizedImage::new(filename, 1, 1, raw.to_vec())
            .map_err(|error| NormalizeError::Encode(error.to_string()))
    }
}

/// Builds an orchestrator over `transport` and `normalizer`.
#[allow(dead_code)]
pub fn orchestrator(
    transport: Arc<ScriptedTransport>,
    normalizer: Arc<dyn UploadNormalizer>,
) -> UploadOrchestrator {
    let client = InferenceClient::new(ENDPOINT, transport).expect("client should build");
    UploadOrchestrator::new(client, normalizer)
}

/// Normalizer that parks every call until `release` is notified.
#[allow(dead_code)]
pub struct GatedNormalizer {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
    fail: bool,
}

#[allow(dead_code)]
impl GatedNormalizer {
    pub fn new() -> Arc<Self> {
        Self::build(false)
    }

    /// Parks like [`GatedNormalizer::new`], then fails with a decode error.
    pub fn failing() -> Arc<Self> {
        Self::build(true)
    }

    fn build(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            entered: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
            fail,
        })
    }
}

#[async_trait]
impl UploadNormalizer for GatedNormalizer {
    async fn normalize(
        &self,
        raw: Arc<[u8]>,
        filename: String,
    ) -> Result<NormalizedImage, NormalizeError> {
        self.entered.notify_one();
        self.release.notified().await;
        if self.fail {
            return Err(NormalizeError::Decode("unsupported image format".to_string()));
        }
        NormalizedImage::new(filename, 1, 1, raw.to_vec())
            .map_err(|error| NormalizeError::Encode(error.to_string()))
    }
}
