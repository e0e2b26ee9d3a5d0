//! Shared fixtures for upload integration tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use depth_chat_core::NormalizedImage;
use depth_chat_upload::{
    InferenceRequest, InferenceTransport, ProgressObserver, TransportResponse, UploadError,
    UploadProgress,
};

#[allow(dead_code)]
/// Transport that records the request and replays a canned reply.
pub struct ScriptedTransport {
    pub reply: Result<TransportResponse, UploadError>,
    pub requests: Mutex<Vec<InferenceRequest>>,
}

impl ScriptedTransport {
    #[allow(dead_code)]
    pub fn replying(status: u16, body: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(TransportResponse {
                status,
                body: body.to_string(),
            }),
            requests: Mutex::new(Vec::new()),
        })
    }

    #[allow(dead_code)]
    pub fn failing(error: UploadError) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(error),
            requests: Mutex::new(Vec::new()),
        })
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
        self.reply.clone()
    }
}

#[allow(dead_code)]
/// Observer that keeps every reported percentage.
#[derive(Default)]
pub struct RecordingObserver {
    pub seen: Mutex<Vec<u8>>,
}

impl ProgressObserver for RecordingObserver {
    fn on_progress(&self, percent: u8) {
        self.seen.lock().expect("observer lock").push(percent);
    }
}

#[allow(dead_code)]
/// Creates `count` normalized images named `upload_{i}.jpg`.
pub fn fixture_images(count: usize) -> Vec<NormalizedImage> {
    (0..count)
        .map(|index| {
            NormalizedImage::new(
                depth_chat_core::upload_filename(index),
                8,
                8,
                vec![index as u8 + 1; 100],
            )
            .expect("fixture image should be valid")
        })
        .collect()
}
