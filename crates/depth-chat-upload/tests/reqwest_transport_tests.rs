//! Integration tests for the HTTP transport against a local mock server.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::RecordingObserver;
use depth_chat_core::{NormalizedImage, upload_filename};
use depth_chat_upload::{InferenceClient, ReqwestTransport, UploadError};
use mockito::Matcher;

fn ascii_images() -> Vec<NormalizedImage> {
    ["first-image-payload", "second-image-payload"]
        .iter()
        .enumerate()
        .map(|(index, payload)| {
            NormalizedImage::new(upload_filename(index), 8, 8, payload.as_bytes().to_vec())
                .expect("fixture image should be valid")
        })
        .collect()
}

fn client_for(url: &str) -> InferenceClient {
    let transport =
        Arc::new(ReqwestTransport::new(Duration::from_secs(10)).expect("transport should build"));
    InferenceClient::new(url, transport).expect("client should build")
}

#[tokio::test]
async fn reqwest_transport_tests_posts_files_parts_in_order() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/predict")
        .match_header(
            "content-type",
            Matcher::Regex("^multipart/form-data; boundary=".to_string()),
        )
        .match_body(Matcher::Regex(
            concat!(
                r#"(?s)name="files"; filename="upload_0\.jpg".*first-image-payload"#,
                r#".*name="files"; filename="upload_1\.jpg".*second-image-payload"#,
            )
            .to_string(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"depthmaps":["AAAA","BBBB"]}"#)
        .create_async()
        .await;

    let observer = Arc::new(RecordingObserver::default());
    let response = client_for(&format!("{}/predict", server.url()))
        .predict(ascii_images(), observer.clone())
        .await
        .expect("predict should succeed");

    mock.assert_async().await;
    assert_eq!(response.depthmaps, vec!["AAAA", "BBBB"]);

    let seen = observer.seen.lock().expect("observer lock").clone();
    assert_eq!(seen.last(), Some(&100));
    assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
}

#[tokio::test]
async fn reqwest_transport_tests_non_success_status_maps_to_status_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/predict")
        .with_status(503)
        .with_body("model is loading")
        .create_async()
        .await;

    let result = client_for(&format!("{}/predict", server.url()))
        .predict(ascii_images(), Arc::new(RecordingObserver::default()))
        .await;

    assert_eq!(result, Err(UploadError::Status(503)));
}
