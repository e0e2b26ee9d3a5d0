#![warn(missing_docs)]
//! # depth-chat-contract
//!
//! ## Purpose
//! Defines the inference service response schema and the client-side download
//! helpers that read depth maps back out of the conversation log.
//!
//! ## Responsibilities
//! - Parse the `{"depthmaps": [...]}` response body.
//! - Enforce the 1:1 correspondence between images sent and maps returned.
//! - Decode base64 depth maps into downloadable PNG artifacts.
//!
//! ## Data flow
//! Raw JSON response -> [`parse_depth_response`] -> `Output` log entry ->
//! [`download_artifacts`] when the user saves results.
//!
//! ## Ownership and lifetimes
//! Parsed values are owned to avoid borrowing from transient network buffers.
//!
//! ## Error model
//! Invalid JSON, count mismatches and undecodable payloads return
//! [`ContractError`].

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use depth_chat_core::ConversationEntry;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Multipart field name repeated for every uploaded image.
pub const FILES_FIELD: &str = "files";

/// Parsed inference response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthMapResponse {
    /// Base64 payloads in request order.
    pub depthmaps: Vec<String>,
}

/// Parses a raw response body and checks it answers `expected` images.
///
/// # Errors
/// Returns [`ContractError::Decode`] for invalid JSON or a missing field.
/// Returns [`ContractError::CountMismatch`] when the map count differs from
/// the number of images sent.
pub fn parse_depth_response(raw: &str, expected: usize) -> Result<DepthMapResponse, ContractError> {
    let parsed: DepthMapResponse = serde_json::from_str(raw).map_err(ContractError::Decode)?;

    if parsed.depthmaps.len() != expected {
        return Err(ContractError::CountMismatch {
            expected,
            actual: parsed.depthmaps.len(),
        });
    }

    Ok(parsed)
}

/// Downloadable file materialized from one depth map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadArtifact {
    /// Suggested filename.
    pub filename: String,
    /// Decoded PNG bytes.
    pub bytes: Vec<u8>,
}

/// Filename for a single saved depth map.
pub fn single_download_name(saved_at_ms: u64) -> String {
    format!("depth_{saved_at_ms}.png")
}

/// Filename for map `index` of a save-all batch.
pub fn batch_download_name(index: usize) -> String {
    format!("depth_batch_{index}.png")
}

/// Decodes one base64 depth map under `filename`.
///
/// # Errors
/// Returns [`ContractError::Base64`] when the payload is not valid base64.
pub fn download_artifact(
    payload: &str,
    filename: impl Into<String>,
) -> Result<DownloadArtifact, ContractError> {
    let bytes = STANDARD.decode(payload.trim())?;
    Ok(DownloadArtifact {
        filename: filename.into(),
        bytes,
    })
}

/// Decodes every depth map of an `Output` entry, named for a save-all batch.
///
/// Non-output entries yield an empty list.
///
/// # Errors
/// Returns the first base64 failure.
pub fn download_artifacts(entry: &ConversationEntry) -> Result<Vec<DownloadArtifact>, ContractError> {
    let ConversationEntry::Output { depth_maps } = entry else {
        return Ok(Vec::new());
    };

    depth_maps
        .iter()
        .enumerate()
        .map(|(index, payload)| download_artifact(payload, batch_download_name(index)))
        .collect()
}

/// Contract errors.
#[derive(Debug, Error)]
pub enum ContractError {
    /// JSON decode failure.
    #[error("depth response decode failure: {0}")]
    Decode(#[from] serde_json::Error),
    /// Response does not answer every image sent.
    #[error("depth response count mismatch: expected {expected}, got {actual}")]
    CountMismatch {
        /// Images sent.
        expected: usize,
        /// Maps returned.
        actual: usize,
    },
    /// Depth map payload is not valid base64.
    #[error("depth map payload is not base64: {0}")]
    Base64(#[from] base64::DecodeError),
}

#[cfg(test)]
mod tests {
    //! Unit tests for response parsing.

    use super::*;

    #[test]
    fn ignores_unknown_fields() {
        let parsed = parse_depth_response(r#"{"depthmaps":["AAAA"],"model":"dpt"}"#, 1)
            .expect("response should parse");
        assert_eq!(parsed.depthmaps, vec!["AAAA".to_string()]);
    }

    #[test]
    fn rejects_count_mismatch() {
        let result = parse_depth_response(r#"{"depthmaps":["AAAA"]}"#, 2);
        assert!(matches!(
            result,
            Err(ContractError::CountMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }
}
