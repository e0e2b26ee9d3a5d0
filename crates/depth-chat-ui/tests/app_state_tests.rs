//! Integration tests for app-level state transitions and projection.

use depth_chat_core::ConversationEntry;
use depth_chat_ui::{AppState, ClearPrompt, project_status};

#[test]
fn app_state_tests_clear_chat_empties_log_and_staging() {
    let mut state = AppState::new();
    state.staging.add(vec![("a.png", vec![1_u8])]);
    state.log.append(ConversationEntry::failure());

    state.clear_chat();
    assert!(state.log.is_empty());
    assert!(state.staging.is_empty());
}

#[test]
fn app_state_tests_clear_requires_confirmation() {
    let mut state = AppState::new();
    state.log.append(ConversationEntry::failure());

    assert!(!state.confirm_clear());
    state.request_clear();
    assert_eq!(state.clear_prompt, ClearPrompt::Confirming);
    state.cancel_clear();
    assert!(!state.confirm_clear());
    assert_eq!(state.log.len(), 1);

    state.request_clear();
    assert!(state.confirm_clear());
    assert!(state.log.is_empty());
    assert_eq!(state.clear_prompt, ClearPrompt::Hidden);
}

#[test]
fn app_state_tests_clear_request_ignored_on_empty_log() {
    let mut state = AppState::new();
    state.request_clear();
    assert_eq!(state.clear_prompt, ClearPrompt::Hidden);
}

#[test]
fn app_state_tests_projection_tracks_upload_progress() {
    let mut state = AppState::new();
    let idle = project_status(&state);
    assert!(!idle.can_submit);
    assert_eq!(idle.staging_label, "Drag and drop images or click +");
    assert_eq!(idle.progress_label, None);

    state.staging.add(vec![("a.png", vec![1_u8]), ("b.png", vec![2])]);
    let staged = project_status(&state);
    assert!(staged.can_submit);
    assert_eq!(staged.staging_label, "2 images ready for analysis");

    state.upload.begin().expect("claim should succeed");
    state.upload.set_progress(42);
    let syncing = project_status(&state);
    assert!(!syncing.can_submit);
    assert_eq!(syncing.progress_label.as_deref(), Some("Syncing Data: 42%"));

    state.upload.set_progress(100);
    assert_eq!(
        project_status(&state).progress_label.as_deref(),
        Some("Calculating Neural Depth...")
    );
}
