#![allow(clippy::unwrap_used, clippy::expect_used)]
use super::*;

#[test]
fn begin_and_end_task_tracks_presence() {
    let state = RuntimeState::new();
    assert!(!state.has_active_task("ses_1"));

    state.begin_task("ses_1");
    assert!(state.has_active_task("ses_1"));

    state.end_task("ses_1");
    assert!(!state.has_active_task("ses_1"));
}

#[test]
fn cancel_task_signals_token_and_removes_entry() {
    let state = RuntimeState::new();
    let token = state.begin_task("ses_1");
    assert!(!token.is_cancelled());

    let cancelled = state.cancel_task("ses_1");
    assert!(cancelled);
    assert!(token.is_cancelled());
    assert!(!state.has_active_task("ses_1"));
}

#[test]
fn signal_cancel_leaves_entry_present_for_the_run_to_remove() {
    let state = RuntimeState::new();
    let token = state.begin_task("ses_1");

    let signalled = state.signal_cancel("ses_1");
    assert!(signalled);
    assert!(token.is_cancelled());
    assert!(state.has_active_task("ses_1"));

    state.end_task("ses_1");
    assert!(!state.has_active_task("ses_1"));
}

#[test]
fn signal_cancel_on_missing_session_returns_false() {
    let state = RuntimeState::new();
    assert!(!state.signal_cancel("ses_missing"));
}

#[test]
fn cancel_task_on_missing_session_returns_false() {
    let state = RuntimeState::new();
    assert!(!state.cancel_task("ses_missing"));
}

#[test]
fn open_snapshot_round_trips() {
    let state = RuntimeState::new();
    assert!(state.open_snapshot("ses_1").is_none());

    state.set_open_snapshot("ses_1", "deadbeef".to_string());
    assert_eq!(state.open_snapshot("ses_1").as_deref(), Some("deadbeef"));
}

#[test]
fn clear_session_state_cancels_and_removes_both_maps() {
    let state = RuntimeState::new();
    let token = state.begin_task("ses_1");
    state.set_open_snapshot("ses_1", "deadbeef".to_string());

    state.clear_session_state("ses_1");

    assert!(token.is_cancelled());
    assert!(!state.has_active_task("ses_1"));
    assert!(state.open_snapshot("ses_1").is_none());
}

#[test]
fn clear_session_state_is_idempotent_on_missing_session() {
    let state = RuntimeState::new();
    state.clear_session_state("ses_never_existed");
    state.clear_session_state("ses_never_existed");
}
