//! Tests for the runtime trait types.
//!
//! Validates signal parsing, status transitions, and the state view printed
//! by the `state` command.

use runproc::{ContainerState, ContainerStatus, Error, Signal, StateView};

// =============================================================================
// Signal Tests
// =============================================================================

#[test]
fn test_signal_default_is_term() {
    assert_eq!(Signal::default(), Signal::Term);
    assert_eq!(Signal::parse(""), Signal::Term);
    assert_eq!(Signal::parse("   "), Signal::Term);
}

#[test]
fn test_signal_names_any_case_with_optional_prefix() {
    assert_eq!(Signal::parse("KILL"), Signal::Kill);
    assert_eq!(Signal::parse("SIGKILL"), Signal::Kill);
    assert_eq!(Signal::parse("kill"), Signal::Kill);
    assert_eq!(Signal::parse("SigInt"), Signal::Int);
    assert_eq!(Signal::parse("hup"), Signal::Hup);
    assert_eq!(Signal::parse("TERM"), Signal::Term);
}

#[test]
fn test_signal_numbers() {
    assert_eq!(Signal::parse("9"), Signal::Kill);
    assert_eq!(Signal::parse("-9"), Signal::Kill);
    assert_eq!(Signal::parse("15"), Signal::Term);
    assert_eq!(Signal::parse("2"), Signal::Int);
    assert_eq!(Signal::parse("1"), Signal::Hup);
    assert_eq!(Signal::parse("10").as_i32(), 10);
}

#[test]
fn test_signal_zero_is_existence_check() {
    assert_eq!(Signal::parse("0"), Signal::Raw(0));
    assert_eq!(Signal::parse("-0").as_i32(), 0);
    assert_eq!(Signal::parse("0").to_string(), "signal 0");
}

#[test]
fn test_unrecognized_signal_falls_back_to_term() {
    assert_eq!(Signal::parse("SIGNOPE"), Signal::Term);
    assert_eq!(Signal::parse("9x"), Signal::Term);
}

#[test]
fn test_signal_display() {
    assert_eq!(Signal::Kill.to_string(), "SIGKILL");
    assert_eq!(Signal::Raw(10).to_string(), "signal 10");
}

// =============================================================================
// Status Transition Tests
// =============================================================================

#[test]
fn test_status_moves_forward_only() {
    use ContainerStatus::*;

    assert!(Created.can_transition_to(Running));
    assert!(Created.can_transition_to(Stopped));
    assert!(Running.can_transition_to(Stopped));

    assert!(!Running.can_transition_to(Created));
    assert!(!Stopped.can_transition_to(Running));
    assert!(!Stopped.can_transition_to(Created));
    assert!(!Stopped.can_transition_to(Stopped));
}

#[test]
fn test_mark_running_then_stopped() {
    let mut state = ContainerState::new("c1", "/b", 100);
    assert_eq!(state.status, ContainerStatus::Created);

    state.mark_running().unwrap();
    assert!(state.is_running());
    assert!(state.started_at.is_some());

    state.mark_stopped(Some(3)).unwrap();
    assert!(state.is_stopped());
    assert_eq!(state.exit_code, Some(3));
    assert!(state.exited_at.is_some());
}

#[test]
fn test_stopped_cannot_restart() {
    let mut state = ContainerState::new("c1", "/b", 100);
    state.mark_stopped(None).unwrap();

    let err = state.mark_running().unwrap_err();
    assert!(matches!(err, Error::InvalidState { .. }));
    assert!(state.is_stopped(), "failed transition must not change status");
}

// =============================================================================
// State View Tests
// =============================================================================

#[test]
fn test_state_view_json_shape() {
    let mut state = ContainerState::new("web", "/bundles/web", 4242);
    state.mark_running().unwrap();

    let json = serde_json::to_value(StateView::from(&state)).unwrap();
    let obj = json.as_object().unwrap();

    assert_eq!(obj.len(), 4, "only id, pid, status and bundle are printed");
    assert_eq!(json["id"], "web");
    assert_eq!(json["pid"], 4242);
    assert_eq!(json["status"], "running");
    assert_eq!(json["bundle"], "/bundles/web");
}
