use crate::harness::{Assertion, ErrorMatch, Scenario};
use ctx_store::InFlightMode;

#[test]
fn test_plan_cycle() {
    Scenario::new("plan_cycle")
        .create("c1", "Refactor auth")
        .start_planning("c1", Some("s1"))
        .assert_mode("c1", InFlightMode::Planning)
        .record_plan("c1", "p", b"# Plan\n1. do it\n")
        .assert_mode("c1", InFlightMode::PendingImplementation)
        .assert(Assertion::ArtifactPath {
            id: "c1".into(),
            path: Some("plans/2026-01-01-p.md".into()),
        })
        .start_implementation("c1")
        .assert_mode("c1", InFlightMode::Implementing)
        .complete_plan("c1")
        .assert_mode("c1", InFlightMode::None)
        .assert(Assertion::ArtifactPath {
            id: "c1".into(),
            path: None,
        })
        .assert(Assertion::Sessions {
            id: "c1".into(),
            sessions: vec!["s1".into()],
        })
        .run()
        .unwrap();
}

#[test]
fn test_handoff_overlay_preserves_implementation() {
    Scenario::new("handoff_overlay")
        .create("c1", "Refactor auth")
        .record_plan("c1", "p", b"plan")
        .start_implementation("c1")
        .create_handoff("c1", "handoffs/h.md")
        .assert_mode("c1", InFlightMode::HandoffPending)
        .assert(Assertion::HandoffPath {
            id: "c1".into(),
            path: Some("handoffs/h.md".into()),
        })
        .assert(Assertion::ArtifactPath {
            id: "c1".into(),
            path: Some("plans/2026-01-01-p.md".into()),
        })
        .clear_handoff("c1")
        .assert_mode("c1", InFlightMode::Implementing)
        .assert(Assertion::HandoffPath {
            id: "c1".into(),
            path: None,
        })
        .assert(Assertion::LastEvent {
            id: "c1".into(),
            event: "handoff_cleared".into(),
        })
        .run()
        .unwrap();
}

#[test]
fn test_handoff_from_planning_restores_none() {
    Scenario::new("handoff_from_planning")
        .create("c1", "Spike")
        .start_planning("c1", None)
        .create_handoff("c1", "handoffs/h.md")
        .clear_handoff("c1")
        .assert_mode("c1", InFlightMode::None)
        .run()
        .unwrap();
}

#[test]
fn test_invalid_transitions_are_rejected() {
    Scenario::new("invalid_transitions")
        .create("c1", "Work")
        .start_implementation("c1")
        .fails_with(ErrorMatch::InvalidTransition)
        .create_handoff("c1", "handoffs/h.md")
        .fails_with(ErrorMatch::InvalidTransition)
        .clear_handoff("c1")
        .fails_with(ErrorMatch::InvalidTransition)
        .complete_plan("c1")
        .fails_with(ErrorMatch::InvalidTransition)
        .record_plan("c1", "p", b"plan")
        .start_implementation("c1")
        .start_planning("c1", None)
        .fails_with(ErrorMatch::InvalidTransition)
        .assert_mode("c1", InFlightMode::Implementing)
        .run()
        .unwrap();
}

#[test]
fn test_repeated_planning_is_a_noop() {
    Scenario::new("repeated_planning")
        .create("c1", "Work")
        .start_planning("c1", Some("s1"))
        .start_planning("c1", Some("s1"))
        .start_planning("c1", None)
        .assert(Assertion::EventCountOf {
            id: "c1".into(),
            event: "planning_started".into(),
            count: 1,
        })
        .assert_event_count("c1", 2)
        .run()
        .unwrap();
}

#[test]
fn test_sessions_resolve_to_contexts() {
    Scenario::new("session_lookup")
        .create("c1", "One")
        .create("c2", "Two")
        .bind_session("c1", "s1")
        .start_planning("c1", Some("s2"))
        .bind_session("c1", "s1")
        .assert(Assertion::Sessions {
            id: "c1".into(),
            sessions: vec!["s1".into(), "s2".into()],
        })
        .assert(Assertion::BoundTo {
            session_id: "s2".into(),
            id: Some("c1".into()),
        })
        .assert(Assertion::BoundTo {
            session_id: "s3".into(),
            id: None,
        })
        .assert(Assertion::InFlightIds(vec!["c1".into()]))
        .complete_plan("c1")
        .assert(Assertion::InFlightIds(vec![]))
        .complete("c1")
        .assert(Assertion::BoundTo {
            session_id: "s1".into(),
            id: None,
        })
        .run()
        .unwrap();
}
