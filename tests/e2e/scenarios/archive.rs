use crate::harness::{Assertion, ErrorMatch, Field, Scenario};
use anyhow::ensure;
use ctx_store::{Area, ContextStatus, InFlightMode};

#[test]
fn test_archive_round_trip() {
    Scenario::new("archive_round_trip")
        .create_with("c1", "Add auth", "planner", &["security"])
        .add_task("c1", "t1", "Add middleware")
        .record_plan("c1", "auth", b"# Auth plan\n")
        .note("c1", "halfway there")
        .remember("c1", "before")
        .complete("c1")
        .assert_in_archive("c1")
        .assert(Assertion::Indexed {
            id: "c1".into(),
            area: Area::Archive,
        })
        .assert(Assertion::NotIndexed {
            id: "c1".into(),
            area: Area::Active,
        })
        .assert(Assertion::LastEvent {
            id: "c1".into(),
            event: "context_archived".into(),
        })
        .reopen("c1")
        .assert_in_active("c1")
        .assert_status("c1", ContextStatus::Active)
        .assert(Assertion::MatchesRemembered {
            id: "c1".into(),
            label: "before".into(),
            ignore: vec![Field::LastActive],
        })
        .assert(Assertion::NotIndexed {
            id: "c1".into(),
            area: Area::Archive,
        })
        .assert_task("c1", "t1", ctx_store::TaskStatus::Pending)
        .assert_caches_consistent()
        .run()
        .unwrap();
}

#[test]
fn test_archive_keeps_handoff_overlay() {
    Scenario::new("archive_with_handoff")
        .create("c1", "Long job")
        .record_plan("c1", "p", b"plan")
        .start_implementation("c1")
        .create_handoff("c1", "handoffs/h.md")
        .complete("c1")
        .reopen("c1")
        .assert_mode("c1", InFlightMode::HandoffPending)
        .clear_handoff("c1")
        .assert_mode("c1", InFlightMode::Implementing)
        .run()
        .unwrap();
}

#[test]
fn test_archive_preconditions() {
    Scenario::new("archive_preconditions")
        .create("c1", "Work")
        .archive("c1")
        .fails_with(ErrorMatch::NotCompleted)
        .assert_in_active("c1")
        .complete("c1")
        .archive("c1")
        .fails_with(ErrorMatch::AlreadyExists)
        .create("c1", "Same id as an archived context")
        .fails_with(ErrorMatch::AlreadyExists)
        .assert(Assertion::EventCountOf {
            id: "c1".into(),
            event: "context_archived".into(),
            count: 1,
        })
        .run()
        .unwrap();
}

#[test]
fn test_plan_documents_move_with_the_context() {
    Scenario::new("plans_follow_archive")
        .create("c1", "Work")
        .record_plan("c1", "design", b"# Design\n")
        .complete("c1")
        .assert(Assertion::Custom(Box::new(|store| {
            let ctx = store.get("c1")?.ok_or_else(|| anyhow::anyhow!("c1 missing"))?;
            let rel = ctx
                .in_flight
                .artifact_path
                .clone()
                .ok_or_else(|| anyhow::anyhow!("no artifact"))?;
            let content = std::fs::read(ctx.folder.join(&rel))?;
            ensure!(content == b"# Design\n", "plan content changed");
            ensure!(
                ctx.in_flight.artifact_hash.as_deref() == Some(ctx_store::hash_content(&content).as_str()),
                "hash does not match archived bytes"
            );
            Ok(())
        })))
        .run()
        .unwrap();
}

#[test]
fn test_list_spans_both_areas() {
    Scenario::new("list_both_areas")
        .create("open", "Still going")
        .create("done", "Finished")
        .complete("done")
        .assert_listed(&["done", "open"])
        .assert(Assertion::Custom(Box::new(|store| {
            let active = store.list(Some(ContextStatus::Active), None)?;
            let completed = store.list(Some(ContextStatus::Completed), None)?;
            ensure!(active.len() == 1 && active[0].id == "open", "active: {active:?}");
            ensure!(completed.len() == 1 && completed[0].id == "done", "completed: {completed:?}");
            Ok(())
        })))
        .run()
        .unwrap();
}
