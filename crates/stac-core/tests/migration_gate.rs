//! Startup gate behaviour against the in-memory schema store.

use std::fs;
use std::sync::Arc;

use stac_core::migration::{
    ErrorClass, MemorySchemaStore, MigrationError, MigrationRegistry, MigrationStep, Revision,
    RevisionSelector, SchemaStore, SchemaVersionGate,
};

fn rev(token: &str) -> Revision {
    Revision::new(token)
}

fn pinned(token: &str) -> RevisionSelector {
    RevisionSelector::Pinned(rev(token))
}

/// `000` → `407037cb1636`
fn two_step_gate() -> SchemaVersionGate {
    let registry = MigrationRegistry::from_steps(vec![
        MigrationStep::new("000", None).with_description("initial"),
        MigrationStep::new("407037cb1636", Some(rev("000"))).with_description("add index"),
    ])
    .unwrap();
    SchemaVersionGate::new(registry)
}

/// `a` → `b` → `c`
fn three_step_gate() -> SchemaVersionGate {
    let registry = MigrationRegistry::from_steps(vec![
        MigrationStep::new("a", None),
        MigrationStep::new("b", Some(rev("a"))),
        MigrationStep::new("c", Some(rev("b"))),
    ])
    .unwrap();
    SchemaVersionGate::new(registry)
}

#[tokio::test]
async fn test_applies_single_pending_step() {
    let gate = two_step_gate();
    let store = MemorySchemaStore::at_revision("000");

    let ready = gate
        .ensure_ready(&store, &pinned("407037cb1636"), &pinned("407037cb1636"))
        .await
        .unwrap();

    assert_eq!(ready.revision, rev("407037cb1636"));
    assert_eq!(ready.upgrade.from, Some(rev("000")));
    assert_eq!(ready.upgrade.applied, vec![rev("407037cb1636")]);
    assert_eq!(store.applied(), vec![rev("407037cb1636")]);
}

#[tokio::test]
async fn test_unrelated_revision_is_a_mismatch() {
    let gate = two_step_gate();
    let store = MemorySchemaStore::at_revision("aaa111");

    let err = gate
        .ensure_ready(&store, &pinned("407037cb1636"), &pinned("407037cb1636"))
        .await
        .unwrap_err();

    match &err {
        MigrationError::SchemaMismatch { actual, expected } => {
            assert_eq!(actual.as_ref(), Some(&rev("aaa111")));
            assert_eq!(expected, &rev("407037cb1636"));
        }
        other => panic!("expected a schema mismatch, got {other:?}"),
    }
    assert_eq!(err.class(), ErrorClass::Readiness);
    assert!(store.applied().is_empty());
    assert_eq!(store.current_revision().await.unwrap(), Some(rev("aaa111")));
}

#[tokio::test]
async fn test_concurrent_instances_apply_once() {
    let gate = Arc::new(two_step_gate());
    let store = Arc::new(MemorySchemaStore::new());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let gate = Arc::clone(&gate);
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                gate.ensure_ready(
                    store.as_ref(),
                    &RevisionSelector::Head,
                    &RevisionSelector::Head,
                )
                .await
            })
        })
        .collect();

    for result in futures::future::join_all(handles).await {
        let ready = result.unwrap().unwrap();
        assert_eq!(ready.revision, rev("407037cb1636"));
    }
    assert_eq!(store.times_applied(&rev("000")), 1);
    assert_eq!(store.times_applied(&rev("407037cb1636")), 1);
}

#[tokio::test]
async fn test_gate_is_idempotent() {
    let gate = three_step_gate();
    let store = MemorySchemaStore::new();

    let first = gate
        .ensure_ready(&store, &RevisionSelector::Head, &RevisionSelector::Head)
        .await
        .unwrap();
    assert_eq!(first.upgrade.applied.len(), 3);

    let second = gate
        .ensure_ready(&store, &RevisionSelector::Head, &RevisionSelector::Head)
        .await
        .unwrap();
    assert!(second.upgrade.applied.is_empty());
    assert_eq!(second.revision, first.revision);
    assert_eq!(store.applied().len(), 3);
}

#[tokio::test]
async fn test_pinned_target_behind_head() {
    let gate = three_step_gate();
    let store = MemorySchemaStore::new();

    let ready = gate.ensure_ready(&store, &pinned("b"), &pinned("b")).await.unwrap();
    assert_eq!(ready.revision, rev("b"));
    assert_eq!(store.times_applied(&rev("c")), 0);
}

#[tokio::test]
async fn test_target_short_of_expected_fails() {
    let gate = three_step_gate();
    let store = MemorySchemaStore::new();

    let err = gate
        .ensure_ready(&store, &pinned("b"), &RevisionSelector::Head)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MigrationError::SchemaMismatch { actual: Some(ref a), ref expected }
            if a == &rev("b") && expected == &rev("c")
    ));
}

#[tokio::test]
async fn test_no_downgrade_when_ahead() {
    let gate = three_step_gate();
    let store = MemorySchemaStore::at_revision("c");

    let err = gate
        .ensure_ready(&store, &pinned("b"), &pinned("b"))
        .await
        .unwrap_err();
    assert!(matches!(err, MigrationError::SchemaMismatch { .. }));
    assert!(store.applied().is_empty());
}

#[tokio::test]
async fn test_failed_step_keeps_previous_revision() {
    let gate = three_step_gate();
    let store = MemorySchemaStore::new().fail_on("b");

    let err = gate
        .ensure_ready(&store, &RevisionSelector::Head, &RevisionSelector::Head)
        .await
        .unwrap_err();
    assert!(matches!(err, MigrationError::StepFailed { .. }));
    assert_eq!(store.current_revision().await.unwrap(), Some(rev("a")));
}

#[tokio::test]
async fn test_unreachable_store_is_connectivity_error() {
    let gate = two_step_gate();
    let store = MemorySchemaStore::unreachable();

    let err = gate
        .ensure_ready(&store, &RevisionSelector::Head, &RevisionSelector::Head)
        .await
        .unwrap_err();
    assert_eq!(err.class(), ErrorClass::Connectivity);
}

#[tokio::test]
async fn test_unknown_pinned_revision_is_configuration_error() {
    let gate = two_step_gate();
    let store = MemorySchemaStore::new();

    let err = gate
        .ensure_ready(&store, &pinned("deadbeef"), &RevisionSelector::Head)
        .await
        .unwrap_err();
    assert_eq!(err.class(), ErrorClass::Configuration);
    assert!(store.applied().is_empty());
}

#[tokio::test]
async fn test_loads_scripts_from_directory() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("001_root.sql"),
        "-- revision: r1\n-- down_revision: none\n-- description: root\nCREATE TABLE t (id INT);\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("002_next.sql"),
        "-- revision: r2\n-- down_revision: r1\n-- description: next\nALTER TABLE t ADD COLUMN v TEXT;\n",
    )
    .unwrap();
    fs::write(dir.path().join("README.txt"), "ignored").unwrap();

    let store = MemorySchemaStore::new();
    let ready = stac_core::migration::ensure_ready(
        &store,
        dir.path(),
        &RevisionSelector::Head,
        &RevisionSelector::Head,
    )
    .await
    .unwrap();

    assert_eq!(ready.revision, rev("r2"));
    assert_eq!(stac_core::migration::locate_head(dir.path()).unwrap(), rev("r2"));
    assert_eq!(stac_core::migration::history(dir.path()).unwrap().len(), 2);
}

#[tokio::test]
async fn test_mismatch_message_for_empty_database() {
    let gate = three_step_gate();
    let store = MemorySchemaStore::new();

    let err = gate.check(&store, &rev("a")).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "upgrade the database: current migration revision <none> does not match expected revision a"
    );
}
