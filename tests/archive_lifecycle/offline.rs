//! Offline moves and bringing content back

use crate::common::*;
use metavault_archive::paths::{content_path, history_metacard_path, metacard_path};
use metavault_core::attributes as attr;
use metavault_core::{Catalog, Filter};
use metavault_engine::{ImportAction, NoOpReason, NoProgress, OfflineEditPolicy};

#[test]
fn already_offline_record_is_refused_without_side_effects() {
    let h = Harness::new();
    h.ingest("abc001", "Report", "body");
    let archiver = h.archiver();
    archiver.move_resource_offline("abc001", "first move").unwrap();
    h.catalog.clear_calls();
    h.catalog.content_store().clear_calls();

    let outcomes = archiver.move_offline(&["abc001".to_string()], "again");

    assert_eq!(outcomes["abc001"], "The metacard is already offlined.");
    assert!(h.catalog.write_calls().is_empty());
    assert!(h.catalog.content_store().calls().is_empty());
}

#[test]
fn offline_archive_holds_record_history_and_content() {
    let h = Harness::new();
    h.ingest("abc001", "Report", "body");
    let revision = h.catalog.history("abc001").remove(0);

    let info = h.archiver().move_resource_offline("abc001", "cold storage").unwrap();

    assert_eq!(info.path, h.offline_root().join("abc").join("abc001.zip"));
    let entries = zip_entries(&info.path);
    assert!(entries.contains(&metacard_path("abc001")));
    assert!(entries.contains(&content_path("abc001", "abc001.txt")));
    assert!(entries.contains(&history_metacard_path("abc001", &revision.id)));

    let live = h.catalog.get("abc001").unwrap();
    assert!(live.is_offline());
    assert_eq!(live.string(attr::OFFLINE_LOCATION_PATH), Some("abc/abc001.zip"));
    assert_eq!(live.string(attr::OFFLINE_COMMENT), Some("cold storage"));
    assert!(live.resource_uri.is_none());
    assert!(h.body("abc001").is_none());
    assert!(h.catalog.content_store().refs_for(&revision.id).is_empty());
}

#[test]
fn importing_the_offline_archive_brings_content_back() {
    let h = Harness::new();
    h.ingest("abc001", "Report", "body");
    let info = h.archiver().move_resource_offline("abc001", "cold storage").unwrap();

    let report = h.importer().import_archive(&info.path, &mut NoProgress).unwrap();

    assert!(report.is_success(), "{:?}", report.outcomes);
    assert_eq!(
        report.outcome("abc001").unwrap().action,
        Some(ImportAction::Update {
            existing_id: "abc001".into()
        })
    );
    assert!(report
        .outcomes
        .iter()
        .filter(|o| o.id != "abc001")
        .all(|o| o.action == Some(ImportAction::NoOp(NoOpReason::RevisionExists))));

    let live = h.catalog.get("abc001").unwrap();
    assert!(!live.is_offline());
    assert_eq!(live.resource_uri.as_deref(), Some("content:abc001"));
    assert_eq!(h.body("abc001").as_deref(), Some("body"));
    assert_eq!(h.catalog.content_store().refs_for("abc001").len(), 2);
}

#[test]
fn matching_moves_skip_revisions() {
    let h = Harness::new();
    h.ingest("abc001", "One", "first");
    h.ingest("def002", "Two", "second");

    let outcomes = h
        .archiver()
        .move_offline_matching(Filter::Everything, "bulk")
        .unwrap();

    assert_eq!(outcomes.keys().collect::<Vec<_>>(), vec!["abc001", "def002"]);
    assert!(outcomes.values().all(String::is_empty));
}

#[test]
fn edits_to_offline_records_are_restricted() {
    let h = Harness::unversioned();
    h.ingest("abc001", "Report", "body");
    h.archiver().move_resource_offline("abc001", "shelf 1").unwrap();
    let original = h.catalog.get("abc001").unwrap();

    let mut comment_fix = original.clone();
    comment_fix.set(attr::OFFLINE_COMMENT, "shelf 2");
    let rename = original.clone().with_title("Renamed");

    let policy = OfflineEditPolicy::allowing_comment_edits();
    assert!(policy.check(&[original.clone()], &[comment_fix]).is_ok());
    assert!(policy.check(&[original], &[rename]).is_err());
}
