//! Revert against catalog-managed history

use crate::common::*;
use metavault_core::attributes::tags;
use metavault_core::{Catalog, ContentItem, Metacard};
use metavault_engine::RevertError;
use std::io::Cursor;

#[test]
fn content_snapshot_taken_with_the_target_version_is_used() {
    let h = Harness::new();
    h.ingest("abc001", "v1", "first body");
    let replacement = Metacard::new("abc001").with_title("v2").with_tag(tags::RESOURCE);
    h.catalog
        .update_with_content(
            "abc001",
            vec![ContentItem::new(
                "abc001",
                "abc001.txt",
                "text/plain",
                Cursor::new(b"second body".to_vec()),
            )
            .with_metacard(replacement)],
        )
        .unwrap();
    h.clock.advance(60);
    let v1 = h
        .catalog
        .history("abc001")
        .into_iter()
        .find(|m| m.title.as_deref() == Some("v1"))
        .unwrap();

    let restored = h.reverter().revert("abc001", &v1.id).unwrap();

    assert_eq!(restored.title.as_deref(), Some("v1"));
    assert_eq!(h.catalog.get("abc001").unwrap().title.as_deref(), Some("v1"));
    assert_eq!(h.body("abc001").as_deref(), Some("first body"));
}

#[test]
fn deleted_record_comes_back_with_its_content() {
    let h = Harness::new();
    h.ingest("abc001", "Report", "kept body");
    h.catalog.delete(&["abc001".to_string()]).unwrap();
    let marker = h.catalog.deletion_marker("abc001").unwrap();
    let last = marker
        .last_version_id()
        .map(str::to_string)
        .unwrap();

    h.reverter().revert("abc001", &last).unwrap();

    let live = h.catalog.get("abc001").unwrap();
    assert!(live.is_active());
    assert_eq!(live.title.as_deref(), Some("Report"));
    assert_eq!(h.body("abc001").as_deref(), Some("kept body"));
    assert!(h.catalog.deletion_marker("abc001").is_none());
}

#[test]
fn unknown_versions_are_reported() {
    let h = Harness::new();
    h.create("abc001", "Only");

    assert!(matches!(
        h.reverter().revert("abc001", "nope"),
        Err(RevertError::NotFound(id)) if id == "nope"
    ));
    assert!(matches!(
        h.reverter().revert("zzz999", "nope"),
        Err(RevertError::NotFound(id)) if id == "zzz999"
    ));
}
