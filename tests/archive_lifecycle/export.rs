//! Export from a populated catalog

use crate::common::*;
use metavault_core::attributes::{self as attr, tags};
use metavault_core::{Catalog, ContentItem, Filter, Metacard};
use metavault_engine::{ExportError, ExportRequest, ItemClass};
use std::io::Cursor;

#[test]
fn single_record_with_content_makes_two_entries_and_a_tombstone() {
    let h = Harness::unversioned();
    let record = Metacard::new("0123456789").with_title("Survey");
    h.catalog
        .create_with_content(vec![ContentItem::new(
            "0123456789",
            "survey.pdf",
            "application/pdf",
            Cursor::new(b"%PDF".to_vec()),
        )
        .with_metacard(record)])
        .unwrap();
    let output = h.path("exports").join("out.zip");

    let summary = h
        .exporter()
        .export(&ExportRequest::new(Filter::id("0123456789")).with_output(&output))
        .unwrap();

    assert!(summary.is_complete());
    assert_eq!(
        zip_entries(&output),
        vec![
            "metacards/012/0123456789/content/survey.pdf".to_string(),
            "metacards/012/0123456789/metacard/0123456789.xml".to_string(),
        ]
    );
    let tombstone = h.catalog.get(summary.tombstone_id.as_deref().unwrap()).unwrap();
    assert_eq!(tombstone.title.as_deref(), Some("out.zip"));
    assert!(tombstone.has_tag(tags::EXPORT_TOMBSTONE));
    assert_eq!(
        tombstone.strings(attr::EXPORTED_DATA),
        vec!["0123456789:Survey"]
    );
}

#[test]
fn history_travels_with_its_record() {
    let h = Harness::new();
    h.ingest("abc001", "First", "one");
    let mut edited = h.catalog.get("abc001").unwrap();
    edited.title = Some("Second".into());
    h.catalog.update("abc001", edited).unwrap();

    let summary = h
        .exporter()
        .export(&ExportRequest::new(Filter::id("abc001")).skip_tombstone())
        .unwrap();

    let revisions: Vec<_> = summary
        .items
        .iter()
        .filter(|i| i.class == ItemClass::Revision)
        .collect();
    assert_eq!(revisions.len(), h.catalog.history("abc001").len());
    assert_eq!(revisions.len(), 2);
    for revision in h.catalog.history("abc001") {
        assert!(zip_entries(&summary.archive.path)
            .contains(&format!("metacards/{}/{}/metacard/{}.xml", &revision.id[..3], revision.id, revision.id)));
    }
    assert!(summary.tombstone_id.is_none());
}

#[test]
fn generated_names_land_in_the_export_directory() {
    let h = Harness::unversioned();
    h.create("abc001", "Only");

    let summary = h
        .exporter()
        .export(&ExportRequest::new(Filter::Everything).skip_tombstone())
        .unwrap();

    assert_eq!(summary.archive.path.parent(), Some(h.path("exports").as_path()));
    assert_eq!(
        summary.archive.path.file_name().unwrap().to_str().unwrap(),
        "export-2023-11-14T22-14-20.000Z.zip"
    );
}

#[test]
fn existing_output_is_refused() {
    let h = Harness::unversioned();
    h.create("abc001", "Only");
    let output = h.path("taken.zip");
    std::fs::write(&output, b"").unwrap();
    h.catalog.clear_calls();

    let result = h
        .exporter()
        .export(&ExportRequest::new(Filter::Everything).with_output(&output));

    assert!(matches!(result, Err(ExportError::OutputExists(_))));
    assert!(h.catalog.calls().is_empty());
}

#[test]
fn delete_after_removes_records_and_content() {
    let h = Harness::unversioned();
    h.ingest("abc001", "One", "first");
    h.ingest("def002", "Two", "second");

    let summary = h
        .exporter()
        .export(
            &ExportRequest::new(Filter::Everything)
                .with_output(h.path("all.zip"))
                .with_location("vault shelf 3")
                .delete_after(),
        )
        .unwrap();

    assert_eq!(summary.deleted_ids.len(), 2);
    assert!(summary.delete_failures.is_empty());
    assert!(h.catalog.get("abc001").is_none());
    assert!(h.body("abc001").is_none());
    assert!(h.catalog.content_store().refs_for("def002").is_empty());

    let tombstone = h.catalog.get(summary.tombstone_id.as_deref().unwrap()).unwrap();
    assert_eq!(tombstone.string(attr::EXPORTED_LOCATION), Some("vault shelf 3"));
    assert_eq!(h.catalog.ids(), vec![tombstone.id.clone()]);
}
