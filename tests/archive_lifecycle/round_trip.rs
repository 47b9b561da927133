//! Export, empty the catalog, import again

use crate::common::*;
use metavault_core::attributes::tags;
use metavault_core::{Catalog, Filter, Metacard};
use metavault_engine::{ExportRequest, ImportAction, NoProgress};

#[test]
fn exported_records_and_content_come_back() {
    let h = Harness::unversioned();
    let one = h.ingest("abc001", "One", "first body");
    let two = h.ingest("def002", "Two", "second body");

    let summary = h
        .exporter()
        .export(
            &ExportRequest::new(Filter::any_of([Filter::id("abc001"), Filter::id("def002")]))
                .with_output(h.path("both.zip"))
                .delete_after()
                .skip_tombstone(),
        )
        .unwrap();
    assert_eq!(summary.content_items.len(), 2);
    assert!(h.catalog.is_empty());

    let mut last = (0, 0);
    let report = h
        .importer()
        .import_archive(&summary.archive.path, &mut |done: usize, total: usize| {
            last = (done, total)
        })
        .unwrap();

    assert!(report.is_success(), "{:?}", report.outcomes);
    assert_eq!(last, (2, 2));
    assert!(report
        .outcomes
        .iter()
        .all(|o| o.action == Some(ImportAction::Create)));
    assert_eq!(h.catalog.get("abc001"), Some(one));
    assert_eq!(h.catalog.get("def002"), Some(two));
    assert_eq!(h.body("abc001").as_deref(), Some("first body"));
    assert_eq!(h.body("def002").as_deref(), Some("second body"));
    assert_eq!(h.catalog.content_store().len(), 4);
}

#[test]
fn metadata_only_records_round_trip() {
    let h = Harness::unversioned();
    h.create("abc001", "Kept");

    let summary = h
        .exporter()
        .export(
            &ExportRequest::new(Filter::Everything)
                .with_output(h.path("one.zip"))
                .skip_tombstone(),
        )
        .unwrap();
    h.catalog.delete(&["abc001".to_string()]).unwrap();

    let report = h
        .importer()
        .import_archive(&summary.archive.path, &mut NoProgress)
        .unwrap();
    assert_eq!(report.total, 1);
    let expected = Metacard::new("abc001").with_title("Kept").with_tag(tags::RESOURCE);
    assert_eq!(h.catalog.get("abc001"), Some(expected));
    assert!(h.catalog.content_store().calls().is_empty());
}
