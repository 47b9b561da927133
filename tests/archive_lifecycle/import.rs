//! Import into catalogs in various states

use crate::common::*;
use metavault_archive::paths::metacard_path;
use metavault_archive::{ArchiveWriter, JsonCodec, MetacardCodec, WriterOptions};
use metavault_core::attributes::tags;
use metavault_core::{Catalog, Metacard};
use metavault_engine::{ImportAction, NoOpReason, NoProgress};
use metavault_storage::CatalogCall;
use std::path::PathBuf;

fn archive_of(h: &Harness, name: &str, records: &[Metacard]) -> PathBuf {
    let mut writer = ArchiveWriter::create(&h.path(name), &WriterOptions::default()).unwrap();
    for record in records {
        writer
            .add_bytes(&metacard_path(&record.id), &JsonCodec.encode(record).unwrap())
            .unwrap();
    }
    writer.finish().unwrap().path
}

#[test]
fn metadata_only_archive_creates_without_touching_content() {
    let h = Harness::unversioned();
    let record = Metacard::new("0123456789").with_title("Survey").with_tag(tags::RESOURCE);
    let archive = archive_of(&h, "in.zip", &[record.clone()]);

    let report = h.importer().import_archive(&archive, &mut NoProgress).unwrap();

    assert!(report.failed_ids.is_empty());
    assert_eq!(
        h.catalog.write_calls(),
        vec![CatalogCall::Create(vec!["0123456789".into()])]
    );
    assert!(h.catalog.content_store().calls().is_empty());
    assert_eq!(h.catalog.get("0123456789"), Some(record));
}

#[test]
fn deleted_record_is_restored_before_it_is_updated() {
    let h = Harness::new();
    h.create("abc001", "Original");
    h.catalog.delete(&["abc001".to_string()]).unwrap();
    let marker = h.catalog.deletion_marker("abc001").unwrap();
    h.catalog.clear_calls();

    let archived = Metacard::new("abc001").with_title("Archived").with_tag(tags::RESOURCE);
    let archive = archive_of(&h, "in.zip", &[archived]);
    let report = h.importer().import_archive(&archive, &mut NoProgress).unwrap();

    assert!(report.is_success(), "{:?}", report.outcomes);
    assert!(matches!(
        report.outcome("abc001").unwrap().action,
        Some(ImportAction::RestoreThenUpdate { .. })
    ));
    assert_eq!(
        h.catalog.write_calls(),
        vec![
            CatalogCall::Delete(vec![marker.id]),
            CatalogCall::Create(vec!["abc001".into()]),
            CatalogCall::Update("abc001".into()),
        ]
    );
    assert_eq!(h.catalog.get("abc001").unwrap().title.as_deref(), Some("Archived"));
}

#[test]
fn importing_twice_changes_nothing_the_second_time() {
    let h = Harness::unversioned();
    let records: Vec<Metacard> = ["aaa111", "bbb222", "ccc333"]
        .iter()
        .map(|id| Metacard::new(*id).with_tag(tags::RESOURCE))
        .collect();
    let archive = archive_of(&h, "in.zip", &records);

    let first = h.importer().import_archive(&archive, &mut NoProgress).unwrap();
    assert_eq!(first.processed, 3);
    h.catalog.clear_calls();

    let second = h.importer().import_archive(&archive, &mut NoProgress).unwrap();
    assert!(second.is_success());
    assert!(second
        .outcomes
        .iter()
        .all(|o| o.action == Some(ImportAction::NoOp(NoOpReason::OnlineActive))));
    assert!(h.catalog.write_calls().is_empty());
}

#[test]
fn deletion_markers_delete_live_records() {
    let h = Harness::unversioned();
    h.create("abc001", "Live");
    let marker = Metacard::new("ffffff")
        .with_tag(tags::DELETED)
        .with_attribute(metavault_core::attributes::DELETION_OF_ID, "abc001")
        .with_attribute(metavault_core::attributes::LAST_VERSION_ID, "eeeeee");
    let archive = archive_of(&h, "in.zip", &[marker]);
    h.catalog.clear_calls();

    let report = h.importer().import_archive(&archive, &mut NoProgress).unwrap();

    assert!(report.is_success());
    assert_eq!(
        h.catalog.write_calls(),
        vec![CatalogCall::Delete(vec!["abc001".into()])]
    );
    assert!(h.catalog.get("abc001").is_none());
}

#[test]
fn unavailable_catalog_fails_units_not_the_run() {
    let h = Harness::unversioned();
    let archive = archive_of(
        &h,
        "in.zip",
        &[Metacard::new("aaa111"), Metacard::new("bbb222")],
    );
    h.catalog.set_unavailable(true);

    let mut progress = Vec::new();
    let report = h
        .importer()
        .import_archive(&archive, &mut |done: usize, total: usize| progress.push((done, total)))
        .unwrap();

    assert_eq!(report.failed_ids.len(), 2);
    assert!(report.outcomes.iter().all(|o| o.action.is_none()));
    assert_eq!(progress, vec![(0, 2), (1, 2), (2, 2)]);
}
