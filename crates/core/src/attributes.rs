//! Attribute and tag names
//!
//! Names follow the catalog's dotted/hyphenated vocabulary so archives stay
//! readable by other tools that speak it.

/// Record identity
pub const ID: &str = "id";
/// Human readable title
pub const TITLE: &str = "title";
/// Record tags
pub const TAGS: &str = "metacard-tags";
/// Locator of the primary content
pub const RESOURCE_URI: &str = "resource-uri";
/// Download URL companion of the primary content locator
pub const RESOURCE_DOWNLOAD_URL: &str = "resource-download-url";
/// Locators of derived content
pub const DERIVED_RESOURCE_URI: &str = "resource-derived-uri";
/// Download URL companions of the derived content locators
pub const DERIVED_RESOURCE_DOWNLOAD_URL: &str = "resource-derived-download-url";
/// Ids of records derived from this one
pub const DERIVED: &str = "metacard.derived";
/// Ids of records related to this one
pub const RELATED: &str = "metacard.related";

/// Prefix shared by all version snapshot attributes
pub const VERSION_PREFIX: &str = "metacard.version.";
/// Id of the record a revision was taken from
pub const VERSION_OF_ID: &str = "metacard.version.id";
/// Time the revision was taken
pub const VERSIONED_ON: &str = "metacard.version.versioned-on";
/// Action that produced the revision
pub const VERSION_ACTION: &str = "metacard.version.action";
/// Tags the record carried when the revision was taken
pub const VERSION_TAGS: &str = "metacard.version.tags";

/// Id of the record a deletion marker stands in for
pub const DELETION_OF_ID: &str = "metacard.deleted.id";
/// Revision id captured when the record was deleted
pub const LAST_VERSION_ID: &str = "metacard.deleted.version";

/// Free-text location comment recorded when content is moved offline
pub const OFFLINE_COMMENT: &str = "ext.offline-comment";
/// Relative path of the offline archive
pub const OFFLINE_LOCATION_PATH: &str = "ext.offline-location-path";
/// Principal that moved the content offline
pub const OFFLINED_BY: &str = "ext.offlined-by";
/// Time the content was moved offline
pub const OFFLINE_DATE: &str = "ext.offline-date";

/// One `<id>:<title>` value per exported record
pub const EXPORTED_DATA: &str = "exported.data";
/// Free-text location of an export
pub const EXPORTED_LOCATION: &str = "exported.location";
/// Time of an export
pub const EXPORTED_TIME: &str = "exported.time";

/// Tag names
pub mod tags {
    /// Deletion marker
    pub const DELETED: &str = "deleted";
    /// Version snapshot
    pub const REVISION: &str = "revision";
    /// Default tag of a live record
    pub const RESOURCE: &str = "resource";
    /// Export summary record
    pub const EXPORT_TOMBSTONE: &str = "export-tombstone";
}
