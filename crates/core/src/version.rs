//! Version snapshots
//!
//! Every change to a live record leaves a `revision`-tagged snapshot in the
//! catalog. A snapshot records the id it was taken from, when it was taken,
//! the action that produced it and the tags the live record had. Snapshots
//! produced by a content change point at a private copy of that content.

use crate::attributes::{self as attr, tags};
use crate::metacard::Metacard;
use crate::value::Attribute;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Action that produced a version snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VersionAction {
    /// Metadata changed
    Versioned,
    /// Metadata and content changed
    VersionedContent,
    /// Record deleted
    Deleted,
    /// Record with content deleted
    DeletedContent,
}

impl VersionAction {
    /// Parse the stored key
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "Versioned" => Some(VersionAction::Versioned),
            "Versioned-Content" => Some(VersionAction::VersionedContent),
            "Deleted" => Some(VersionAction::Deleted),
            "Deleted-Content" => Some(VersionAction::DeletedContent),
            _ => None,
        }
    }

    /// Stored key
    pub fn key(&self) -> &'static str {
        match self {
            VersionAction::Versioned => "Versioned",
            VersionAction::VersionedContent => "Versioned-Content",
            VersionAction::Deleted => "Deleted",
            VersionAction::DeletedContent => "Deleted-Content",
        }
    }

    /// The snapshot holds a copy of the content at that point
    pub fn is_content_action(&self) -> bool {
        matches!(
            self,
            VersionAction::VersionedContent | VersionAction::DeletedContent
        )
    }

    /// The snapshot was taken when the record was deleted
    pub fn is_delete_action(&self) -> bool {
        matches!(self, VersionAction::Deleted | VersionAction::DeletedContent)
    }
}

impl fmt::Display for VersionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl Metacard {
    /// Action recorded on a version snapshot
    pub fn version_action(&self) -> Option<VersionAction> {
        self.string(attr::VERSION_ACTION)
            .and_then(VersionAction::from_key)
    }

    /// Time a version snapshot was taken
    pub fn versioned_on(&self) -> Option<DateTime<Utc>> {
        self.date(attr::VERSIONED_ON)
    }

    /// Rebuild the live record a version snapshot was taken from
    ///
    /// The id comes from `metacard.version.id`, the tags from
    /// `metacard.version.tags` (`resource` when absent) and every
    /// `metacard.version.*` attribute is dropped.
    pub fn to_live(&self) -> Metacard {
        let mut live = self.clone();
        if let Some(id) = self.version_of_id() {
            live.id = id.to_string();
        }
        let version_tags: Vec<&str> = self.strings(attr::VERSION_TAGS);
        live.tags = if version_tags.is_empty() {
            std::iter::once(tags::RESOURCE.to_string()).collect()
        } else {
            version_tags.into_iter().map(str::to_string).collect()
        };
        live.attributes
            .retain(|name, _| !name.starts_with(attr::VERSION_PREFIX));
        live
    }

    /// Build a version snapshot of this record
    pub fn snapshot(
        &self,
        snapshot_id: impl Into<String>,
        action: VersionAction,
        versioned_on: DateTime<Utc>,
    ) -> Metacard {
        let mut snapshot = self.clone();
        snapshot.id = snapshot_id.into();
        snapshot.set(attr::VERSION_OF_ID, self.id.clone());
        snapshot.set(attr::VERSIONED_ON, versioned_on);
        snapshot.set(attr::VERSION_ACTION, action.key());
        snapshot.set_attribute(attr::VERSION_TAGS, Attribute::multi(self.tags.iter().cloned()));
        snapshot.tags = std::iter::once(tags::REVISION.to_string()).collect();
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_action_keys_roundtrip() {
        for action in [
            VersionAction::Versioned,
            VersionAction::VersionedContent,
            VersionAction::Deleted,
            VersionAction::DeletedContent,
        ] {
            assert_eq!(VersionAction::from_key(action.key()), Some(action));
        }
        assert_eq!(VersionAction::from_key("Bogus"), None);
    }

    #[test]
    fn test_action_sets() {
        assert!(VersionAction::VersionedContent.is_content_action());
        assert!(VersionAction::DeletedContent.is_content_action());
        assert!(!VersionAction::Deleted.is_content_action());
        assert!(VersionAction::Deleted.is_delete_action());
        assert!(!VersionAction::Versioned.is_delete_action());
    }

    #[test]
    fn test_snapshot_then_live_restores_record() {
        let at = Utc.with_ymd_and_hms(2021, 5, 1, 12, 0, 0).unwrap();
        let live = Metacard::new("abc123")
            .with_title("Report")
            .with_tag("resource")
            .with_attribute("description", "quarterly");

        let snapshot = live.snapshot("rev-1", VersionAction::Versioned, at);
        assert!(snapshot.is_revision());
        assert_eq!(snapshot.version_of_id(), Some("abc123"));
        assert_eq!(snapshot.versioned_on(), Some(at));
        assert_eq!(snapshot.version_action(), Some(VersionAction::Versioned));

        assert_eq!(snapshot.to_live(), live);
    }

    #[test]
    fn test_live_defaults_to_resource_tag() {
        let snapshot = Metacard::new("rev-1")
            .with_tag(tags::REVISION)
            .with_attribute(attr::VERSION_OF_ID, "abc123");
        let live = snapshot.to_live();
        assert_eq!(live.id, "abc123");
        assert!(live.has_tag(tags::RESOURCE));
        assert!(!live.has_tag(tags::REVISION));
    }
}
