//! The catalog record
//!
//! A `Metacard` carries a small set of well-known fields (id, title, tags and
//! resource locators) plus an open map of typed attributes. Well-known fields
//! are also addressable by their attribute names so filters can treat every
//! record uniformly.

use crate::attributes::{self as attr, tags};
use crate::value::{Attribute, AttributeValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A catalog record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metacard {
    /// Opaque record identity
    pub id: String,
    /// Human readable title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Tags (`deleted`, `revision`, `resource`, ...)
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Locator of the primary content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_uri: Option<String>,
    /// Locators of derived content, each optionally suffixed with a role fragment
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub derived_resource_uris: Vec<String>,
    /// Open attribute map
    #[serde(default)]
    pub attributes: BTreeMap<String, Attribute>,
}

impl Metacard {
    /// Create an untagged record with the given id
    pub fn new(id: impl Into<String>) -> Self {
        Metacard {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Builder: set the title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Builder: add a tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Builder: set the primary content locator
    pub fn with_resource_uri(mut self, uri: impl Into<String>) -> Self {
        self.resource_uri = Some(uri.into());
        self
    }

    /// Builder: append a derived content locator
    pub fn with_derived_uri(mut self, uri: impl Into<String>) -> Self {
        self.derived_resource_uris.push(uri.into());
        self
    }

    /// Builder: set a single-valued attribute
    pub fn with_attribute(mut self, name: &str, value: impl Into<AttributeValue>) -> Self {
        self.set(name, value);
        self
    }

    // ========================================================================
    // Attribute access
    // ========================================================================

    /// Raw attribute lookup (open map only)
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name).filter(|a| !a.is_empty())
    }

    /// True if the attribute is present with at least one value
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// First value of a string attribute
    pub fn string(&self, name: &str) -> Option<&str> {
        self.attribute(name)?.value()?.as_str()
    }

    /// All string values of an attribute
    pub fn strings(&self, name: &str) -> Vec<&str> {
        self.attribute(name)
            .map(|a| a.values().iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default()
    }

    /// First value of a date attribute
    pub fn date(&self, name: &str) -> Option<DateTime<Utc>> {
        self.attribute(name)?.value()?.as_date()
    }

    /// Set a single-valued attribute, replacing any previous values
    pub fn set(&mut self, name: &str, value: impl Into<AttributeValue>) {
        self.attributes
            .insert(name.to_string(), Attribute::single(value));
    }

    /// Set an attribute to the given values
    pub fn set_attribute(&mut self, name: &str, attribute: Attribute) {
        self.attributes.insert(name.to_string(), attribute);
    }

    /// Remove an attribute, returning it if present
    pub fn remove(&mut self, name: &str) -> Option<Attribute> {
        self.attributes.remove(name)
    }

    /// Textual values of an attribute, resolving well-known field names
    pub fn text_values(&self, name: &str) -> Vec<String> {
        match name {
            attr::ID => vec![self.id.clone()],
            attr::TITLE => self.title.iter().cloned().collect(),
            attr::TAGS => self.tags.iter().cloned().collect(),
            attr::RESOURCE_URI => self.resource_uri.iter().cloned().collect(),
            attr::DERIVED_RESOURCE_URI => self.derived_resource_uris.clone(),
            _ => self
                .attribute(name)
                .map(|a| a.values().iter().map(|v| v.to_text()).collect())
                .unwrap_or_default(),
        }
    }

    /// True if the record carries the tag
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    // ========================================================================
    // State predicates
    // ========================================================================

    /// A deletion marker carries both the deleted id and its last version id
    pub fn is_deleted(&self) -> bool {
        self.has_attribute(attr::DELETION_OF_ID) && self.has_attribute(attr::LAST_VERSION_ID)
    }

    /// A version snapshot
    pub fn is_revision(&self) -> bool {
        self.has_tag(tags::REVISION)
    }

    /// A live record: neither a deletion marker nor a version snapshot
    pub fn is_active(&self) -> bool {
        !self.is_deleted() && !self.has_attribute(attr::VERSION_OF_ID)
    }

    /// The record's content has been moved offline by someone
    pub fn is_offline(&self) -> bool {
        self.has_attribute(attr::OFFLINED_BY)
    }

    /// Time the record was moved offline
    pub fn offline_date(&self) -> Option<DateTime<Utc>> {
        self.date(attr::OFFLINE_DATE)
    }

    /// Id of the record a deletion marker stands in for
    pub fn deletion_of_id(&self) -> Option<&str> {
        self.string(attr::DELETION_OF_ID)
    }

    /// Revision id captured when the record was deleted
    pub fn last_version_id(&self) -> Option<&str> {
        self.string(attr::LAST_VERSION_ID)
    }

    /// Id of the record a revision was taken from
    pub fn version_of_id(&self) -> Option<&str> {
        self.string(attr::VERSION_OF_ID)
    }

    /// The id this record is known by in the live catalog
    ///
    /// For a deletion marker this is the id of the record it deleted.
    pub fn primary_id(&self) -> &str {
        if self.is_deleted() {
            if let Some(id) = self.deletion_of_id() {
                return id;
            }
        }
        &self.id
    }

    /// Ids this record references through `metacard.related` and `metacard.derived`
    pub fn associations(&self) -> impl Iterator<Item = &str> {
        self.strings(attr::RELATED)
            .into_iter()
            .chain(self.strings(attr::DERIVED))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deletion_marker() -> Metacard {
        Metacard::new("marker-1")
            .with_tag(tags::DELETED)
            .with_attribute(attr::DELETION_OF_ID, "abc123")
            .with_attribute(attr::LAST_VERSION_ID, "rev-9")
    }

    #[test]
    fn test_deleted_requires_both_attributes() {
        assert!(deletion_marker().is_deleted());

        let half = Metacard::new("m").with_attribute(attr::DELETION_OF_ID, "abc123");
        assert!(!half.is_deleted());
    }

    #[test]
    fn test_primary_id_of_deletion_marker() {
        assert_eq!(deletion_marker().primary_id(), "abc123");
        assert_eq!(Metacard::new("abc123").primary_id(), "abc123");
    }

    #[test]
    fn test_active_excludes_revisions() {
        let revision = Metacard::new("rev-1")
            .with_tag(tags::REVISION)
            .with_attribute(attr::VERSION_OF_ID, "abc123");
        assert!(!revision.is_active());
        assert!(revision.is_revision());
        assert!(Metacard::new("abc123").is_active());
        assert!(!deletion_marker().is_active());
    }

    #[test]
    fn test_offline_is_keyed_on_principal() {
        let m = Metacard::new("abc123").with_attribute(attr::OFFLINED_BY, "admin");
        assert!(m.is_offline());
        assert!(m.offline_date().is_none());
    }

    #[test]
    fn test_text_values_resolve_well_known_fields() {
        let m = Metacard::new("abc123")
            .with_title("Report")
            .with_tag("resource")
            .with_resource_uri("content:abc123");
        assert_eq!(m.text_values(attr::ID), vec!["abc123"]);
        assert_eq!(m.text_values(attr::TITLE), vec!["Report"]);
        assert_eq!(m.text_values(attr::TAGS), vec!["resource"]);
        assert_eq!(m.text_values(attr::RESOURCE_URI), vec!["content:abc123"]);
        assert!(m.text_values("missing").is_empty());
    }

    #[test]
    fn test_associations_chain_related_and_derived() {
        let mut m = Metacard::new("abc123");
        m.set_attribute(attr::RELATED, Attribute::multi(["r1", "r2"]));
        m.set_attribute(attr::DERIVED, Attribute::multi(["d1"]));
        let ids: Vec<_> = m.associations().collect();
        assert_eq!(ids, vec!["r1", "r2", "d1"]);
    }

    #[test]
    fn test_empty_attribute_is_absent() {
        let mut m = Metacard::new("abc123");
        m.set_attribute(attr::OFFLINED_BY, Attribute::default());
        assert!(!m.has_attribute(attr::OFFLINED_BY));
    }
}
