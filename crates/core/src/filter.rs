//! Typed query filters
//!
//! Filters are a small closed algebra that both the engine (to build queries)
//! and catalog implementations (to evaluate them) agree on. Text comparison is
//! exact; well-known fields resolve through [`Metacard::text_values`].

use crate::attributes::{self as attr, tags};
use crate::metacard::Metacard;
use serde::{Deserialize, Serialize};

/// A predicate over metacards
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Filter {
    /// Matches every record
    Everything,
    /// Matches records where any value of the attribute equals the text
    Equals {
        /// Attribute name
        attribute: String,
        /// Expected text
        value: String,
    },
    /// Matches records where the attribute has at least one value
    Exists(String),
    /// All sub-filters match
    AllOf(Vec<Filter>),
    /// At least one sub-filter matches
    AnyOf(Vec<Filter>),
    /// The sub-filter does not match
    Not(Box<Filter>),
}

impl Filter {
    /// `attribute == value`
    pub fn equals(attribute: &str, value: impl Into<String>) -> Self {
        Filter::Equals {
            attribute: attribute.to_string(),
            value: value.into(),
        }
    }

    /// `id == value`
    pub fn id(value: impl Into<String>) -> Self {
        Filter::equals(attr::ID, value)
    }

    /// Record carries the tag
    pub fn tag(tag: &str) -> Self {
        Filter::equals(attr::TAGS, tag)
    }

    /// Conjunction
    pub fn all_of(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::AllOf(filters.into_iter().collect())
    }

    /// Disjunction
    pub fn any_of(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::AnyOf(filters.into_iter().collect())
    }

    /// Negation
    pub fn negate(filter: Filter) -> Self {
        Filter::Not(Box::new(filter))
    }

    /// Revisions of the record with the given id
    pub fn history_of(id: impl Into<String>) -> Self {
        Filter::all_of([
            Filter::tag(tags::REVISION),
            Filter::equals(attr::VERSION_OF_ID, id),
        ])
    }

    /// The live record with the given id or its deletion marker
    pub fn record_or_deletion(id: &str) -> Self {
        Filter::any_of([Filter::id(id), Filter::equals(attr::DELETION_OF_ID, id)])
    }

    /// Evaluate against a record
    pub fn matches(&self, metacard: &Metacard) -> bool {
        match self {
            Filter::Everything => true,
            Filter::Equals { attribute, value } => metacard
                .text_values(attribute)
                .iter()
                .any(|v| v == value),
            Filter::Exists(attribute) => !metacard.text_values(attribute).is_empty(),
            Filter::AllOf(filters) => filters.iter().all(|f| f.matches(metacard)),
            Filter::AnyOf(filters) => filters.iter().any(|f| f.matches(metacard)),
            Filter::Not(filter) => !filter.matches(metacard),
        }
    }
}
