//! Import reconciliation rules
//!
//! An archived record is compared with whatever the catalog currently holds
//! under its primary id. Both sides are reduced to a small state, and the
//! pair picks exactly one action:
//!
//! | Archived        | Catalog                | Action              |
//! |-----------------|------------------------|---------------------|
//! | any             | not found              | create              |
//! | revision        | found                  | no-op               |
//! | active          | deletion marker        | restore, then update|
//! | active          | active, offline        | update              |
//! | active          | active, online         | no-op               |
//! | deletion marker | active                 | delete              |
//! | deletion marker | deletion marker        | no-op               |
//! | anything else   |                        | ambiguous           |
//!
//! An online active record is left alone rather than overwritten, so newer
//! live edits are never clobbered by an older archive.

use metavault_core::Metacard;
use std::fmt;

/// State of the record found in an archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchivedState {
    /// Tagged as a version snapshot
    Revision,
    /// Stands in for a deleted record
    DeletionMarker,
    /// A live record
    Active,
    /// Carries a version id without being tagged a revision
    Unrecognized,
}

impl ArchivedState {
    /// Reduce an archived record to its state
    pub fn of(metacard: &Metacard) -> Self {
        if metacard.is_revision() {
            ArchivedState::Revision
        } else if metacard.is_deleted() {
            ArchivedState::DeletionMarker
        } else if metacard.is_active() {
            ArchivedState::Active
        } else {
            ArchivedState::Unrecognized
        }
    }
}

/// State of the record the catalog holds under the same primary id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExistingState {
    /// Nothing stored
    NotFound,
    /// A deletion marker
    Deleted,
    /// A live record whose content is offline
    ActiveOffline,
    /// A live record with its content in place
    ActiveOnline,
    /// A version snapshot
    Revision,
    /// Carries a version id without being tagged a revision
    Unrecognized,
}

impl ExistingState {
    /// Reduce a catalog lookup result to its state
    pub fn of(existing: Option<&Metacard>) -> Self {
        let Some(metacard) = existing else {
            return ExistingState::NotFound;
        };
        if metacard.is_deleted() {
            ExistingState::Deleted
        } else if metacard.is_revision() {
            ExistingState::Revision
        } else if metacard.is_active() {
            if metacard.is_offline() {
                ExistingState::ActiveOffline
            } else {
                ExistingState::ActiveOnline
            }
        } else {
            ExistingState::Unrecognized
        }
    }
}

/// Why nothing was done for a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoOpReason {
    /// History snapshots are never materialized over an existing record
    RevisionExists,
    /// The live record stays as it is
    OnlineActive,
    /// The record is already deleted
    AlreadyDeleted,
}

/// What an import does with one archived record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImportAction {
    /// Insert the archived record and its content
    Create,
    /// Write the archived record over the existing one
    Update {
        /// Id of the record being replaced
        existing_id: String,
    },
    /// Revert the deleted record to its last version, then update it
    RestoreThenUpdate {
        /// Id of the deleted record
        deleted_id: String,
        /// Snapshot to restore
        version_id: String,
    },
    /// Remove the existing record
    Delete {
        /// Id of the record to remove
        existing_id: String,
    },
    /// Leave the catalog as it is
    NoOp(NoOpReason),
    /// No rule applies; the unit fails without changes
    Ambiguous {
        /// State of the archived record
        archived: ArchivedState,
        /// State of the catalog record
        existing: ExistingState,
    },
}

impl ImportAction {
    /// True if the action changes the catalog
    pub fn is_mutation(&self) -> bool {
        !matches!(self, ImportAction::NoOp(_) | ImportAction::Ambiguous { .. })
    }
}

impl fmt::Display for ImportAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportAction::Create => f.write_str("create"),
            ImportAction::Update { .. } => f.write_str("update"),
            ImportAction::RestoreThenUpdate { .. } => f.write_str("restore then update"),
            ImportAction::Delete { .. } => f.write_str("delete"),
            ImportAction::NoOp(reason) => write!(f, "no-op ({:?})", reason),
            ImportAction::Ambiguous { archived, existing } => {
                write!(f, "ambiguous ({:?} archived, {:?} existing)", archived, existing)
            }
        }
    }
}

/// The reconciliation rules
pub struct Reconciliation;

impl Reconciliation {
    /// Pick the action for an archived record given the catalog's record
    pub fn classify(archived: &Metacard, existing: Option<&Metacard>) -> ImportAction {
        use ArchivedState as A;
        use ExistingState as E;

        let archived_state = ArchivedState::of(archived);
        let existing_state = ExistingState::of(existing);
        let existing_id = || existing.map(|m| m.id.clone()).unwrap_or_default();

        match (archived_state, existing_state) {
            (_, E::NotFound) => ImportAction::Create,

            (A::Revision, E::Deleted)
            | (A::Revision, E::ActiveOffline)
            | (A::Revision, E::ActiveOnline)
            | (A::Revision, E::Revision)
            | (A::Revision, E::Unrecognized) => ImportAction::NoOp(NoOpReason::RevisionExists),

            (A::Active, E::Deleted) => match existing.and_then(restore_target) {
                Some((deleted_id, version_id)) => ImportAction::RestoreThenUpdate {
                    deleted_id,
                    version_id,
                },
                None => ImportAction::Ambiguous {
                    archived: archived_state,
                    existing: existing_state,
                },
            },
            (A::Active, E::ActiveOffline) => ImportAction::Update {
                existing_id: existing_id(),
            },
            (A::Active, E::ActiveOnline) => ImportAction::NoOp(NoOpReason::OnlineActive),

            (A::DeletionMarker, E::ActiveOffline) | (A::DeletionMarker, E::ActiveOnline) => {
                ImportAction::Delete {
                    existing_id: existing_id(),
                }
            }
            (A::DeletionMarker, E::Deleted) => ImportAction::NoOp(NoOpReason::AlreadyDeleted),

            (A::Active, E::Revision)
            | (A::Active, E::Unrecognized)
            | (A::DeletionMarker, E::Revision)
            | (A::DeletionMarker, E::Unrecognized)
            | (A::Unrecognized, E::Deleted)
            | (A::Unrecognized, E::ActiveOffline)
            | (A::Unrecognized, E::ActiveOnline)
            | (A::Unrecognized, E::Revision)
            | (A::Unrecognized, E::Unrecognized) => ImportAction::Ambiguous {
                archived: archived_state,
                existing: existing_state,
            },
        }
    }
}

fn restore_target(marker: &Metacard) -> Option<(String, String)> {
    Some((
        marker.deletion_of_id()?.to_string(),
        marker.last_version_id()?.to_string(),
    ))
}
