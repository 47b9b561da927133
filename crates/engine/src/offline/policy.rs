//! Edit restrictions for offline records
//!
//! Once a record's content is offline the catalog entry is a pointer to an
//! archive, so edits to it are refused. Deployments may still allow the
//! offline comment to be corrected.

use super::OfflineError;
use metavault_core::{is_offline_comment_only_update, Metacard};

/// Decides whether an update to a record may proceed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OfflineEditPolicy {
    /// Permit updates that change nothing but the offline comment
    pub allow_comment_edits: bool,
}

impl OfflineEditPolicy {
    /// Policy that permits offline comment corrections
    pub fn allowing_comment_edits() -> Self {
        Self {
            allow_comment_edits: true,
        }
    }

    /// True if replacing `original` with `updated` must be refused
    pub fn is_restricted(&self, original: &Metacard, updated: &Metacard) -> bool {
        if !original.is_offline() {
            return false;
        }
        !(self.allow_comment_edits && is_offline_comment_only_update(original, updated))
    }

    /// Check a batch of pending updates against the records they replace
    ///
    /// `originals` are matched to updates by id; updates with no original
    /// are new records and always pass.
    pub fn check(&self, originals: &[Metacard], updates: &[Metacard]) -> Result<(), OfflineError> {
        for updated in updates {
            let original = originals.iter().find(|m| m.id == updated.id);
            if let Some(original) = original {
                if self.is_restricted(original, updated) {
                    return Err(OfflineError::Restricted(updated.id.clone()));
                }
            }
        }
        Ok(())
    }
}
