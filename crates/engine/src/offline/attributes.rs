//! Attribute rewriting for records moved offline

use chrono::{DateTime, Utc};
use metavault_core::attributes as attr;
use metavault_core::Metacard;

/// Marker values written onto a record whose content went offline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfflineStamp {
    /// Free-text note on where the archive was put
    pub comment: String,
    /// Archive location relative to the offline root
    pub location: String,
    /// Who moved the record
    pub offlined_by: String,
    /// When
    pub date: DateTime<Utc>,
}

impl OfflineStamp {
    /// Drop the record's resource locators and record where its content went
    pub fn apply(&self, metacard: &mut Metacard) {
        strip_resource_pointers(metacard);
        metacard.set(attr::OFFLINE_COMMENT, self.comment.clone());
        metacard.set(attr::OFFLINE_LOCATION_PATH, self.location.clone());
        metacard.set(attr::OFFLINED_BY, self.offlined_by.clone());
        metacard.set(attr::OFFLINE_DATE, self.date);
    }
}

/// Remove primary and derived locators along with their download URLs
pub fn strip_resource_pointers(metacard: &mut Metacard) {
    metacard.resource_uri = None;
    metacard.derived_resource_uris.clear();
    metacard.remove(attr::RESOURCE_URI);
    metacard.remove(attr::RESOURCE_DOWNLOAD_URL);
    metacard.remove(attr::DERIVED_RESOURCE_URI);
    metacard.remove(attr::DERIVED_RESOURCE_DOWNLOAD_URL);
}
