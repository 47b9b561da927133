//! Archive path scheme
//!
//! Every record lives under `metacards/<shard>/<id>/` where the shard is the
//! first three characters of the id. History snapshots of a record nest under
//! `history/<history-id>/` inside the record's root and use the same layout.
//! Ids shorter than three characters are not supported.

use std::fmt;
use std::str::FromStr;

/// Top-level directory holding all records
pub const METACARDS: &str = "metacards";
/// Directory holding the encoded record
pub const METACARD_DIR: &str = "metacard";
/// Directory holding primary content
pub const CONTENT_DIR: &str = "content";
/// Directory holding one subdirectory per derived role
pub const DERIVED_DIR: &str = "derived";
/// Directory holding history snapshots
pub const HISTORY_DIR: &str = "history";
/// Extension of encoded record files
pub const METACARD_EXTENSION: &str = "xml";
/// Root entry listing records that could not be encoded
pub const ERRORS_FILE: &str = "errors.json";

/// Role of a derived content entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DerivedRole {
    /// Preview rendition
    Overview,
    /// Original upload
    Original,
    /// Any other derived artifact, numbered from 1 per record
    Other(u32),
}

impl fmt::Display for DerivedRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DerivedRole::Overview => f.write_str("overview"),
            DerivedRole::Original => f.write_str("original"),
            DerivedRole::Other(n) => write!(f, "other-{}", n),
        }
    }
}

impl FromStr for DerivedRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "overview" => Ok(DerivedRole::Overview),
            "original" => Ok(DerivedRole::Original),
            _ => s
                .strip_prefix("other-")
                .and_then(|n| n.parse::<u32>().ok())
                .filter(|n| *n >= 1)
                .map(DerivedRole::Other)
                .ok_or_else(|| format!("unknown derived role '{}'", s)),
        }
    }
}

/// Order a record's derived locators and give each a role
///
/// The first `#overview` locator becomes `overview`, the first `#original`
/// locator becomes `original`, and every locator that is neither is numbered
/// `other-1`, `other-2`, ... in its original order. Repeated overview or
/// original locators are dropped.
pub fn assign_derived_roles<T: AsRef<str>>(uris: &[T]) -> Vec<(DerivedRole, &str)> {
    let is_overview = |u: &str| u.ends_with("#overview");
    let is_original = |u: &str| u.ends_with("#original");

    let mut roles = Vec::with_capacity(uris.len());
    if let Some(u) = uris.iter().map(|u| u.as_ref()).find(|u| is_overview(u)) {
        roles.push((DerivedRole::Overview, u));
    }
    if let Some(u) = uris.iter().map(|u| u.as_ref()).find(|u| is_original(u)) {
        roles.push((DerivedRole::Original, u));
    }
    let others = uris
        .iter()
        .map(|u| u.as_ref())
        .filter(|u| !is_overview(u) && !is_original(u));
    for (index, u) in others.enumerate() {
        roles.push((DerivedRole::Other(index as u32 + 1), u));
    }
    roles
}

/// First three characters of an id
pub fn shard(id: &str) -> &str {
    match id.char_indices().nth(3) {
        Some((end, _)) => &id[..end],
        None => id,
    }
}

/// `metacards/<shard>/<id>`
pub fn record_root(id: &str) -> String {
    format!("{}/{}/{}", METACARDS, shard(id), id)
}

/// `metacards/<shard>/<id>/metacard/<id>.xml`
pub fn metacard_path(id: &str) -> String {
    metacard_under(&record_root(id), id)
}

/// `metacards/<shard>/<id>/content/<filename>`
pub fn content_path(id: &str, filename: &str) -> String {
    format!("{}/{}/{}", record_root(id), CONTENT_DIR, filename)
}

/// `metacards/<shard>/<id>/derived/<role>/<filename>`
pub fn derived_path(id: &str, role: DerivedRole, filename: &str) -> String {
    derived_under(&record_root(id), role, filename)
}

/// `metacards/<shard>/<primary>/history/<history>`
pub fn history_root(primary_id: &str, history_id: &str) -> String {
    format!("{}/{}/{}", record_root(primary_id), HISTORY_DIR, history_id)
}

/// `.../history/<history>/metacard/<history>.xml`
pub fn history_metacard_path(primary_id: &str, history_id: &str) -> String {
    metacard_under(&history_root(primary_id, history_id), history_id)
}

/// `.../history/<history>/content/<filename>`
pub fn history_content_path(primary_id: &str, history_id: &str, filename: &str) -> String {
    format!(
        "{}/{}/{}",
        history_root(primary_id, history_id),
        CONTENT_DIR,
        filename
    )
}

/// `.../history/<history>/derived/<role>/<filename>`
pub fn history_derived_path(
    primary_id: &str,
    history_id: &str,
    role: DerivedRole,
    filename: &str,
) -> String {
    derived_under(&history_root(primary_id, history_id), role, filename)
}

fn metacard_under(root: &str, id: &str) -> String {
    format!("{}/{}/{}.{}", root, METACARD_DIR, id, METACARD_EXTENSION)
}

fn derived_under(root: &str, role: DerivedRole, filename: &str) -> String {
    format!("{}/{}/{}/{}", root, DERIVED_DIR, role, filename)
}
