//! Edits to offline records
//!
//! Once a record's content has been moved offline the only edit users may
//! still make is to the free-text offline comment.

use crate::attributes::OFFLINE_COMMENT;
use crate::metacard::Metacard;

/// True if `updated` differs from `original` at most in the offline comment
///
/// Every other field and attribute, whatever its value type, takes part in
/// the comparison.
pub fn is_offline_comment_only_update(original: &Metacard, updated: &Metacard) -> bool {
    without_comment(original) == without_comment(updated)
}

fn without_comment(metacard: &Metacard) -> Metacard {
    let mut stripped = metacard.clone();
    stripped.remove(OFFLINE_COMMENT);
    stripped
}
