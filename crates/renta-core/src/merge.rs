//! Merging extraction candidates into the form record

use crate::extract::ExtractionCandidate;
use crate::form::FormRecord;
use serde::{Deserialize, Serialize};

/// What to do when a candidate targets a field the user typed by hand
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// The candidate overwrites whatever is there, including manual edits
    #[default]
    LastWriteWins,
    /// Fields last written on the review surface keep their value
    PreserveManual,
}

/// Merge with [`MergePolicy::LastWriteWins`]
pub fn merge(current: &FormRecord, candidates: &[ExtractionCandidate]) -> FormRecord {
    merge_with_policy(current, candidates, MergePolicy::LastWriteWins)
}

/// Apply `candidates` in order on top of a copy of `current`.
///
/// Later candidates for the same field overwrite earlier ones. `current` is
/// left untouched so callers can diff old and new before persisting.
pub fn merge_with_policy(
    current: &FormRecord,
    candidates: &[ExtractionCandidate],
    policy: MergePolicy,
) -> FormRecord {
    let mut merged = current.clone();
    for candidate in candidates {
        if policy == MergePolicy::PreserveManual && current.is_manual(candidate.field) {
            tracing::debug!("Keeping manual value for {}", candidate.field);
            continue;
        }
        merged.set(candidate.field, candidate.value.clone());
    }
    merged
}
