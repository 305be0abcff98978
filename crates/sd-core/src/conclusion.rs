use crate::types::{BuildConclusion, BuildId, BuildStatus, DiffStatus};
use std::collections::HashMap;

pub fn conclusion_from_change_count(changes: u32) -> BuildConclusion {
    if changes > 0 {
        BuildConclusion::ChangesDetected
    } else {
        BuildConclusion::NoChanges
    }
}

pub fn conclude(statuses: impl IntoIterator<Item = DiffStatus>) -> BuildConclusion {
    let changes = statuses.into_iter().filter(|status| status.is_change()).count();
    conclusion_from_change_count(u32::try_from(changes).unwrap_or(u32::MAX))
}

pub fn concludable_build_ids(build_ids: &[BuildId], statuses: &[BuildStatus]) -> Vec<BuildId> {
    build_ids
        .iter()
        .zip(statuses)
        .filter(|(_, status)| **status == BuildStatus::Complete)
        .map(|(id, _)| id.clone())
        .collect()
}

/// `None` for builds not complete; builds without a change count have no changes.
pub fn compute_conclusions(
    build_ids: &[BuildId],
    statuses: &[BuildStatus],
    change_counts: &HashMap<BuildId, u32>,
) -> Vec<Option<BuildConclusion>> {
    build_ids
        .iter()
        .zip(statuses)
        .map(|(id, status)| {
            if *status != BuildStatus::Complete {
                return None;
            }
            let changes = change_counts.get(id).copied().unwrap_or(0);
            Some(conclusion_from_change_count(changes))
        })
        .collect()
}
