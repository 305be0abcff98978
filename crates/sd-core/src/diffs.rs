use crate::error::DiffError;
use crate::types::{BuildId, BuildStats, CreateDiffInput, Diff, DiffId, DiffWithStatus, JobStatus};
use std::collections::HashMap;

pub trait DiffRepository {
    fn create(&self, input: CreateDiffInput) -> Result<Diff, DiffError>;
    fn get(&self, id: &DiffId) -> Result<Option<Diff>, DiffError>;
    /// Diffs of a build with their labels, by display priority, then name.
    fn list_for_build(&self, build_id: &BuildId) -> Result<Vec<DiffWithStatus>, DiffError>;
    fn set_job_status(&self, id: &DiffId, status: JobStatus) -> Result<Diff, DiffError>;
    /// Scores a diff once; a scored diff is never rescored.
    fn record_score(&self, id: &DiffId, score: f64) -> Result<Diff, DiffError>;

    // Grouped queries: one statement for any number of builds. Builds without
    // diffs have no entry.
    fn job_statuses_for_builds(
        &self,
        build_ids: &[BuildId],
    ) -> Result<HashMap<BuildId, Vec<JobStatus>>, DiffError>;
    fn status_counts_for_builds(
        &self,
        build_ids: &[BuildId],
    ) -> Result<HashMap<BuildId, BuildStats>, DiffError>;
    fn change_counts_for_builds(
        &self,
        build_ids: &[BuildId],
    ) -> Result<HashMap<BuildId, u32>, DiffError>;
}
