use crate::error::BuildError;
use crate::types::{
    Build, BuildConclusion, BuildId, BuildStats, CreateBuildInput, JobStatus, ProjectId,
};
use chrono::{DateTime, Utc};

pub trait BuildRepository {
    fn create(&self, input: CreateBuildInput) -> Result<Build, BuildError>;
    fn get(&self, id: &BuildId) -> Result<Option<Build>, BuildError>;
    /// Builds for the given ids, in the order of `ids`; unknown ids are skipped.
    fn get_many(&self, ids: &[BuildId]) -> Result<Vec<Build>, BuildError>;
    fn list_for_project(
        &self,
        project_id: &ProjectId,
        limit: Option<u32>,
    ) -> Result<Vec<Build>, BuildError>;
    fn list_with_submitted_review(&self, project_id: &ProjectId) -> Result<Vec<Build>, BuildError>;
    fn set_job_status(&self, id: &BuildId, status: JobStatus) -> Result<Build, BuildError>;
    /// Persists conclusion and stats unless a conclusion is already stored.
    /// Returns whether this call wrote them.
    fn store_conclusion(
        &self,
        id: &BuildId,
        conclusion: BuildConclusion,
        stats: &BuildStats,
        concluded_at: DateTime<Utc>,
    ) -> Result<bool, BuildError>;
}
