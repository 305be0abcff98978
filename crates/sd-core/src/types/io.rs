use crate::types::artifact::ArtifactMetadata;
use crate::types::enums::{JobStatus, ReviewState};
use crate::types::ids::{ArtifactId, BucketId, BuildId, ProjectId};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CreateBucketInput {
    pub project_id: ProjectId,
    pub name: String,
    pub branch: String,
    pub commit: String,
    pub complete: bool,
    pub screenshot_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CreateArtifactInput {
    pub bucket_id: BucketId,
    pub name: String,
    pub parent_name: Option<String>,
    pub metadata: Option<ArtifactMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CreateBuildInput {
    pub project_id: ProjectId,
    pub name: String,
    pub base_bucket_id: Option<BucketId>,
    pub compare_bucket_id: BucketId,
    /// Explicit build number; the next number of the project when absent.
    pub number: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CreateDiffInput {
    pub build_id: BuildId,
    pub base_artifact_id: Option<ArtifactId>,
    pub compare_artifact_id: Option<ArtifactId>,
    pub score: Option<f64>,
    pub job_status: JobStatus,
    pub ignored: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CreateReviewInput {
    pub build_id: BuildId,
    pub state: ReviewState,
}
