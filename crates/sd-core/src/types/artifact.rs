use crate::types::ids::{ArtifactId, BucketId, ProjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ArtifactBucket {
    pub id: BucketId,
    pub project_id: ProjectId,
    pub name: String,
    pub branch: String,
    pub commit: String,
    pub complete: bool,
    pub screenshot_count: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Artifact {
    pub id: ArtifactId,
    pub bucket_id: BucketId,
    pub name: String,
    /// Set on child captures; those are left out of stats and conclusions.
    pub parent_name: Option<String>,
    pub metadata: Option<ArtifactMetadata>,
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    pub fn retry(&self) -> Option<u32> {
        self.metadata.as_ref()?.test.as_ref()?.retry
    }

    pub fn retries(&self) -> Option<u32> {
        self.metadata.as_ref()?.test.as_ref()?.retries
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ArtifactMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<TestMetadata>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TestMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
}
