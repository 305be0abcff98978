use crate::types::enums::{DiffStatus, JobStatus};
use crate::types::ids::{ArtifactId, BuildId, DiffId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// `score` stays `None` until the diff worker has scored the pair and is never
/// cleared afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Diff {
    pub id: DiffId,
    pub build_id: BuildId,
    pub base_artifact_id: Option<ArtifactId>,
    pub compare_artifact_id: Option<ArtifactId>,
    pub score: Option<f64>,
    pub job_status: JobStatus,
    pub ignored: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DiffWithStatus {
    pub diff: Diff,
    pub status: DiffStatus,
    /// Name of the compare artifact, or of the base artifact for removals.
    pub name: Option<String>,
}
