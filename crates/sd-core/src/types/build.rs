use crate::types::diff::DiffWithStatus;
use crate::types::enums::{
    AggregatedStatus, BuildConclusion, BuildReviewStatus, DiffStatus, JobStatus,
};
use crate::types::ids::{BucketId, BuildId, ProjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Build {
    pub id: BuildId,
    pub project_id: ProjectId,
    /// Per-project sequence number, starting at 1.
    pub number: i64,
    pub name: String,
    pub job_status: JobStatus,
    pub base_bucket_id: Option<BucketId>,
    pub compare_bucket_id: BucketId,
    /// Write-once cache, filled the first time a complete build is concluded.
    pub conclusion: Option<BuildConclusion>,
    /// Write-once cache, persisted together with `conclusion`.
    pub stats: Option<BuildStats>,
    pub concluded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Build {
    /// Persisted stats, or all zeros before the build is concluded.
    pub fn stats_or_default(&self) -> BuildStats {
        self.stats.unwrap_or_default()
    }
}

/// Missing keys in a persisted object decode as zero. Unscored diffs are only
/// counted in `total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildStats {
    pub total: u32,
    pub failure: u32,
    pub added: u32,
    pub unchanged: u32,
    pub changed: u32,
    pub removed: u32,
    pub retry_failure: u32,
    pub ignored: u32,
}

impl BuildStats {
    pub fn record(&mut self, status: DiffStatus, count: u32) {
        self.total += count;
        match status {
            DiffStatus::Failure => self.failure += count,
            DiffStatus::Added => self.added += count,
            DiffStatus::Unchanged => self.unchanged += count,
            DiffStatus::Changed => self.changed += count,
            DiffStatus::Removed => self.removed += count,
            DiffStatus::RetryFailure => self.retry_failure += count,
            DiffStatus::Ignored => self.ignored += count,
            DiffStatus::Pending => {}
        }
    }

    pub fn from_statuses(statuses: impl IntoIterator<Item = DiffStatus>) -> Self {
        let mut stats = Self::default();
        for status in statuses {
            stats.record(status, 1);
        }
        stats
    }

    /// Number of diffs that count as a change for the conclusion.
    pub fn changes(&self) -> u32 {
        self.added + self.changed + self.removed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BuildWithStatus {
    #[serde(flatten)]
    pub build: Build,
    pub status: AggregatedStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BuildReport {
    pub build: Build,
    pub status: AggregatedStatus,
    pub review_status: Option<BuildReviewStatus>,
    pub stats: BuildStats,
    pub diffs: Vec<DiffWithStatus>,
}
