use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Progress,
    Complete,
    Error,
    Aborted,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Pending,
        JobStatus::Progress,
        JobStatus::Complete,
        JobStatus::Error,
        JobStatus::Aborted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Progress => "progress",
            Self::Complete => "complete",
            Self::Error => "error",
            Self::Aborted => "aborted",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum DiffStatus {
    Removed,
    Added,
    Failure,
    RetryFailure,
    Changed,
    Ignored,
    Unchanged,
    Pending,
}

impl DiffStatus {
    pub const ALL: [DiffStatus; 8] = [
        DiffStatus::Removed,
        DiffStatus::Added,
        DiffStatus::Failure,
        DiffStatus::RetryFailure,
        DiffStatus::Changed,
        DiffStatus::Ignored,
        DiffStatus::Unchanged,
        DiffStatus::Pending,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Removed => "removed",
            Self::Added => "added",
            Self::Failure => "failure",
            Self::RetryFailure => "retryFailure",
            Self::Changed => "changed",
            Self::Ignored => "ignored",
            Self::Unchanged => "unchanged",
            Self::Pending => "pending",
        }
    }

    /// Display priority, ascending. Unscored diffs sort with unchanged ones.
    pub fn sort_rank(self) -> u8 {
        match self {
            Self::Failure => 0,
            Self::Changed => 1,
            Self::Added => 2,
            Self::Removed => 3,
            Self::Unchanged | Self::Pending => 4,
            Self::RetryFailure => 5,
            Self::Ignored => 6,
        }
    }

    /// Labels that make a build conclude with `changes-detected`.
    pub fn is_change(self) -> bool {
        matches!(self, Self::Added | Self::Changed | Self::Removed)
    }
}

impl fmt::Display for DiffStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    Expired,
    Pending,
    Progress,
    Complete,
    Error,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum BuildConclusion {
    NoChanges,
    ChangesDetected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BuildReviewStatus {
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReviewState {
    Pending,
    Approved,
    Rejected,
}

/// The single status exposed to callers. Never `complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum AggregatedStatus {
    Accepted,
    Rejected,
    NoChanges,
    ChangesDetected,
    Expired,
    Pending,
    Progress,
    Error,
    Aborted,
}

impl AggregatedStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::NoChanges => "no-changes",
            Self::ChangesDetected => "changes-detected",
            Self::Expired => "expired",
            Self::Pending => "pending",
            Self::Progress => "progress",
            Self::Error => "error",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for AggregatedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl From<BuildReviewStatus> for AggregatedStatus {
    fn from(value: BuildReviewStatus) -> Self {
        match value {
            BuildReviewStatus::Accepted => Self::Accepted,
            BuildReviewStatus::Rejected => Self::Rejected,
        }
    }
}

impl From<BuildConclusion> for AggregatedStatus {
    fn from(value: BuildConclusion) -> Self {
        match value {
            BuildConclusion::NoChanges => Self::NoChanges,
            BuildConclusion::ChangesDetected => Self::ChangesDetected,
        }
    }
}
