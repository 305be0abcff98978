use crate::types::{Build, BuildId, BuildStatus, JobStatus};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

pub const BUILD_EXPIRATION_SECS: i64 = 2 * 3600;

pub fn needs_diff_job_statuses(build: &Build) -> bool {
    build.job_status == JobStatus::Complete && build.conclusion.is_none()
}

/// Any failed diff fails the build. No diffs at all counts as complete.
pub fn rollup_diff_job_statuses(statuses: &[JobStatus]) -> BuildStatus {
    if statuses.contains(&JobStatus::Error) {
        return BuildStatus::Error;
    }
    if statuses.iter().all(|status| *status == JobStatus::Complete) {
        return BuildStatus::Complete;
    }
    BuildStatus::Progress
}

/// Expiration is a view of `now`, never stored.
pub fn resolve_build_status(
    build: &Build,
    diff_job_statuses: Option<&[JobStatus]>,
    now: DateTime<Utc>,
    expiration: Duration,
) -> BuildStatus {
    match build.job_status {
        JobStatus::Pending | JobStatus::Progress => {
            if now - build.created_at > expiration {
                BuildStatus::Expired
            } else {
                BuildStatus::Pending
            }
        }
        JobStatus::Error => BuildStatus::Error,
        JobStatus::Aborted => BuildStatus::Aborted,
        JobStatus::Complete => {
            if build.conclusion.is_some() {
                return BuildStatus::Complete;
            }
            rollup_diff_job_statuses(diff_job_statuses.unwrap_or(&[]))
        }
    }
}

pub fn resolve_build_statuses<'b>(
    builds: impl IntoIterator<Item = &'b Build>,
    diff_job_statuses: &HashMap<BuildId, Vec<JobStatus>>,
    now: DateTime<Utc>,
    expiration: Duration,
) -> Vec<BuildStatus> {
    builds
        .into_iter()
        .map(|build| {
            let statuses = diff_job_statuses.get(&build.id).map(Vec::as_slice);
            resolve_build_status(build, statuses, now, expiration)
        })
        .collect()
}
