use crate::error::DiffError;
use crate::types::{Artifact, ArtifactId, Diff, DiffStatus};

/// Substring a test runner appends to the name of a failure capture.
pub const FAILURE_MARKER: &str = " (failed).";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffStatusInput<'a> {
    pub compare_artifact_id: Option<&'a ArtifactId>,
    pub base_artifact_id: Option<&'a ArtifactId>,
    pub score: Option<f64>,
    pub ignored: bool,
    /// Compare artifact name. Only read for additions.
    pub name: &'a str,
    pub retry: Option<u32>,
    pub retries: Option<u32>,
}

pub fn is_failure_capture(name: &str) -> bool {
    name.contains(FAILURE_MARKER)
}

pub fn derive_diff_status(input: &DiffStatusInput<'_>) -> DiffStatus {
    if input.compare_artifact_id.is_none() {
        return DiffStatus::Removed;
    }

    if input.base_artifact_id.is_none() {
        if !is_failure_capture(input.name) {
            return DiffStatus::Added;
        }
        // A failure with attempts left is only a retry.
        return match (input.retry, input.retries) {
            (Some(retry), Some(retries)) if retry != retries => DiffStatus::RetryFailure,
            _ => DiffStatus::Failure,
        };
    }

    match input.score {
        None => DiffStatus::Pending,
        Some(score) if score > 0.0 => {
            if input.ignored {
                DiffStatus::Ignored
            } else {
                DiffStatus::Changed
            }
        }
        Some(_) => DiffStatus::Unchanged,
    }
}

pub trait ArtifactLoader {
    fn load_artifact(&self, id: &ArtifactId) -> Result<Artifact, DiffError>;
}

impl<F> ArtifactLoader for F
where
    F: Fn(&ArtifactId) -> Result<Artifact, DiffError>,
{
    fn load_artifact(&self, id: &ArtifactId) -> Result<Artifact, DiffError> {
        self(id)
    }
}

/// The compare artifact is only needed for additions. Without it loaded or a
/// loader the call fails instead of guessing.
pub fn resolve_diff_status(
    diff: &Diff,
    compare_artifact: Option<&Artifact>,
    loader: Option<&dyn ArtifactLoader>,
) -> Result<DiffStatus, DiffError> {
    let needs_artifact = diff.base_artifact_id.is_none();
    let compare_id = match (&diff.compare_artifact_id, needs_artifact) {
        (Some(id), true) => id,
        _ => return Ok(derive_diff_status(&input_without_artifact(diff))),
    };

    let loaded;
    let artifact = match compare_artifact {
        Some(artifact) => {
            if &artifact.id != compare_id {
                return Err(DiffError::InvalidInput {
                    message: format!(
                        "loaded artifact {} is not the compare artifact {compare_id}",
                        artifact.id
                    ),
                });
            }
            artifact
        }
        None => {
            let loader = loader.ok_or(DiffError::RelationNotLoaded {
                relation: "compare_artifact",
            })?;
            loaded = loader.load_artifact(compare_id)?;
            &loaded
        }
    };

    Ok(derive_diff_status(&DiffStatusInput {
        compare_artifact_id: diff.compare_artifact_id.as_ref(),
        base_artifact_id: diff.base_artifact_id.as_ref(),
        score: diff.score,
        ignored: diff.ignored,
        name: &artifact.name,
        retry: artifact.retry(),
        retries: artifact.retries(),
    }))
}

fn input_without_artifact(diff: &Diff) -> DiffStatusInput<'_> {
    DiffStatusInput {
        compare_artifact_id: diff.compare_artifact_id.as_ref(),
        base_artifact_id: diff.base_artifact_id.as_ref(),
        score: diff.score,
        ignored: diff.ignored,
        name: "",
        retry: None,
        retries: None,
    }
}
