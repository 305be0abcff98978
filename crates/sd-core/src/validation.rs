use crate::error::{BuildError, DiffError, ReviewError};
use crate::types::{CreateBuildInput, CreateDiffInput, ReviewState};

pub fn validate_create_build(input: &CreateBuildInput) -> Result<(), BuildError> {
    if input.base_bucket_id.as_ref() == Some(&input.compare_bucket_id) {
        return Err(BuildError::Validation {
            field: "compare_bucket_id",
            message: "the base bucket should be different to the compare one".to_string(),
        });
    }
    if input.name.trim().is_empty() {
        return Err(BuildError::Validation {
            field: "name",
            message: "build name cannot be empty".to_string(),
        });
    }
    if let Some(number) = input.number {
        if number < 0 {
            return Err(BuildError::Validation {
                field: "number",
                message: format!("build number must not be negative, got {number}"),
            });
        }
    }
    Ok(())
}

pub fn validate_create_diff(input: &CreateDiffInput) -> Result<(), DiffError> {
    if input.base_artifact_id.is_some() && input.base_artifact_id == input.compare_artifact_id {
        return Err(DiffError::Validation {
            field: "compare_artifact_id",
            message: "the base artifact should be different to the compare one".to_string(),
        });
    }
    if input.base_artifact_id.is_none() && input.compare_artifact_id.is_none() {
        return Err(DiffError::Validation {
            field: "compare_artifact_id",
            message: "a diff needs a base or a compare artifact".to_string(),
        });
    }
    if let Some(score) = input.score {
        validate_score(score)?;
    }
    Ok(())
}

pub fn validate_score(score: f64) -> Result<(), DiffError> {
    if !(0.0..=1.0).contains(&score) {
        return Err(DiffError::Validation {
            field: "score",
            message: format!("score must be within [0, 1], got {score}"),
        });
    }
    Ok(())
}

/// Reviews submitted by a person are decisions; `pending` is not one.
pub fn validate_submitted_review(state: ReviewState) -> Result<(), ReviewError> {
    match state {
        ReviewState::Approved | ReviewState::Rejected => Ok(()),
        ReviewState::Pending => Err(ReviewError::Validation {
            field: "state",
            message: "a submitted review must be approved or rejected".to_string(),
        }),
    }
}
