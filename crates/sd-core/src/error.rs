use crate::types::ids::BuildId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("build not found")]
    NotFound,
    #[error("invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("storage error: {message}")]
    Storage { message: String },
}

#[derive(Debug, Error)]
pub enum DiffError {
    #[error("diff not found")]
    NotFound,
    #[error("invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },
    #[error("relation not loaded: {relation}")]
    RelationNotLoaded { relation: &'static str },
    #[error("diff already scored")]
    AlreadyScored,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("storage error: {message}")]
    Storage { message: String },
}

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },
    #[error("pending review reached aggregation for build {build_id}")]
    PendingReviewInAggregation { build_id: BuildId },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("storage error: {message}")]
    Storage { message: String },
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact not found")]
    NotFound,
    #[error("bucket not found")]
    BucketNotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("storage error: {message}")]
    Storage { message: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config: {message}")]
    Invalid { message: String },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Diff(#[from] DiffError),
    #[error(transparent)]
    Review(#[from] ReviewError),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("internal error: {message}")]
    Internal { message: String },
}
