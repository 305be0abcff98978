pub mod artifact;
pub mod build;
pub mod diff;
pub mod enums;
pub mod ids;
pub mod io;
pub mod review;

pub use artifact::{Artifact, ArtifactBucket, ArtifactMetadata, TestMetadata};
pub use build::{Build, BuildReport, BuildStats, BuildWithStatus};
pub use diff::{Diff, DiffWithStatus};
pub use enums::{
    AggregatedStatus, BuildConclusion, BuildReviewStatus, BuildStatus, DiffStatus, JobStatus,
    ReviewState,
};
pub use ids::{ArtifactId, BucketId, BuildId, DiffId, IdError, ProjectId, ReviewId};
pub use io::{
    CreateArtifactInput, CreateBucketInput, CreateBuildInput, CreateDiffInput, CreateReviewInput,
};
pub use review::BuildReview;
