use sd_core::types::{
    AggregatedStatus, Artifact, ArtifactBucket, ArtifactMetadata, Build, BuildConclusion,
    BuildReport, BuildReview, BuildReviewStatus, BuildStats, BuildStatus, BuildWithStatus, Diff,
    DiffStatus, DiffWithStatus, JobStatus, ReviewState, TestMetadata,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(title = "snapdiff", description = "Values produced by the build status engine"),
    components(schemas(
        BuildWithStatus,
        BuildReport,
        Build,
        BuildStats,
        Diff,
        DiffWithStatus,
        BuildReview,
        Artifact,
        ArtifactBucket,
        ArtifactMetadata,
        TestMetadata,
        AggregatedStatus,
        BuildStatus,
        BuildConclusion,
        BuildReviewStatus,
        DiffStatus,
        JobStatus,
        ReviewState,
    ))
)]
struct SchemaDoc;

pub fn generate_schema() -> Result<String, serde_json::Error> {
    SchemaDoc::openapi().to_pretty_json()
}
