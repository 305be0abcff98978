use crate::error::ArtifactError;
use crate::types::{
    Artifact, ArtifactBucket, ArtifactId, BucketId, CreateArtifactInput, CreateBucketInput,
};

pub trait ArtifactRepository {
    fn create_bucket(&self, input: CreateBucketInput) -> Result<ArtifactBucket, ArtifactError>;
    fn get_bucket(&self, id: &BucketId) -> Result<Option<ArtifactBucket>, ArtifactError>;
    fn create_artifact(&self, input: CreateArtifactInput) -> Result<Artifact, ArtifactError>;
    fn get_artifact(&self, id: &ArtifactId) -> Result<Option<Artifact>, ArtifactError>;
}
