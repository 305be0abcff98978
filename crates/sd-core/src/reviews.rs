use crate::error::ReviewError;
use crate::types::{BuildId, BuildReview, CreateReviewInput};
use std::collections::HashMap;

pub trait ReviewRepository {
    fn create(&self, input: CreateReviewInput) -> Result<BuildReview, ReviewError>;
    fn list_for_build(&self, build_id: &BuildId) -> Result<Vec<BuildReview>, ReviewError>;
    /// Approved and rejected reviews of the given builds, in one query.
    fn submitted_reviews_for_builds(
        &self,
        build_ids: &[BuildId],
    ) -> Result<HashMap<BuildId, Vec<BuildReview>>, ReviewError>;
}
