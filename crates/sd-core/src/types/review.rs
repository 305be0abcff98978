use crate::types::enums::ReviewState;
use crate::types::ids::{BuildId, ReviewId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One human decision on a build. Rows are appended, never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BuildReview {
    pub id: ReviewId,
    pub build_id: BuildId,
    pub state: ReviewState,
    pub created_at: DateTime<Utc>,
}
