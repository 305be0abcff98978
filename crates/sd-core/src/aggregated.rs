use crate::types::{AggregatedStatus, BuildConclusion, BuildReviewStatus, BuildStatus};

/// A raw `complete` without a conclusion is reported as `progress`.
pub fn aggregate_status(
    review: Option<BuildReviewStatus>,
    conclusion: Option<BuildConclusion>,
    raw: BuildStatus,
) -> AggregatedStatus {
    if let Some(review) = review {
        return review.into();
    }
    if let Some(conclusion) = conclusion {
        return conclusion.into();
    }
    match raw {
        BuildStatus::Complete | BuildStatus::Progress => AggregatedStatus::Progress,
        BuildStatus::Expired => AggregatedStatus::Expired,
        BuildStatus::Pending => AggregatedStatus::Pending,
        BuildStatus::Error => AggregatedStatus::Error,
        BuildStatus::Aborted => AggregatedStatus::Aborted,
    }
}

pub fn aggregate_statuses(
    reviews: &[Option<BuildReviewStatus>],
    conclusions: &[Option<BuildConclusion>],
    raw: &[BuildStatus],
) -> Vec<AggregatedStatus> {
    reviews
        .iter()
        .zip(conclusions)
        .zip(raw)
        .map(|((review, conclusion), raw)| aggregate_status(*review, *conclusion, *raw))
        .collect()
}
