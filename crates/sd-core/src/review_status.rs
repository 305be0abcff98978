use crate::error::ReviewError;
use crate::types::{Build, BuildConclusion, BuildId, BuildReview, BuildReviewStatus, ReviewState};
use std::collections::HashMap;

/// Whether a build's reviews mean anything. Builds without detected changes
/// have no review status, whatever rows exist.
pub fn is_reviewable(build: &Build) -> bool {
    build.conclusion == Some(BuildConclusion::ChangesDetected)
}

/// The latest review by `(created_at, id)` wins. The storage query filters out
/// pending rows, so one reaching this point is a broken invariant and fails.
pub fn latest_review_status(
    build_id: &BuildId,
    reviews: &[BuildReview],
) -> Result<Option<BuildReviewStatus>, ReviewError> {
    let mut latest: Option<(&BuildReview, BuildReviewStatus)> = None;
    for review in reviews {
        let status = match review.state {
            ReviewState::Approved => BuildReviewStatus::Accepted,
            ReviewState::Rejected => BuildReviewStatus::Rejected,
            ReviewState::Pending => {
                return Err(ReviewError::PendingReviewInAggregation {
                    build_id: build_id.clone(),
                });
            }
        };
        let newer = match latest {
            None => true,
            Some((current, _)) => {
                (&review.created_at, &review.id) > (&current.created_at, &current.id)
            }
        };
        if newer {
            latest = Some((review, status));
        }
    }

    Ok(latest.map(|(_, status)| status))
}

pub fn review_statuses<'b>(
    builds: impl IntoIterator<Item = &'b Build>,
    reviews_by_build: &HashMap<BuildId, Vec<BuildReview>>,
) -> Result<Vec<Option<BuildReviewStatus>>, ReviewError> {
    builds
        .into_iter()
        .map(|build| {
            if !is_reviewable(build) {
                return Ok(None);
            }
            match reviews_by_build.get(&build.id) {
                Some(reviews) => latest_review_status(&build.id, reviews),
                None => Ok(None),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BucketId, JobStatus, ProjectId, ReviewId};
    use chrono::{DateTime, Duration, Utc};

    fn review(build_id: &BuildId, state: ReviewState, at: DateTime<Utc>) -> BuildReview {
        BuildReview {
            id: ReviewId::generate(),
            build_id: build_id.clone(),
            state,
            created_at: at,
        }
    }

    fn build(conclusion: Option<BuildConclusion>) -> Build {
        let now = Utc::now();
        Build {
            id: BuildId::generate(),
            project_id: ProjectId::generate(),
            number: 1,
            name: "default".to_string(),
            job_status: JobStatus::Complete,
            base_bucket_id: None,
            compare_bucket_id: BucketId::generate(),
            conclusion,
            stats: None,
            concluded_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn most_recent_review_wins() {
        let id = BuildId::generate();
        let t1 = Utc::now();
        let t2 = t1 + Duration::minutes(5);
        let reviews = vec![
            review(&id, ReviewState::Rejected, t2),
            review(&id, ReviewState::Approved, t1),
        ];
        let status = latest_review_status(&id, &reviews).unwrap();
        assert_eq!(status, Some(BuildReviewStatus::Rejected));
    }

    #[test]
    fn ties_break_on_id() {
        let id = BuildId::generate();
        let at = Utc::now();
        let first = review(&id, ReviewState::Rejected, at);
        let mut second = review(&id, ReviewState::Approved, at);
        if second.id < first.id {
            second.state = ReviewState::Rejected;
        }
        let expected = if second.state == ReviewState::Approved {
            BuildReviewStatus::Accepted
        } else {
            BuildReviewStatus::Rejected
        };
        let status = latest_review_status(&id, &[second.clone(), first.clone()]).unwrap();
        assert_eq!(status, Some(expected));
        let status = latest_review_status(&id, &[first, second]).unwrap();
        assert_eq!(status, Some(expected));
    }

    #[test]
    fn no_reviews_is_no_status() {
        let id = BuildId::generate();
        assert_eq!(latest_review_status(&id, &[]).unwrap(), None);
    }

    #[test]
    fn pending_row_is_an_invariant_violation() {
        let id = BuildId::generate();
        let reviews = vec![
            review(&id, ReviewState::Approved, Utc::now()),
            review(&id, ReviewState::Pending, Utc::now()),
        ];
        let err = latest_review_status(&id, &reviews).unwrap_err();
        assert!(matches!(err, ReviewError::PendingReviewInAggregation { .. }));
    }

    #[test]
    fn only_changes_detected_builds_have_review_status() {
        let detected = build(Some(BuildConclusion::ChangesDetected));
        let stable = build(Some(BuildConclusion::NoChanges));
        let unconcluded = build(None);
        let unreviewed = build(Some(BuildConclusion::ChangesDetected));
        let mut lookup = HashMap::new();
        for target in [&detected, &stable, &unconcluded] {
            lookup.insert(
                target.id.clone(),
                vec![review(&target.id, ReviewState::Approved, Utc::now())],
            );
        }

        let statuses =
            review_statuses(&[detected, stable, unconcluded, unreviewed], &lookup).unwrap();
        assert_eq!(
            statuses,
            vec![Some(BuildReviewStatus::Accepted), None, None, None]
        );
    }
}
