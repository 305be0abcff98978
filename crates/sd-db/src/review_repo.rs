use crate::util::{
    MAX_IDS_PER_QUERY, decode_enum, encode_enum, enum_literals, from_rfc3339, now, placeholders,
    to_rfc3339,
};
use rusqlite::{Connection, params_from_iter};
use sd_core::error::ReviewError;
use sd_core::reviews::ReviewRepository;
use sd_core::types::{BuildId, BuildReview, CreateReviewInput, ReviewId, ReviewState};
use std::collections::HashMap;
use std::fmt::Display;

const REVIEW_COLUMNS: &str = "id, build_id, state, created_at";

/// States that count as a decision.
const SUBMITTED_STATES: [ReviewState; 2] = [ReviewState::Approved, ReviewState::Rejected];

pub struct ReviewRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> ReviewRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl<'a> ReviewRepository for ReviewRepo<'a> {
    fn create(&self, input: CreateReviewInput) -> Result<BuildReview, ReviewError> {
        let review = BuildReview {
            id: ReviewId::generate(),
            build_id: input.build_id,
            state: input.state,
            created_at: now(),
        };

        let sql = "INSERT INTO build_reviews (id, build_id, state, created_at) VALUES (?1, ?2, ?3, ?4)";
        let params = (
            review.id.as_str(),
            review.build_id.as_str(),
            encode_enum(&review.state).map_err(storage)?,
            to_rfc3339(&review.created_at),
        );
        self.conn.execute(sql, params).map_err(storage)?;

        Ok(review)
    }

    fn list_for_build(&self, build_id: &BuildId) -> Result<Vec<BuildReview>, ReviewError> {
        let sql = format!(
            "SELECT {REVIEW_COLUMNS} FROM build_reviews WHERE build_id = ?1 ORDER BY created_at, id"
        );
        let mut stmt = self.conn.prepare(&sql).map_err(storage)?;
        let mut rows = stmt.query([build_id.as_str()]).map_err(storage)?;
        let mut reviews = Vec::new();
        while let Some(row) = rows.next().map_err(storage)? {
            reviews.push(map_review_row(row)?);
        }
        Ok(reviews)
    }

    fn submitted_reviews_for_builds(
        &self,
        build_ids: &[BuildId],
    ) -> Result<HashMap<BuildId, Vec<BuildReview>>, ReviewError> {
        let states = enum_literals(&SUBMITTED_STATES).map_err(storage)?;
        let mut reviews: HashMap<BuildId, Vec<BuildReview>> = HashMap::new();
        for chunk in build_ids.chunks(MAX_IDS_PER_QUERY) {
            let sql = format!(
                "SELECT {REVIEW_COLUMNS} FROM build_reviews \
                 WHERE build_id IN ({}) AND state IN ({states}) \
                 ORDER BY build_id, created_at, id",
                placeholders(chunk.len())
            );
            let mut stmt = self.conn.prepare(&sql).map_err(storage)?;
            let mut rows = stmt
                .query(params_from_iter(chunk.iter().map(BuildId::as_str)))
                .map_err(storage)?;
            while let Some(row) = rows.next().map_err(storage)? {
                let review = map_review_row(row)?;
                reviews.entry(review.build_id.clone()).or_default().push(review);
            }
        }
        Ok(reviews)
    }
}

fn storage(err: impl Display) -> ReviewError {
    ReviewError::Storage {
        message: err.to_string(),
    }
}

fn map_review_row(row: &rusqlite::Row<'_>) -> Result<BuildReview, ReviewError> {
    let id: String = row.get(0).map_err(storage)?;
    let build_id: String = row.get(1).map_err(storage)?;
    let state: String = row.get(2).map_err(storage)?;
    let created_at: String = row.get(3).map_err(storage)?;

    Ok(BuildReview {
        id: ReviewId::new(id).map_err(storage)?,
        build_id: BuildId::new(build_id).map_err(storage)?,
        state: decode_enum(&state).map_err(storage)?,
        created_at: from_rfc3339(&created_at).map_err(storage)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::with_test_db;
    use crate::test_support::Fixture;

    fn review(repo: &ReviewRepo<'_>, build_id: &BuildId, state: ReviewState) -> BuildReview {
        repo.create(CreateReviewInput {
            build_id: build_id.clone(),
            state,
        })
        .unwrap()
    }

    #[test]
    fn history_is_kept_in_order() {
        let conn = with_test_db().unwrap();
        let fx = Fixture::new(&conn);
        let build = fx.build();
        let repo = ReviewRepo::new(fx.conn);
        let first = review(&repo, &build.id, ReviewState::Approved);
        let second = review(&repo, &build.id, ReviewState::Rejected);

        let history = repo.list_for_build(&build.id).unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.contains(&first));
        assert!(history.contains(&second));
        assert!(
            (&history[0].created_at, &history[0].id) < (&history[1].created_at, &history[1].id)
        );
    }

    #[test]
    fn pending_rows_are_never_handed_to_aggregation() {
        let conn = with_test_db().unwrap();
        let fx = Fixture::new(&conn);
        let reviewed = fx.build();
        let pending_only = fx.build();
        let repo = ReviewRepo::new(fx.conn);
        review(&repo, &reviewed.id, ReviewState::Pending);
        let approved = review(&repo, &reviewed.id, ReviewState::Approved);
        review(&repo, &pending_only.id, ReviewState::Pending);

        let submitted = repo
            .submitted_reviews_for_builds(&[reviewed.id.clone(), pending_only.id.clone()])
            .unwrap();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[&reviewed.id], vec![approved]);
    }

    #[test]
    fn unknown_state_text_is_a_storage_error() {
        let conn = with_test_db().unwrap();
        let fx = Fixture::new(&conn);
        let build = fx.build();
        conn.execute_batch("PRAGMA ignore_check_constraints = ON").unwrap();
        conn.execute(
            "INSERT INTO build_reviews (id, build_id, state, created_at) VALUES (?1, ?2, 'maybe', ?3)",
            (ReviewId::generate().as_str(), build.id.as_str(), to_rfc3339(&now())),
        )
        .unwrap();
        let err = ReviewRepo::new(&conn).list_for_build(&build.id).unwrap_err();
        assert!(matches!(err, ReviewError::Storage { .. }));
    }
}
