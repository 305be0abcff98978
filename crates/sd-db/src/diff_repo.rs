use crate::diff_sql::{CHANGE_LABELS_SQL, DIFF_RANK_SQL, DIFF_STATUS_SQL};
use crate::util::{
    MAX_IDS_PER_QUERY, decode_enum, encode_enum, from_rfc3339, now, placeholders, to_rfc3339,
};
use rusqlite::{Connection, params_from_iter};
use sd_core::diffs::DiffRepository;
use sd_core::error::DiffError;
use sd_core::types::{
    ArtifactId, BuildId, BuildStats, CreateDiffInput, Diff, DiffId, DiffStatus, DiffWithStatus,
    JobStatus,
};
use std::collections::HashMap;
use std::fmt::Display;
use tracing::debug;

const DIFF_COLUMNS: &str = "d.id, d.build_id, d.base_artifact_id, d.compare_artifact_id, d.score, d.job_status, d.ignored, d.created_at, d.updated_at";

/// Joins the compare artifact as `ca`. Child captures are left out of counts.
const COUNTED_DIFFS: &str =
    "FROM diffs d LEFT JOIN artifacts ca ON ca.id = d.compare_artifact_id";

pub struct DiffRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> DiffRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl<'a> DiffRepository for DiffRepo<'a> {
    fn create(&self, input: CreateDiffInput) -> Result<Diff, DiffError> {
        let now = now();
        let diff = Diff {
            id: DiffId::generate(),
            build_id: input.build_id,
            base_artifact_id: input.base_artifact_id,
            compare_artifact_id: input.compare_artifact_id,
            score: input.score,
            job_status: input.job_status,
            ignored: input.ignored,
            created_at: now,
            updated_at: now,
        };

        let sql = "INSERT INTO diffs (id, build_id, base_artifact_id, compare_artifact_id, score, job_status, ignored, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)";
        let params = (
            diff.id.as_str(),
            diff.build_id.as_str(),
            diff.base_artifact_id.as_ref().map(ArtifactId::as_str),
            diff.compare_artifact_id.as_ref().map(ArtifactId::as_str),
            diff.score,
            encode_enum(&diff.job_status).map_err(storage)?,
            diff.ignored,
            to_rfc3339(&diff.created_at),
            to_rfc3339(&diff.updated_at),
        );
        self.conn.execute(sql, params).map_err(storage)?;

        Ok(diff)
    }

    fn get(&self, id: &DiffId) -> Result<Option<Diff>, DiffError> {
        let sql = format!("SELECT {DIFF_COLUMNS} FROM diffs d WHERE d.id = ?1");
        let mut stmt = self.conn.prepare(&sql).map_err(storage)?;
        let mut rows = stmt.query([id.as_str()]).map_err(storage)?;
        let Some(row) = rows.next().map_err(storage)? else {
            return Ok(None);
        };
        map_diff_row(row).map(Some)
    }

    fn list_for_build(&self, build_id: &BuildId) -> Result<Vec<DiffWithStatus>, DiffError> {
        let sql = format!(
            "SELECT {DIFF_COLUMNS}, {status} AS status, COALESCE(ca.name, ba.name) AS artifact_name \
             FROM diffs d \
             LEFT JOIN artifacts ca ON ca.id = d.compare_artifact_id \
             LEFT JOIN artifacts ba ON ba.id = d.base_artifact_id \
             WHERE d.build_id = ?1 \
             ORDER BY {rank}, artifact_name, d.id",
            status = DIFF_STATUS_SQL.as_str(),
            rank = DIFF_RANK_SQL.as_str(),
        );
        let mut stmt = self.conn.prepare(&sql).map_err(storage)?;
        let mut rows = stmt.query([build_id.as_str()]).map_err(storage)?;
        let mut diffs = Vec::new();
        while let Some(row) = rows.next().map_err(storage)? {
            let diff = map_diff_row(row)?;
            let status: String = row.get(9).map_err(storage)?;
            let name: Option<String> = row.get(10).map_err(storage)?;
            diffs.push(DiffWithStatus {
                diff,
                status: decode_enum(&status).map_err(storage)?,
                name,
            });
        }
        Ok(diffs)
    }

    fn set_job_status(&self, id: &DiffId, status: JobStatus) -> Result<Diff, DiffError> {
        let sql = "UPDATE diffs SET job_status = ?1, updated_at = ?2 WHERE id = ?3";
        let params = (
            encode_enum(&status).map_err(storage)?,
            to_rfc3339(&now()),
            id.as_str(),
        );
        let changed = self.conn.execute(sql, params).map_err(storage)?;
        if changed == 0 {
            return Err(DiffError::NotFound);
        }
        self.get(id)?.ok_or(DiffError::NotFound)
    }

    fn record_score(&self, id: &DiffId, score: f64) -> Result<Diff, DiffError> {
        let sql = "UPDATE diffs SET score = ?1, updated_at = ?2 WHERE id = ?3 AND score IS NULL";
        let changed = self
            .conn
            .execute(sql, (score, to_rfc3339(&now()), id.as_str()))
            .map_err(storage)?;
        let diff = self.get(id)?.ok_or(DiffError::NotFound)?;
        if changed == 0 {
            return Err(DiffError::AlreadyScored);
        }
        Ok(diff)
    }

    fn job_statuses_for_builds(
        &self,
        build_ids: &[BuildId],
    ) -> Result<HashMap<BuildId, Vec<JobStatus>>, DiffError> {
        let mut statuses: HashMap<BuildId, Vec<JobStatus>> = HashMap::new();
        self.for_each_grouped(
            build_ids,
            |list| {
                format!(
                    "SELECT d.build_id, d.job_status FROM diffs d \
                     WHERE d.build_id IN ({list}) GROUP BY d.build_id, d.job_status"
                )
            },
            |build_id, row| {
                let status: String = row.get(1).map_err(storage)?;
                statuses
                    .entry(build_id)
                    .or_default()
                    .push(decode_enum(&status).map_err(storage)?);
                Ok(())
            },
        )?;
        debug!(builds = build_ids.len(), with_diffs = statuses.len(), "diff job statuses");
        Ok(statuses)
    }

    fn status_counts_for_builds(
        &self,
        build_ids: &[BuildId],
    ) -> Result<HashMap<BuildId, BuildStats>, DiffError> {
        let mut stats: HashMap<BuildId, BuildStats> = HashMap::new();
        self.for_each_grouped(
            build_ids,
            |list| {
                format!(
                    "SELECT d.build_id, {status} AS status, COUNT(*) {COUNTED_DIFFS} \
                     WHERE d.build_id IN ({list}) AND ca.parent_name IS NULL \
                     GROUP BY d.build_id, status",
                    status = DIFF_STATUS_SQL.as_str(),
                )
            },
            |build_id, row| {
                let status: String = row.get(1).map_err(storage)?;
                let status: DiffStatus = decode_enum(&status).map_err(storage)?;
                let count: u32 = row.get(2).map_err(storage)?;
                stats.entry(build_id).or_default().record(status, count);
                Ok(())
            },
        )?;
        debug!(builds = build_ids.len(), "diff status counts");
        Ok(stats)
    }

    fn change_counts_for_builds(
        &self,
        build_ids: &[BuildId],
    ) -> Result<HashMap<BuildId, u32>, DiffError> {
        let mut counts = HashMap::new();
        self.for_each_grouped(
            build_ids,
            |list| {
                format!(
                    "SELECT d.build_id, COUNT(*) {COUNTED_DIFFS} \
                     WHERE d.build_id IN ({list}) AND ca.parent_name IS NULL \
                     AND ({status}) IN ({changes}) \
                     GROUP BY d.build_id",
                    status = DIFF_STATUS_SQL.as_str(),
                    changes = CHANGE_LABELS_SQL.as_str(),
                )
            },
            |build_id, row| {
                let count: u32 = row.get(1).map_err(storage)?;
                counts.insert(build_id, count);
                Ok(())
            },
        )?;
        debug!(builds = build_ids.len(), "diff change counts");
        Ok(counts)
    }
}

impl<'a> DiffRepo<'a> {
    /// Runs a query grouped by build over `build_ids`, one statement per chunk.
    /// The first column of every row is the build id.
    fn for_each_grouped(
        &self,
        build_ids: &[BuildId],
        sql: impl Fn(&str) -> String,
        mut each: impl FnMut(BuildId, &rusqlite::Row<'_>) -> Result<(), DiffError>,
    ) -> Result<(), DiffError> {
        for chunk in build_ids.chunks(MAX_IDS_PER_QUERY) {
            let sql = sql(&placeholders(chunk.len()));
            let mut stmt = self.conn.prepare(&sql).map_err(storage)?;
            let mut rows = stmt
                .query(params_from_iter(chunk.iter().map(BuildId::as_str)))
                .map_err(storage)?;
            while let Some(row) = rows.next().map_err(storage)? {
                let build_id: String = row.get(0).map_err(storage)?;
                each(BuildId::new(build_id).map_err(storage)?, row)?;
            }
        }
        Ok(())
    }
}

fn storage(err: impl Display) -> DiffError {
    DiffError::Storage {
        message: err.to_string(),
    }
}

fn map_diff_row(row: &rusqlite::Row<'_>) -> Result<Diff, DiffError> {
    let id: String = row.get(0).map_err(storage)?;
    let build_id: String = row.get(1).map_err(storage)?;
    let base_artifact_id: Option<String> = row.get(2).map_err(storage)?;
    let compare_artifact_id: Option<String> = row.get(3).map_err(storage)?;
    let score: Option<f64> = row.get(4).map_err(storage)?;
    let job_status: String = row.get(5).map_err(storage)?;
    let ignored: bool = row.get(6).map_err(storage)?;
    let created_at: String = row.get(7).map_err(storage)?;
    let updated_at: String = row.get(8).map_err(storage)?;

    Ok(Diff {
        id: DiffId::new(id).map_err(storage)?,
        build_id: BuildId::new(build_id).map_err(storage)?,
        base_artifact_id: base_artifact_id
            .map(ArtifactId::new)
            .transpose()
            .map_err(storage)?,
        compare_artifact_id: compare_artifact_id
            .map(ArtifactId::new)
            .transpose()
            .map_err(storage)?,
        score,
        job_status: decode_enum(&job_status).map_err(storage)?,
        ignored,
        created_at: from_rfc3339(&created_at).map_err(storage)?,
        updated_at: from_rfc3339(&updated_at).map_err(storage)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::with_test_db;
    use crate::test_support::Fixture;
    use sd_core::diff_status::resolve_diff_status;
    use sd_core::types::{ArtifactMetadata, TestMetadata};

    #[test]
    fn scores_are_recorded_once() {
        let conn = with_test_db().unwrap();
        let fx = Fixture::new(&conn);
        let build = fx.build();
        let diff = fx.diff(&build.id, Some("home.png"), Some("home.png"), None, JobStatus::Progress);
        let repo = DiffRepo::new(fx.conn);

        let scored = repo.record_score(&diff.id, 0.25).unwrap();
        assert_eq!(scored.score, Some(0.25));
        let err = repo.record_score(&diff.id, 0.0).unwrap_err();
        assert!(matches!(err, DiffError::AlreadyScored));
        let err = repo.record_score(&DiffId::generate(), 0.0).unwrap_err();
        assert!(matches!(err, DiffError::NotFound));
    }

    #[test]
    fn out_of_range_score_is_refused_by_the_schema() {
        let conn = with_test_db().unwrap();
        let fx = Fixture::new(&conn);
        let build = fx.build();
        let diff = fx.diff(&build.id, Some("a.png"), Some("a.png"), None, JobStatus::Pending);
        let err = DiffRepo::new(fx.conn).record_score(&diff.id, 1.5).unwrap_err();
        assert!(matches!(err, DiffError::Storage { .. }));
    }

    #[test]
    fn job_statuses_are_grouped_per_build() {
        let conn = with_test_db().unwrap();
        let fx = Fixture::new(&conn);
        let first = fx.build();
        let second = fx.build();
        let empty = fx.build();
        fx.diff(&first.id, Some("a.png"), Some("a.png"), Some(0.0), JobStatus::Complete);
        fx.diff(&first.id, Some("b.png"), Some("b.png"), Some(0.0), JobStatus::Complete);
        fx.diff(&first.id, Some("c.png"), Some("c.png"), None, JobStatus::Error);
        fx.diff(&second.id, Some("a.png"), Some("a.png"), None, JobStatus::Pending);

        let statuses = DiffRepo::new(fx.conn)
            .job_statuses_for_builds(&[first.id.clone(), second.id.clone(), empty.id.clone()])
            .unwrap();
        let mut first_statuses = statuses[&first.id].clone();
        first_statuses.sort_by_key(|status| status.as_str());
        assert_eq!(first_statuses, vec![JobStatus::Complete, JobStatus::Error]);
        assert_eq!(statuses[&second.id], vec![JobStatus::Pending]);
        assert!(!statuses.contains_key(&empty.id));
    }

    #[test]
    fn counts_skip_child_captures() {
        let conn = with_test_db().unwrap();
        let fx = Fixture::new(&conn);
        let build = fx.build();
        fx.diff(&build.id, Some("a.png"), Some("a.png"), Some(0.4), JobStatus::Complete);
        fx.diff(&build.id, None, Some("new.png"), None, JobStatus::Complete);
        fx.diff(&build.id, Some("gone.png"), None, None, JobStatus::Complete);
        fx.diff(&build.id, Some("same.png"), Some("same.png"), Some(0.0), JobStatus::Complete);
        fx.diff(&build.id, Some("wait.png"), Some("wait.png"), None, JobStatus::Pending);
        let child = fx.artifact_in(&fx.compare_bucket, "a.png [child]", Some("a.png"), None);
        let base = fx.artifact_in(&fx.base_bucket, "a.png [child]", None, None);
        fx.diff_between(&build.id, Some(&base.id), Some(&child.id), Some(0.9), false);

        let repo = DiffRepo::new(fx.conn);
        let stats = repo.status_counts_for_builds(&[build.id.clone()]).unwrap();
        let stats = stats[&build.id];
        assert_eq!(stats.total, 5);
        assert_eq!(stats.changed, 1);
        assert_eq!(stats.added, 1);
        assert_eq!(stats.removed, 1);
        assert_eq!(stats.unchanged, 1);

        let changes = repo.change_counts_for_builds(&[build.id.clone()]).unwrap();
        assert_eq!(changes[&build.id], 3);
    }

    #[test]
    fn listing_follows_display_priority() {
        let conn = with_test_db().unwrap();
        let fx = Fixture::new(&conn);
        let build = fx.build();
        fx.diff(&build.id, Some("z.png"), Some("z.png"), Some(0.0), JobStatus::Complete);
        fx.diff(&build.id, Some("gone.png"), None, None, JobStatus::Complete);
        fx.diff(&build.id, None, Some("b-new.png"), None, JobStatus::Complete);
        fx.diff(&build.id, None, Some("a-new.png"), None, JobStatus::Complete);
        fx.diff(&build.id, Some("c.png"), Some("c.png"), Some(0.3), JobStatus::Complete);
        let failed = fx.artifact_in(
            &fx.compare_bucket,
            "checkout (failed).png",
            None,
            Some(ArtifactMetadata {
                test: Some(TestMetadata {
                    retry: Some(2),
                    retries: Some(2),
                }),
            }),
        );
        fx.diff_between(&build.id, None, Some(&failed.id), None, false);

        let listed = DiffRepo::new(fx.conn).list_for_build(&build.id).unwrap();
        let labels: Vec<(DiffStatus, Option<&str>)> = listed
            .iter()
            .map(|item| (item.status, item.name.as_deref()))
            .collect();
        assert_eq!(
            labels,
            vec![
                (DiffStatus::Failure, Some("checkout (failed).png")),
                (DiffStatus::Changed, Some("c.png")),
                (DiffStatus::Added, Some("a-new.png")),
                (DiffStatus::Added, Some("b-new.png")),
                (DiffStatus::Removed, Some("gone.png")),
                (DiffStatus::Unchanged, Some("z.png")),
            ]
        );
    }

    #[test]
    fn stored_labels_match_pure_resolution() {
        let conn = with_test_db().unwrap();
        let fx = Fixture::new(&conn);
        let build = fx.build();
        let names = ["one.png", "two (failed).png"];
        let scores = [None, Some(0.0), Some(0.7)];
        let attempts = [None, Some(0), Some(1)];
        for (index, name) in names.iter().enumerate() {
            for retry in attempts {
                for retries in attempts {
                    let metadata = Some(ArtifactMetadata {
                        test: Some(TestMetadata { retry, retries }),
                    });
                    let label = format!("{index}-{retry:?}-{retries:?}-{name}");
                    let compare = fx.artifact_in(&fx.compare_bucket, &label, None, metadata);
                    fx.diff_between(&build.id, None, Some(&compare.id), None, false);
                }
            }
        }
        for score in scores {
            for ignored in [false, true] {
                let base = fx.artifact_in(&fx.base_bucket, "pair.png", None, None);
                let compare = fx.artifact_in(&fx.compare_bucket, "pair.png", None, None);
                fx.diff_between(&build.id, Some(&base.id), Some(&compare.id), score, ignored);
            }
        }
        fx.diff(&build.id, Some("gone.png"), None, None, JobStatus::Complete);

        let artifacts = crate::artifact_repo::ArtifactRepo::new(fx.conn);
        let loader = |id: &ArtifactId| -> Result<sd_core::types::Artifact, DiffError> {
            use sd_core::artifacts::ArtifactRepository;
            artifacts
                .get_artifact(id)
                .map_err(|err| DiffError::Storage {
                    message: err.to_string(),
                })?
                .ok_or(DiffError::NotFound)
        };
        let listed = DiffRepo::new(fx.conn).list_for_build(&build.id).unwrap();
        assert_eq!(listed.len(), 2 * 3 * 3 + 3 * 2 + 1);
        let mut stats = BuildStats::default();
        for item in &listed {
            let expected = resolve_diff_status(
                &item.diff,
                None,
                Some(&loader as &dyn sd_core::diff_status::ArtifactLoader),
            )
            .unwrap();
            assert_eq!(item.status, expected, "{:?}", item.name);
            stats.record(expected, 1);
        }
        let counted = DiffRepo::new(fx.conn)
            .status_counts_for_builds(&[build.id.clone()])
            .unwrap();
        assert_eq!(counted[&build.id], stats);
    }
}
