use crate::util::{
    MAX_IDS_PER_QUERY, decode_enum, decode_json, encode_enum, encode_json, from_rfc3339, now,
    placeholders, to_rfc3339,
};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params_from_iter};
use sd_core::builds::BuildRepository;
use sd_core::error::BuildError;
use sd_core::types::{
    BucketId, Build, BuildConclusion, BuildId, BuildStats, CreateBuildInput, JobStatus, ProjectId,
};
use std::collections::HashMap;
use std::fmt::Display;

const BUILD_COLUMNS: &str = "id, project_id, number, name, job_status, base_bucket_id, compare_bucket_id, conclusion, stats, concluded_at, created_at, updated_at";

pub struct BuildRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> BuildRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl<'a> BuildRepository for BuildRepo<'a> {
    fn create(&self, input: CreateBuildInput) -> Result<Build, BuildError> {
        let now = now();
        let id = BuildId::generate();
        let job_status = JobStatus::Pending;

        // The next number is taken in the insert itself, so two concurrent
        // inserts cannot pick the same one.
        let sql = "INSERT INTO builds (id, project_id, number, name, job_status, base_bucket_id, compare_bucket_id, created_at, updated_at) \
                   VALUES (?1, ?2, COALESCE(?3, (SELECT COALESCE(MAX(number), 0) + 1 FROM builds WHERE project_id = ?2)), ?4, ?5, ?6, ?7, ?8, ?8) \
                   RETURNING number";
        let params = (
            id.as_str(),
            input.project_id.as_str(),
            input.number,
            input.name.as_str(),
            encode_enum(&job_status).map_err(storage)?,
            input.base_bucket_id.as_ref().map(BucketId::as_str),
            input.compare_bucket_id.as_str(),
            to_rfc3339(&now),
        );
        let number: i64 = self
            .conn
            .query_row(sql, params, |row| row.get(0))
            .map_err(storage)?;

        Ok(Build {
            id,
            project_id: input.project_id,
            number,
            name: input.name,
            job_status,
            base_bucket_id: input.base_bucket_id,
            compare_bucket_id: input.compare_bucket_id,
            conclusion: None,
            stats: None,
            concluded_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    fn get(&self, id: &BuildId) -> Result<Option<Build>, BuildError> {
        let sql = format!("SELECT {BUILD_COLUMNS} FROM builds WHERE id = ?1");
        let mut stmt = self.conn.prepare(&sql).map_err(storage)?;
        let mut rows = stmt.query([id.as_str()]).map_err(storage)?;
        let Some(row) = rows.next().map_err(storage)? else {
            return Ok(None);
        };
        map_build_row(row).map(Some)
    }

    fn get_many(&self, ids: &[BuildId]) -> Result<Vec<Build>, BuildError> {
        let mut found = HashMap::with_capacity(ids.len());
        for chunk in ids.chunks(MAX_IDS_PER_QUERY) {
            let sql = format!(
                "SELECT {BUILD_COLUMNS} FROM builds WHERE id IN ({})",
                placeholders(chunk.len())
            );
            let mut stmt = self.conn.prepare(&sql).map_err(storage)?;
            let mut rows = stmt
                .query(params_from_iter(chunk.iter().map(BuildId::as_str)))
                .map_err(storage)?;
            while let Some(row) = rows.next().map_err(storage)? {
                let build = map_build_row(row)?;
                found.insert(build.id.clone(), build);
            }
        }
        Ok(ids.iter().filter_map(|id| found.remove(id)).collect())
    }

    fn list_for_project(
        &self,
        project_id: &ProjectId,
        limit: Option<u32>,
    ) -> Result<Vec<Build>, BuildError> {
        let sql = format!(
            "SELECT {BUILD_COLUMNS} FROM builds WHERE project_id = ?1 ORDER BY number DESC LIMIT ?2"
        );
        let limit = limit.map_or(-1, i64::from);
        self.query_builds(&sql, (project_id.as_str(), limit))
    }

    fn list_with_submitted_review(&self, project_id: &ProjectId) -> Result<Vec<Build>, BuildError> {
        let sql = format!(
            "SELECT {BUILD_COLUMNS} FROM builds b WHERE b.project_id = ?1 \
             AND EXISTS (SELECT 1 FROM build_reviews r WHERE r.build_id = b.id AND r.state IN ('approved', 'rejected')) \
             ORDER BY b.number DESC"
        );
        self.query_builds(&sql, [project_id.as_str()])
    }

    fn set_job_status(&self, id: &BuildId, status: JobStatus) -> Result<Build, BuildError> {
        let sql = "UPDATE builds SET job_status = ?1, updated_at = ?2 WHERE id = ?3";
        let params = (
            encode_enum(&status).map_err(storage)?,
            to_rfc3339(&now()),
            id.as_str(),
        );
        let changed = self.conn.execute(sql, params).map_err(storage)?;
        if changed == 0 {
            return Err(BuildError::NotFound);
        }
        self.get(id)?.ok_or(BuildError::NotFound)
    }

    fn store_conclusion(
        &self,
        id: &BuildId,
        conclusion: BuildConclusion,
        stats: &BuildStats,
        concluded_at: DateTime<Utc>,
    ) -> Result<bool, BuildError> {
        let sql = "UPDATE builds SET conclusion = ?1, stats = ?2, concluded_at = ?3, updated_at = ?3 \
                   WHERE id = ?4 AND conclusion IS NULL";
        let params = (
            encode_enum(&conclusion).map_err(storage)?,
            encode_json(stats).map_err(storage)?,
            to_rfc3339(&concluded_at),
            id.as_str(),
        );
        let changed = self.conn.execute(sql, params).map_err(storage)?;
        if changed == 1 {
            return Ok(true);
        }
        let exists: Option<i64> = self
            .conn
            .query_row("SELECT 1 FROM builds WHERE id = ?1", [id.as_str()], |row| {
                row.get(0)
            })
            .optional()
            .map_err(storage)?;
        match exists {
            Some(_) => Ok(false),
            None => Err(BuildError::NotFound),
        }
    }
}

impl<'a> BuildRepo<'a> {
    fn query_builds(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Build>, BuildError> {
        let mut stmt = self.conn.prepare(sql).map_err(storage)?;
        let mut rows = stmt.query(params).map_err(storage)?;
        let mut builds = Vec::new();
        while let Some(row) = rows.next().map_err(storage)? {
            builds.push(map_build_row(row)?);
        }
        Ok(builds)
    }
}

fn storage(err: impl Display) -> BuildError {
    BuildError::Storage {
        message: err.to_string(),
    }
}

fn map_build_row(row: &rusqlite::Row<'_>) -> Result<Build, BuildError> {
    let id: String = row.get(0).map_err(storage)?;
    let project_id: String = row.get(1).map_err(storage)?;
    let number: i64 = row.get(2).map_err(storage)?;
    let name: String = row.get(3).map_err(storage)?;
    let job_status: String = row.get(4).map_err(storage)?;
    let base_bucket_id: Option<String> = row.get(5).map_err(storage)?;
    let compare_bucket_id: String = row.get(6).map_err(storage)?;
    let conclusion: Option<String> = row.get(7).map_err(storage)?;
    let stats: Option<String> = row.get(8).map_err(storage)?;
    let concluded_at: Option<String> = row.get(9).map_err(storage)?;
    let created_at: String = row.get(10).map_err(storage)?;
    let updated_at: String = row.get(11).map_err(storage)?;

    Ok(Build {
        id: BuildId::new(id).map_err(storage)?,
        project_id: ProjectId::new(project_id).map_err(storage)?,
        number,
        name,
        job_status: decode_enum(&job_status).map_err(storage)?,
        base_bucket_id: base_bucket_id
            .map(BucketId::new)
            .transpose()
            .map_err(storage)?,
        compare_bucket_id: BucketId::new(compare_bucket_id).map_err(storage)?,
        conclusion: conclusion
            .map(|value| decode_enum(&value))
            .transpose()
            .map_err(storage)?,
        stats: stats
            .map(|value| decode_json(&value))
            .transpose()
            .map_err(storage)?,
        concluded_at: concluded_at
            .map(|value| from_rfc3339(&value))
            .transpose()
            .map_err(storage)?,
        created_at: from_rfc3339(&created_at).map_err(storage)?,
        updated_at: from_rfc3339(&updated_at).map_err(storage)?,
    })
}
