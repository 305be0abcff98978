use crate::util::{decode_json, encode_json, from_rfc3339, now, to_rfc3339};
use rusqlite::Connection;
use sd_core::artifacts::ArtifactRepository;
use sd_core::error::ArtifactError;
use sd_core::types::{
    Artifact, ArtifactBucket, ArtifactId, BucketId, CreateArtifactInput, CreateBucketInput,
    ProjectId,
};
use std::fmt::Display;

pub struct ArtifactRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> ArtifactRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl<'a> ArtifactRepository for ArtifactRepo<'a> {
    fn create_bucket(&self, input: CreateBucketInput) -> Result<ArtifactBucket, ArtifactError> {
        let bucket = ArtifactBucket {
            id: BucketId::generate(),
            project_id: input.project_id,
            name: input.name,
            branch: input.branch,
            commit: input.commit,
            complete: input.complete,
            screenshot_count: input.screenshot_count,
            created_at: now(),
        };

        let sql = "INSERT INTO artifact_buckets (id, project_id, name, branch, commit_sha, complete, screenshot_count, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";
        let params = (
            bucket.id.as_str(),
            bucket.project_id.as_str(),
            bucket.name.as_str(),
            bucket.branch.as_str(),
            bucket.commit.as_str(),
            bucket.complete,
            bucket.screenshot_count,
            to_rfc3339(&bucket.created_at),
        );
        self.conn.execute(sql, params).map_err(storage)?;

        Ok(bucket)
    }

    fn get_bucket(&self, id: &BucketId) -> Result<Option<ArtifactBucket>, ArtifactError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, project_id, name, branch, commit_sha, complete, screenshot_count, created_at FROM artifact_buckets WHERE id = ?1")
            .map_err(storage)?;
        let mut rows = stmt.query([id.as_str()]).map_err(storage)?;
        let Some(row) = rows.next().map_err(storage)? else {
            return Ok(None);
        };
        map_bucket_row(row).map(Some)
    }

    fn create_artifact(&self, input: CreateArtifactInput) -> Result<Artifact, ArtifactError> {
        let artifact = Artifact {
            id: ArtifactId::generate(),
            bucket_id: input.bucket_id,
            name: input.name,
            parent_name: input.parent_name,
            metadata: input.metadata,
            created_at: now(),
        };

        let metadata = artifact
            .metadata
            .as_ref()
            .map(encode_json)
            .transpose()
            .map_err(storage)?;
        let sql = "INSERT INTO artifacts (id, bucket_id, name, parent_name, metadata, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)";
        let params = (
            artifact.id.as_str(),
            artifact.bucket_id.as_str(),
            artifact.name.as_str(),
            artifact.parent_name.as_deref(),
            metadata,
            to_rfc3339(&artifact.created_at),
        );
        self.conn.execute(sql, params).map_err(storage)?;

        Ok(artifact)
    }

    fn get_artifact(&self, id: &ArtifactId) -> Result<Option<Artifact>, ArtifactError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, bucket_id, name, parent_name, metadata, created_at FROM artifacts WHERE id = ?1")
            .map_err(storage)?;
        let mut rows = stmt.query([id.as_str()]).map_err(storage)?;
        let Some(row) = rows.next().map_err(storage)? else {
            return Ok(None);
        };
        map_artifact_row(row).map(Some)
    }
}

fn storage(err: impl Display) -> ArtifactError {
    ArtifactError::Storage {
        message: err.to_string(),
    }
}

fn map_bucket_row(row: &rusqlite::Row<'_>) -> Result<ArtifactBucket, ArtifactError> {
    let id: String = row.get(0).map_err(storage)?;
    let project_id: String = row.get(1).map_err(storage)?;
    let created_at: String = row.get(7).map_err(storage)?;
    Ok(ArtifactBucket {
        id: BucketId::new(id).map_err(storage)?,
        project_id: ProjectId::new(project_id).map_err(storage)?,
        name: row.get(2).map_err(storage)?,
        branch: row.get(3).map_err(storage)?,
        commit: row.get(4).map_err(storage)?,
        complete: row.get(5).map_err(storage)?,
        screenshot_count: row.get(6).map_err(storage)?,
        created_at: from_rfc3339(&created_at).map_err(storage)?,
    })
}

fn map_artifact_row(row: &rusqlite::Row<'_>) -> Result<Artifact, ArtifactError> {
    let id: String = row.get(0).map_err(storage)?;
    let bucket_id: String = row.get(1).map_err(storage)?;
    let metadata: Option<String> = row.get(4).map_err(storage)?;
    let created_at: String = row.get(5).map_err(storage)?;
    Ok(Artifact {
        id: ArtifactId::new(id).map_err(storage)?,
        bucket_id: BucketId::new(bucket_id).map_err(storage)?,
        name: row.get(2).map_err(storage)?,
        parent_name: row.get(3).map_err(storage)?,
        metadata: metadata
            .map(|value| decode_json(&value))
            .transpose()
            .map_err(storage)?,
        created_at: from_rfc3339(&created_at).map_err(storage)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::with_test_db;
    use sd_core::types::{ArtifactMetadata, TestMetadata};

    #[test]
    fn artifacts_keep_retry_metadata() {
        let conn = with_test_db().unwrap();
        let repo = ArtifactRepo::new(&conn);
        let bucket = repo
            .create_bucket(CreateBucketInput {
                project_id: ProjectId::generate(),
                name: "default".to_string(),
                branch: "main".to_string(),
                commit: "9b1c0de".to_string(),
                complete: false,
                screenshot_count: 1,
            })
            .unwrap();
        assert_eq!(repo.get_bucket(&bucket.id).unwrap(), Some(bucket.clone()));

        let artifact = repo
            .create_artifact(CreateArtifactInput {
                bucket_id: bucket.id.clone(),
                name: "cart (failed).png".to_string(),
                parent_name: None,
                metadata: Some(ArtifactMetadata {
                    test: Some(TestMetadata {
                        retry: Some(1),
                        retries: Some(3),
                    }),
                }),
            })
            .unwrap();
        let loaded = repo.get_artifact(&artifact.id).unwrap().unwrap();
        assert_eq!(loaded, artifact);
        assert_eq!(loaded.retry(), Some(1));
        assert_eq!(loaded.retries(), Some(3));
        assert_eq!(repo.get_artifact(&ArtifactId::generate()).unwrap(), None);
    }
}
