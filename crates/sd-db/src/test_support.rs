use crate::artifact_repo::ArtifactRepo;
use crate::build_repo::BuildRepo;
use crate::diff_repo::DiffRepo;
use crate::util::to_rfc3339;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use sd_core::artifacts::ArtifactRepository;
use sd_core::builds::BuildRepository;
use sd_core::diffs::DiffRepository;
use sd_core::types::{
    Artifact, ArtifactId, ArtifactMetadata, BucketId, Build, BuildId, CreateArtifactInput,
    CreateBucketInput, CreateBuildInput, CreateDiffInput, Diff, JobStatus, ProjectId, ReviewId,
    ReviewState,
};

/// One project with a base and a compare bucket, written straight through the
/// repositories.
pub struct Fixture<'a> {
    pub conn: &'a Connection,
    pub project_id: ProjectId,
    pub base_bucket: BucketId,
    pub compare_bucket: BucketId,
}

impl<'a> Fixture<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        let project_id = ProjectId::generate();
        let bucket = |name: &str| {
            ArtifactRepo::new(conn)
                .create_bucket(CreateBucketInput {
                    project_id: project_id.clone(),
                    name: name.to_string(),
                    branch: "main".to_string(),
                    commit: "0c1d2e3".to_string(),
                    complete: true,
                    screenshot_count: 0,
                })
                .unwrap()
                .id
        };
        let base_bucket = bucket("base");
        let compare_bucket = bucket("compare");
        Self {
            conn,
            project_id,
            base_bucket,
            compare_bucket,
        }
    }

    pub fn build(&self) -> Build {
        BuildRepo::new(self.conn)
            .create(CreateBuildInput {
                project_id: self.project_id.clone(),
                name: "default".to_string(),
                base_bucket_id: Some(self.base_bucket.clone()),
                compare_bucket_id: self.compare_bucket.clone(),
                number: None,
            })
            .unwrap()
    }

    /// A build whose own job finished.
    pub fn complete_build(&self) -> Build {
        let build = self.build();
        BuildRepo::new(self.conn)
            .set_job_status(&build.id, JobStatus::Complete)
            .unwrap()
    }

    pub fn artifact_in(
        &self,
        bucket_id: &BucketId,
        name: &str,
        parent_name: Option<&str>,
        metadata: Option<ArtifactMetadata>,
    ) -> Artifact {
        ArtifactRepo::new(self.conn)
            .create_artifact(CreateArtifactInput {
                bucket_id: bucket_id.clone(),
                name: name.to_string(),
                parent_name: parent_name.map(str::to_string),
                metadata,
            })
            .unwrap()
    }

    /// A diff between fresh artifacts with the given names.
    pub fn diff(
        &self,
        build_id: &BuildId,
        base_name: Option<&str>,
        compare_name: Option<&str>,
        score: Option<f64>,
        job_status: JobStatus,
    ) -> Diff {
        let base = base_name.map(|name| self.artifact_in(&self.base_bucket, name, None, None).id);
        let compare = compare_name
            .map(|name| self.artifact_in(&self.compare_bucket, name, None, None).id);
        self.insert_diff(build_id, base, compare, score, false, job_status)
    }

    pub fn diff_between(
        &self,
        build_id: &BuildId,
        base: Option<&ArtifactId>,
        compare: Option<&ArtifactId>,
        score: Option<f64>,
        ignored: bool,
    ) -> Diff {
        self.insert_diff(
            build_id,
            base.cloned(),
            compare.cloned(),
            score,
            ignored,
            JobStatus::Complete,
        )
    }

    /// A review row with a chosen timestamp, bypassing submission checks.
    pub fn review_at(&self, build_id: &BuildId, state: ReviewState, at: DateTime<Utc>) {
        let state = crate::util::encode_enum(&state).unwrap();
        self.conn
            .execute(
                "INSERT INTO build_reviews (id, build_id, state, created_at) VALUES (?1, ?2, ?3, ?4)",
                (
                    ReviewId::generate().as_str(),
                    build_id.as_str(),
                    state,
                    to_rfc3339(&at),
                ),
            )
            .unwrap();
    }

    /// Moves a build's creation time, to exercise expiration.
    pub fn age_build(&self, build_id: &BuildId, created_at: DateTime<Utc>) {
        self.conn
            .execute(
                "UPDATE builds SET created_at = ?1 WHERE id = ?2",
                (to_rfc3339(&created_at), build_id.as_str()),
            )
            .unwrap();
    }

    fn insert_diff(
        &self,
        build_id: &BuildId,
        base: Option<ArtifactId>,
        compare: Option<ArtifactId>,
        score: Option<f64>,
        ignored: bool,
        job_status: JobStatus,
    ) -> Diff {
        DiffRepo::new(self.conn)
            .create(CreateDiffInput {
                build_id: build_id.clone(),
                base_artifact_id: base,
                compare_artifact_id: compare,
                score,
                job_status,
                ignored,
            })
            .unwrap()
    }
}
