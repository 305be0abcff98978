use crate::aggregated::aggregate_statuses;
use crate::artifacts::ArtifactRepository;
use crate::build_status::{needs_diff_job_statuses, resolve_build_statuses};
use crate::builds::BuildRepository;
use crate::cache::StatusCache;
use crate::config::EngineConfig;
use crate::conclusion::{compute_conclusions, concludable_build_ids};
use crate::diff_status::{ArtifactLoader, resolve_diff_status};
use crate::diffs::DiffRepository;
use crate::error::{ArtifactError, BuildError, DiffError, EngineError};
use crate::review_status::{is_reviewable, review_statuses};
use crate::reviews::ReviewRepository;
use crate::store::Store;
use crate::types::{
    AggregatedStatus, Artifact, ArtifactBucket, ArtifactId, BucketId, Build, BuildConclusion,
    BuildId, BuildReport, BuildReview, BuildReviewStatus, BuildStats, BuildStatus,
    BuildWithStatus, CreateArtifactInput, CreateBucketInput, CreateBuildInput, CreateDiffInput,
    CreateReviewInput, Diff, DiffId, DiffStatus, DiffWithStatus, JobStatus, ProjectId,
};
use crate::validation::{
    validate_create_build, validate_create_diff, validate_score, validate_submitted_review,
};
use chrono::{DateTime, SubsecRound, Utc};
use std::collections::HashMap;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct RequestContext {
    pub now: DateTime<Utc>,
    pub cache: StatusCache,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: now.trunc_subsecs(6),
            cache: StatusCache::new(),
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Engine<S: Store> {
    store: S,
    config: EngineConfig,
}

impl<S: Store> Engine<S> {
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub fn builds(&self) -> BuildsApi<'_, S> {
        BuildsApi { core: self }
    }

    pub fn diffs(&self) -> DiffsApi<'_, S> {
        DiffsApi { core: self }
    }

    pub fn reviews(&self) -> ReviewsApi<'_, S> {
        ReviewsApi { core: self }
    }

    pub fn artifacts(&self) -> ArtifactsApi<'_, S> {
        ArtifactsApi { core: self }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

pub struct BuildsApi<'a, S: Store> {
    core: &'a Engine<S>,
}

impl<'a, S: Store> BuildsApi<'a, S> {
    pub fn create(&self, input: CreateBuildInput) -> Result<Build, EngineError> {
        validate_create_build(&input)?;
        self.core.store.with_tx(|store| {
            let buckets = store.artifacts();
            let buckets_to_check = input.base_bucket_id.iter().chain([&input.compare_bucket_id]);
            for bucket_id in buckets_to_check {
                let bucket = buckets
                    .get_bucket(bucket_id)?
                    .ok_or(ArtifactError::BucketNotFound)?;
                if bucket.project_id != input.project_id {
                    return Err(BuildError::InvalidInput {
                        message: format!("bucket {bucket_id} belongs to another project"),
                    }
                    .into());
                }
            }
            let build = store.builds().create(input)?;
            debug!(build_id = %build.id, number = build.number, "build created");
            Ok(build)
        })
    }

    pub fn get(&self, id: &BuildId) -> Result<Build, EngineError> {
        let build = self.core.store.builds().get(id)?;
        Ok(build.ok_or(BuildError::NotFound)?)
    }

    /// Builds in the order of `ids`; fails if any of them is missing.
    pub fn get_many(&self, ids: &[BuildId]) -> Result<Vec<Build>, EngineError> {
        let builds = self.core.store.builds().get_many(ids)?;
        if builds.len() != ids.len() {
            return Err(BuildError::NotFound.into());
        }
        Ok(builds)
    }

    pub fn set_job_status(
        &self,
        ctx: &RequestContext,
        id: &BuildId,
        status: JobStatus,
    ) -> Result<Build, EngineError> {
        let build = self.core.store.builds().set_job_status(id, status)?;
        ctx.cache.invalidate(id);
        Ok(build)
    }

    /// Diff job statuses come from one grouped query, for complete unconcluded builds only.
    pub fn get_statuses(
        &self,
        ctx: &RequestContext,
        builds: &[Build],
    ) -> Result<Vec<BuildStatus>, EngineError> {
        let uncached: Vec<&Build> = builds
            .iter()
            .filter(|build| ctx.cache.status(&build.id).is_none())
            .collect();
        let queried: Vec<BuildId> = uncached
            .iter()
            .filter(|build| needs_diff_job_statuses(build))
            .map(|build| build.id.clone())
            .collect();
        let diff_job_statuses = if queried.is_empty() {
            HashMap::new()
        } else {
            self.core.store.diffs().job_statuses_for_builds(&queried)?
        };
        debug!(
            builds = builds.len(),
            uncached = uncached.len(),
            queried = queried.len(),
            "resolving build statuses"
        );

        let resolved = resolve_build_statuses(
            uncached.iter().copied(),
            &diff_job_statuses,
            ctx.now,
            self.core.config.expiration(),
        );
        for (build, status) in uncached.iter().zip(resolved) {
            ctx.cache.store_status(build.id.clone(), status);
        }

        builds
            .iter()
            .map(|build| {
                ctx.cache
                    .status(&build.id)
                    .ok_or_else(|| EngineError::Internal {
                        message: format!("status of build {} was not resolved", build.id),
                    })
            })
            .collect()
    }

    pub fn compute_stats(&self, build_ids: &[BuildId]) -> Result<Vec<BuildStats>, EngineError> {
        if build_ids.is_empty() {
            return Ok(Vec::new());
        }
        let counts = self.core.store.diffs().status_counts_for_builds(build_ids)?;
        Ok(build_ids
            .iter()
            .map(|id| counts.get(id).copied().unwrap_or_default())
            .collect())
    }

    pub fn compute_conclusions(
        &self,
        build_ids: &[BuildId],
        statuses: &[BuildStatus],
    ) -> Result<Vec<Option<BuildConclusion>>, EngineError> {
        let concludable = concludable_build_ids(build_ids, statuses);
        let change_counts = if concludable.is_empty() {
            HashMap::new()
        } else {
            self.core.store.diffs().change_counts_for_builds(&concludable)?
        };
        Ok(compute_conclusions(build_ids, statuses, &change_counts))
    }

    pub fn get_review_statuses(
        &self,
        ctx: &RequestContext,
        builds: &[Build],
    ) -> Result<Vec<Option<BuildReviewStatus>>, EngineError> {
        let uncached: Vec<&Build> = builds
            .iter()
            .filter(|build| ctx.cache.review_status(&build.id).is_none())
            .collect();
        let queried: Vec<BuildId> = uncached
            .iter()
            .filter(|build| is_reviewable(build))
            .map(|build| build.id.clone())
            .collect();
        let reviews = if queried.is_empty() {
            HashMap::new()
        } else {
            self.core.store.reviews().submitted_reviews_for_builds(&queried)?
        };

        let resolved = review_statuses(uncached.iter().copied(), &reviews)?;
        for (build, status) in uncached.iter().zip(resolved) {
            ctx.cache.store_review_status(build.id.clone(), status);
        }

        Ok(builds
            .iter()
            .map(|build| ctx.cache.review_status(&build.id).flatten())
            .collect())
    }

    pub fn get_aggregated_statuses(
        &self,
        ctx: &RequestContext,
        builds: &[Build],
    ) -> Result<Vec<AggregatedStatus>, EngineError> {
        let statuses = self.get_statuses(ctx, builds)?;
        let reviews = self.get_review_statuses(ctx, builds)?;
        let conclusions: Vec<Option<BuildConclusion>> =
            builds.iter().map(|build| build.conclusion).collect();
        Ok(aggregate_statuses(&reviews, &conclusions, &statuses))
    }

    /// Conclusion and stats are written once. A concurrent reader may have
    /// stored them first; its values are identical and are kept.
    pub fn conclude(
        &self,
        ctx: &RequestContext,
        builds: &[Build],
    ) -> Result<Vec<Build>, EngineError> {
        let unconcluded: Vec<Build> = builds
            .iter()
            .filter(|build| build.conclusion.is_none())
            .cloned()
            .collect();
        if unconcluded.is_empty() {
            return Ok(builds.to_vec());
        }

        let ids: Vec<BuildId> = unconcluded.iter().map(|build| build.id.clone()).collect();
        // Write-once values are only derived from freshly resolved statuses.
        for id in &ids {
            ctx.cache.invalidate(id);
        }
        let statuses = self.get_statuses(ctx, &unconcluded)?;
        let conclusions = self.compute_conclusions(&ids, &statuses)?;
        let concluded: Vec<(BuildId, BuildConclusion)> = ids
            .iter()
            .zip(&conclusions)
            .filter_map(|(id, conclusion)| conclusion.map(|conclusion| (id.clone(), conclusion)))
            .collect();
        if concluded.is_empty() {
            return Ok(builds.to_vec());
        }

        let concluded_ids: Vec<BuildId> = concluded.iter().map(|(id, _)| id.clone()).collect();
        let stats = self.compute_stats(&concluded_ids)?;
        self.core.store.with_tx(|store| {
            for ((id, conclusion), stats) in concluded.iter().zip(&stats) {
                let written = store
                    .builds()
                    .store_conclusion(id, *conclusion, stats, ctx.now)?;
                if written {
                    info!(build_id = %id, conclusion = ?conclusion, total = stats.total, "build concluded");
                } else {
                    warn!(build_id = %id, "conclusion already stored, keeping it");
                }
            }
            Ok(())
        })?;
        for id in &concluded_ids {
            ctx.cache.invalidate(id);
        }

        let all_ids: Vec<BuildId> = builds.iter().map(|build| build.id.clone()).collect();
        Ok(self.core.store.builds().get_many(&all_ids)?)
    }

    pub fn list_for_project(
        &self,
        ctx: &RequestContext,
        project_id: &ProjectId,
        limit: Option<u32>,
    ) -> Result<Vec<BuildWithStatus>, EngineError> {
        let builds = self.core.store.builds().list_for_project(project_id, limit)?;
        self.with_statuses(ctx, &builds)
    }

    pub fn list_reviewed(
        &self,
        ctx: &RequestContext,
        project_id: &ProjectId,
    ) -> Result<Vec<BuildWithStatus>, EngineError> {
        let builds = self.core.store.builds().list_with_submitted_review(project_id)?;
        self.with_statuses(ctx, &builds)
    }

    pub fn report(&self, ctx: &RequestContext, id: &BuildId) -> Result<BuildReport, EngineError> {
        let build = self.get(id)?;
        let builds = self.conclude(ctx, std::slice::from_ref(&build))?;
        let build = builds.into_iter().next().ok_or(BuildError::NotFound)?;
        let builds = std::slice::from_ref(&build);

        let status = first(self.get_aggregated_statuses(ctx, builds)?)?;
        let review_status = first(self.get_review_statuses(ctx, builds)?)?;
        let stats = match build.stats {
            Some(stats) => stats,
            None => first(self.compute_stats(std::slice::from_ref(&build.id))?)?,
        };
        let diffs = self.core.store.diffs().list_for_build(&build.id)?;
        Ok(BuildReport {
            build,
            status,
            review_status,
            stats,
            diffs,
        })
    }

    fn with_statuses(
        &self,
        ctx: &RequestContext,
        builds: &[Build],
    ) -> Result<Vec<BuildWithStatus>, EngineError> {
        let builds = self.conclude(ctx, builds)?;
        let statuses = self.get_aggregated_statuses(ctx, &builds)?;
        Ok(builds
            .into_iter()
            .zip(statuses)
            .map(|(build, status)| BuildWithStatus { build, status })
            .collect())
    }
}

fn first<T>(values: Vec<T>) -> Result<T, EngineError> {
    values.into_iter().next().ok_or_else(|| EngineError::Internal {
        message: "batch returned no value for a single build".to_string(),
    })
}

pub struct DiffsApi<'a, S: Store> {
    core: &'a Engine<S>,
}

impl<'a, S: Store> DiffsApi<'a, S> {
    pub fn create(
        &self,
        ctx: &RequestContext,
        input: CreateDiffInput,
    ) -> Result<Diff, EngineError> {
        validate_create_diff(&input)?;
        let diff = self.core.store.with_tx(|store| {
            if store.builds().get(&input.build_id)?.is_none() {
                return Err(BuildError::NotFound.into());
            }
            let artifacts = store.artifacts();
            for artifact_id in input.base_artifact_id.iter().chain(&input.compare_artifact_id) {
                if artifacts.get_artifact(artifact_id)?.is_none() {
                    return Err(ArtifactError::NotFound.into());
                }
            }
            Ok(store.diffs().create(input)?)
        })?;
        ctx.cache.invalidate(&diff.build_id);
        Ok(diff)
    }

    pub fn get(&self, id: &DiffId) -> Result<Diff, EngineError> {
        let diff = self.core.store.diffs().get(id)?;
        Ok(diff.ok_or(DiffError::NotFound)?)
    }

    pub fn list_for_build(&self, build_id: &BuildId) -> Result<Vec<DiffWithStatus>, EngineError> {
        Ok(self.core.store.diffs().list_for_build(build_id)?)
    }

    pub fn set_job_status(
        &self,
        ctx: &RequestContext,
        id: &DiffId,
        status: JobStatus,
    ) -> Result<Diff, EngineError> {
        let diff = self.core.store.diffs().set_job_status(id, status)?;
        ctx.cache.invalidate(&diff.build_id);
        Ok(diff)
    }

    pub fn record_score(&self, id: &DiffId, score: f64) -> Result<Diff, EngineError> {
        validate_score(score)?;
        Ok(self.core.store.diffs().record_score(id, score)?)
    }

    pub fn status(&self, id: &DiffId) -> Result<DiffStatus, EngineError> {
        let diff = self.get(id)?;
        let artifacts = self.core.store.artifacts();
        let loader = |artifact_id: &ArtifactId| -> Result<Artifact, DiffError> {
            let artifact = artifacts
                .get_artifact(artifact_id)
                .map_err(|err| DiffError::Storage {
                    message: err.to_string(),
                })?;
            artifact.ok_or_else(|| DiffError::InvalidInput {
                message: format!("compare artifact {artifact_id} not found"),
            })
        };
        Ok(resolve_diff_status(
            &diff,
            None,
            Some(&loader as &dyn ArtifactLoader),
        )?)
    }
}

pub struct ReviewsApi<'a, S: Store> {
    core: &'a Engine<S>,
}

impl<'a, S: Store> ReviewsApi<'a, S> {
    pub fn submit(
        &self,
        ctx: &RequestContext,
        input: CreateReviewInput,
    ) -> Result<BuildReview, EngineError> {
        validate_submitted_review(input.state)?;
        let review = self.core.store.with_tx(|store| {
            if store.builds().get(&input.build_id)?.is_none() {
                return Err(BuildError::NotFound.into());
            }
            Ok(store.reviews().create(input)?)
        })?;
        ctx.cache.invalidate(&review.build_id);
        debug!(build_id = %review.build_id, state = ?review.state, "review submitted");
        Ok(review)
    }

    pub fn list_for_build(&self, build_id: &BuildId) -> Result<Vec<BuildReview>, EngineError> {
        Ok(self.core.store.reviews().list_for_build(build_id)?)
    }
}

pub struct ArtifactsApi<'a, S: Store> {
    core: &'a Engine<S>,
}

impl<'a, S: Store> ArtifactsApi<'a, S> {
    pub fn create_bucket(&self, input: CreateBucketInput) -> Result<ArtifactBucket, EngineError> {
        Ok(self.core.store.artifacts().create_bucket(input)?)
    }

    pub fn get_bucket(&self, id: &BucketId) -> Result<ArtifactBucket, EngineError> {
        let bucket = self.core.store.artifacts().get_bucket(id)?;
        Ok(bucket.ok_or(ArtifactError::BucketNotFound)?)
    }

    pub fn create_artifact(&self, input: CreateArtifactInput) -> Result<Artifact, EngineError> {
        self.core.store.with_tx(|store| {
            let artifacts = store.artifacts();
            if artifacts.get_bucket(&input.bucket_id)?.is_none() {
                return Err(ArtifactError::BucketNotFound.into());
            }
            Ok(artifacts.create_artifact(input)?)
        })
    }

    pub fn get_artifact(&self, id: &ArtifactId) -> Result<Artifact, EngineError> {
        let artifact = self.core.store.artifacts().get_artifact(id)?;
        Ok(artifact.ok_or(ArtifactError::NotFound)?)
    }
}
