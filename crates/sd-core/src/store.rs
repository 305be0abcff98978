use crate::EngineError;
use crate::artifacts::ArtifactRepository;
use crate::builds::BuildRepository;
use crate::diffs::DiffRepository;
use crate::reviews::ReviewRepository;

pub trait Store {
    type Builds<'a>: BuildRepository
    where
        Self: 'a;
    type Diffs<'a>: DiffRepository
    where
        Self: 'a;
    type Reviews<'a>: ReviewRepository
    where
        Self: 'a;
    type Artifacts<'a>: ArtifactRepository
    where
        Self: 'a;

    fn builds(&self) -> Self::Builds<'_>;
    fn diffs(&self) -> Self::Diffs<'_>;
    fn reviews(&self) -> Self::Reviews<'_>;
    fn artifacts(&self) -> Self::Artifacts<'_>;

    fn with_tx<F, T>(&self, f: F) -> Result<T, EngineError>
    where
        F: FnOnce(&Self) -> Result<T, EngineError>;
}
