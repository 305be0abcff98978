use rusqlite::Connection;
use sd_core::error::EngineError;
use sd_core::store::Store;

use crate::artifact_repo::ArtifactRepo;
use crate::build_repo::BuildRepo;
use crate::diff_repo::DiffRepo;
use crate::review_repo::ReviewRepo;

pub struct DbStore {
    conn: Connection,
}

impl DbStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Store for DbStore {
    type Builds<'a>
        = BuildRepo<'a>
    where
        Self: 'a;
    type Diffs<'a>
        = DiffRepo<'a>
    where
        Self: 'a;
    type Reviews<'a>
        = ReviewRepo<'a>
    where
        Self: 'a;
    type Artifacts<'a>
        = ArtifactRepo<'a>
    where
        Self: 'a;

    fn builds(&self) -> Self::Builds<'_> {
        BuildRepo::new(&self.conn)
    }

    fn diffs(&self) -> Self::Diffs<'_> {
        DiffRepo::new(&self.conn)
    }

    fn reviews(&self) -> Self::Reviews<'_> {
        ReviewRepo::new(&self.conn)
    }

    fn artifacts(&self) -> Self::Artifacts<'_> {
        ArtifactRepo::new(&self.conn)
    }

    fn with_tx<F, T>(&self, f: F) -> Result<T, EngineError>
    where
        F: FnOnce(&Self) -> Result<T, EngineError>,
    {
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(|err| EngineError::Internal {
                message: err.to_string(),
            })?;
        let result = f(self);
        match result {
            Ok(value) => {
                self.conn
                    .execute_batch("COMMIT")
                    .map_err(|err| EngineError::Internal {
                        message: err.to_string(),
                    })?;
                Ok(value)
            }
            Err(err) => {
                self.conn
                    .execute_batch("ROLLBACK")
                    .map_err(|rollback_err| EngineError::Internal {
                        message: rollback_err.to_string(),
                    })?;
                Err(err)
            }
        }
    }
}
