pub mod artifact_repo;
pub mod build_repo;
pub mod diff_repo;
pub mod diff_sql;
pub mod review_repo;
pub mod schema;
pub mod store;
pub mod util;

#[cfg(test)]
mod test_support;

pub use crate::store::DbStore;
