pub mod aggregated;
pub mod artifacts;
pub mod build_status;
pub mod builds;
pub mod cache;
pub mod conclusion;
pub mod config;
pub mod diff_status;
pub mod diffs;
pub mod engine;
pub mod error;
pub mod review_status;
pub mod reviews;
pub mod store;
pub mod validation;

pub mod types;

pub use crate::config::EngineConfig;
pub use crate::engine::{Engine, RequestContext};
pub use crate::error::EngineError;
pub use crate::store::Store;
