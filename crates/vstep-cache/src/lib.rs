//! On-disk cache for model artefacts.
//!
//! Artefacts (weights, class maps, environment files) are stored under
//! `{cache_root}/{model_id}/{file}`. Calls without a model id address the
//! cache root itself.

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{ModelCache, TextContent};
pub use config::CacheConfig;
pub use error::{CacheError, CacheResult};
