//! # bo-data
//!
//! Loading of experiment results files, storage of processed records and the
//! analysis configuration that ties experiments to their baselines.

pub mod config;
pub mod loaders;
pub mod schema;
pub mod storage;

pub use config::*;
pub use loaders::*;
pub use schema::*;
pub use storage::*;
