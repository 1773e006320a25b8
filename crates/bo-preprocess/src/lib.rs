//! # bo-preprocess
//!
//! Turns raw Bayesian-optimization experiment records into analysis-ready
//! ones: model time accounting, initial data cost injection, normalization
//! against the true minimum, convergence detection per tolerance level and
//! task-correlation matrices for multi-task runs.

pub mod convergence;
pub mod correlation;
pub mod offsets;
pub mod pipeline;
pub mod timing;

pub use convergence::{converged_suffix_len, convergence_iteration, convergence_series};
pub use correlation::{coregionalization_matrix, task_correlation};
pub use offsets::subtract_true_minimum;
pub use pipeline::{preprocess, BatchReport, PreprocessConfig, Preprocessor};
pub use timing::{add_init_acq_times, model_time};
