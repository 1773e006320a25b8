//! Convergence statistics over processed Bayesian-optimization runs.
//!
//! Runs are tabulated at one tolerance level ([`ConvergenceTable`]), then
//! summarized per (setup, strategy) group or regressed against the amount of
//! secondary-source initial data.

pub mod summary;
pub mod table;
pub mod trend;

pub use summary::*;
pub use table::*;
pub use trend::*;
