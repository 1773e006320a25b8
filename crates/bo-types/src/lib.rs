//! # bo-types
//!
//! Core record types, experiment tags and the error hierarchy shared by the
//! BO-Analysis crates.

pub mod derived;
pub mod errors;
pub mod record;
pub mod tags;

pub use derived::*;
pub use errors::*;
pub use record::*;
pub use tags::*;
