//! Core types for interactive seismic event review.
//!
//! - [`station`]: read-only station metadata and trace statistics
//! - [`pick`]: per-phase pick annotations and amplitude brackets
//! - [`store`]: the per-station pick records of one review session
//! - [`solution`]: event-level location and magnitude results

pub mod error;
pub mod pick;
pub mod solution;
pub mod station;
pub mod store;

pub use error::{CoreError, Result};

#[cfg(any(test, feature = "testing"))]
pub mod testing;
