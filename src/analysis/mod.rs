//! Analysis modules.
//!
//! Aggregate statistics over stored results.

pub mod aggregator;

pub use aggregator::*;
