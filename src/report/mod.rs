//! Output rendering for results, history, batches and statistics.

pub mod generator;

pub use generator::*;
