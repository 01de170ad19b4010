//! Aggregation and dashboard assembly.

pub mod aggregator;
pub mod panels;

pub use panels::*;
