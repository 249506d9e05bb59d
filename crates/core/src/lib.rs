#![forbid(unsafe_code)]
#![deny(unreachable_pub)]

//! Shared data model and wire helpers for the `metrod` agent/server pair.

pub mod compress;
pub mod model;
pub mod sign;

pub use model::{MetricId, MetricKind, MetricSample, SampleError};
