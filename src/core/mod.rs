//! Core types: jobs, their lifecycle, and the model extension point.

pub mod job;
pub mod model;
pub mod types;
