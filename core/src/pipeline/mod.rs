// stageline/src/pipeline/mod.rs

//! Defines the `Pipeline<T, E>` handle, its configuration, and the run logic.

pub mod definition;
pub mod execution;
pub(crate) mod worker;

pub use definition::{Pipeline, PipelineConfig, PipelineConfigBuilder};
