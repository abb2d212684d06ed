// src/lib.rs

//! Stageline: a concurrent staged-processing pipeline for Rust.
//!
//! A pipeline is one producer feeding a chain of zero or more transforms and
//! ending in one consumer. Every stage runs as its own tokio task and hands
//! items to the next stage through an unbuffered rendezvous channel, so the
//! chain keeps FIFO order and applies backpressure on its own.
//!
//! Shutdown cascades in both directions:
//!  - A stage that stops cancels its own scope. Scopes are nested from the
//!    consumer towards the producer, so this stops every stage upstream.
//!  - A stage that stops closes its outbound hand-off, so every stage
//!    downstream drains and stops.
//!  - Cancelling the parent token, calling [`Pipeline::cancel`], or hitting the
//!    configured timeout cancels the whole run.
//!
//! [`Pipeline::run`] returns only after every worker has terminated.

pub mod core;
pub mod error;
pub mod pipeline;

// --- Re-exports for the Public API ---

pub use crate::core::control::{RunReport, StageExit, StageReport, StageRole};
pub use crate::core::handoff::{channel as handoff_channel, Delivery, HandoffReceiver, HandoffSender};
pub use crate::core::scope::{CancelHandle, CancellationScope};
pub use crate::core::stage::{Consumer, FnConsumer, FnProducer, FnTransform, Producer, Transform};

pub use crate::pipeline::{Pipeline, PipelineConfig, PipelineConfigBuilder};

pub use crate::error::{HandoffClosed, StagelineError, StagelineResult};

// Callers pass the parent scope of a run as a plain token.
pub use tokio_util::sync::CancellationToken;
