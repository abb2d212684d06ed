// stageline/src/error.rs
use thiserror::Error;

/// Errors raised by the framework itself.
///
/// Failures inside user stages are never reported through this type: a failing
/// stage stops, the stop cascades, and the failure is only visible in the logs
/// and as [`StageExit::Failed`](crate::StageExit::Failed) in the run report.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StagelineError {
  #[error("Pipeline configuration has no producer stage")]
  MissingProducer,

  #[error("Pipeline configuration has no consumer stage")]
  MissingConsumer,

  #[error("Stage name used more than once: {stage_name}")]
  DuplicateStageName { stage_name: String },

  #[error("Pipeline has already been run; a pipeline instance runs at most once")]
  AlreadyRan,
}

/// Returned by [`HandoffSender::send`](crate::HandoffSender::send) when the
/// receiving side is gone. The value that could not be delivered is dropped.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Hand-off channel closed by the receiving stage")]
pub struct HandoffClosed;

pub type StagelineResult<T, E = StagelineError> = std::result::Result<T, E>;
