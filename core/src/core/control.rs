// stageline/src/core/control.rs

//! Describes how each stage of a run terminated.

use std::fmt;

/// The role a stage plays in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageRole {
  /// Head of the chain; has only an outbound hand-off.
  Producer,
  /// Middle of the chain; has an inbound and an outbound hand-off.
  Transform,
  /// Tail of the chain; has only an inbound hand-off and holds the run scope.
  Consumer,
}

impl fmt::Display for StageRole {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      StageRole::Producer => "producer",
      StageRole::Transform => "transform",
      StageRole::Consumer => "consumer",
    };
    f.write_str(s)
  }
}

/// Why a stage worker stopped. Every worker stops exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageExit {
  /// Its scope was cancelled (externally, by a deadline, or by a downstream stage).
  Cancelled,
  /// The upstream stage finished and closed the inbound hand-off.
  InputClosed,
  /// The downstream stage is gone; the item in hand was dropped.
  OutputClosed,
  /// The stage function returned an error.
  Failed,
  /// The stage function panicked.
  Panicked,
}

/// Termination record of a single worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
  /// Position in the chain, 0 being the producer.
  pub index: usize,
  pub name: String,
  pub role: StageRole,
  pub exit: StageExit,
  /// Items handed downstream (producer, transforms) or consumed (consumer).
  pub processed: u64,
}

/// Outcome of a full pipeline run: one report per worker, producer first.
///
/// Carries no stage error values; a stage that needs to surface diagnostics
/// should do so itself before returning its error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
  pub stages: Vec<StageReport>,
}

impl RunReport {
  /// Number of items the consumer accepted.
  pub fn delivered(&self) -> u64 {
    self
      .stages
      .iter()
      .find(|s| s.role == StageRole::Consumer)
      .map_or(0, |s| s.processed)
  }

  /// Stages that stopped because their function failed or panicked.
  pub fn failed_stages(&self) -> impl Iterator<Item = &StageReport> {
    self
      .stages
      .iter()
      .filter(|s| matches!(s.exit, StageExit::Failed | StageExit::Panicked))
  }

  pub fn stage(&self, name: &str) -> Option<&StageReport> {
    self.stages.iter().find(|s| s.name == name)
  }
}
