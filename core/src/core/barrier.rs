// stageline/src/core/barrier.rs

//! Join point for the workers of one run.
//!
//! Each spawned worker counts as one pending slot; a worker task finishing,
//! normally or by panic, releases exactly one slot. `wait` resolves once no
//! slot is pending.

use crate::core::control::{StageExit, StageReport, StageRole};
use std::future::Future;
use tokio::task::JoinSet;
use tracing::{event, Level};

#[derive(Debug, Clone)]
struct StageMeta {
  index: usize,
  name: String,
  role: StageRole,
}

pub(crate) struct CompletionBarrier {
  workers: JoinSet<StageReport>,
  roster: Vec<StageMeta>,
  expected: usize,
}

impl CompletionBarrier {
  pub(crate) fn new(expected: usize) -> Self {
    Self {
      workers: JoinSet::new(),
      roster: Vec::with_capacity(expected),
      expected,
    }
  }

  /// Spawns a worker that will report as stage `index`.
  pub(crate) fn spawn<F>(&mut self, index: usize, name: &str, role: StageRole, worker: F)
  where
    F: Future<Output = StageReport> + Send + 'static,
  {
    debug_assert!(self.roster.len() < self.expected, "more workers spawned than expected");
    self.roster.push(StageMeta {
      index,
      name: name.to_string(),
      role,
    });
    self.workers.spawn(worker);
  }

  /// Workers spawned and not yet finished.
  pub(crate) fn pending(&self) -> usize {
    self.workers.len()
  }

  /// Waits for every worker and returns their reports ordered by stage index.
  ///
  /// A worker that panicked produced no report; it is recorded as
  /// [`StageExit::Panicked`] with nothing processed.
  pub(crate) async fn wait(mut self) -> Vec<StageReport> {
    let mut reports: Vec<StageReport> = Vec::with_capacity(self.roster.len());

    while let Some(joined) = self.workers.join_next().await {
      match joined {
        Ok(report) => reports.push(report),
        Err(join_err) => {
          event!(Level::ERROR, error = %join_err, "Stage worker did not finish cleanly.");
        }
      }
      event!(Level::TRACE, pending = self.workers.len(), "Stage worker released the barrier.");
    }

    for meta in &self.roster {
      if !reports.iter().any(|r| r.index == meta.index) {
        reports.push(StageReport {
          index: meta.index,
          name: meta.name.clone(),
          role: meta.role,
          exit: StageExit::Panicked,
          processed: 0,
        });
      }
    }

    reports.sort_by_key(|r| r.index);
    reports
  }
}
