// stageline/src/core/scope.rs

//! Nested cancellation scopes and the shared cancellation slot of a pipeline.
//!
//! Scopes form a tree: cancelling a scope cancels every scope nested under it.
//! The orchestrator nests scopes from the consumer towards the producer, so a
//! stage cancelling its own scope stops everything upstream of it.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};

/// A cancellable scope. Cloning yields another handle to the same scope.
///
/// A scope may carry a deadline. Once it has passed the scope counts as
/// cancelled, whether or not anything has called [`cancel`](Self::cancel) yet.
#[derive(Debug, Clone, Default)]
pub struct CancellationScope {
  token: CancellationToken,
  deadline: Option<Instant>,
}

impl CancellationScope {
  /// A fresh scope with no parent.
  pub fn new() -> Self {
    Self::default()
  }

  /// A scope that is cancelled whenever `parent` is.
  pub fn derived_from(parent: &CancellationToken) -> Self {
    Self {
      token: parent.child_token(),
      deadline: None,
    }
  }

  /// Bounds this scope by `deadline`. An earlier deadline already in place wins.
  pub fn with_deadline(mut self, deadline: Instant) -> Self {
    self.deadline = Some(self.deadline.map_or(deadline, |current| current.min(deadline)));
    self
  }

  /// Derives a scope nested under this one. The nested scope inherits the deadline.
  pub fn nest(&self) -> Self {
    Self {
      token: self.token.child_token(),
      deadline: self.deadline,
    }
  }

  pub fn deadline(&self) -> Option<Instant> {
    self.deadline
  }

  pub fn cancel(&self) {
    self.token.cancel();
  }

  pub fn is_cancelled(&self) -> bool {
    self.token.is_cancelled() || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
  }

  /// Resolves once this scope (or any scope it is nested under) is cancelled,
  /// or its deadline has passed.
  pub async fn cancelled(&self) {
    // Checked up front: a timer registered for a past instant fires on the
    // next driver tick, not on first poll.
    if self.is_cancelled() {
      return;
    }
    match self.deadline {
      None => self.token.cancelled().await,
      Some(deadline) => {
        tokio::select! {
          _ = self.token.cancelled() => {}
          _ = tokio::time::sleep_until(deadline) => {}
        }
      }
    }
  }

  /// Cancels the scope when the returned guard drops, including during unwinding.
  pub fn cancel_on_drop(&self) -> DropGuard {
    self.token.clone().drop_guard()
  }
}

#[derive(Debug, Default)]
struct SlotState {
  requested: bool,
  active: Option<CancellationScope>,
}

/// The single, shared place through which a pipeline is cancelled.
///
/// Lives behind every handle to a pipeline. A cancellation requested before
/// the run scope exists is remembered and applied the moment the scope is
/// installed, so it can never be missed.
#[derive(Debug, Default)]
pub(crate) struct CancelSlot {
  state: Mutex<SlotState>,
}

impl CancelSlot {
  /// Installs the run scope, cancelling it right away if cancellation was
  /// already requested.
  pub(crate) fn install(&self, scope: &CancellationScope) {
    let mut state = self.state.lock();
    if state.requested {
      scope.cancel();
    }
    state.active = Some(scope.clone());
  }

  pub(crate) fn cancel(&self) {
    let mut state = self.state.lock();
    state.requested = true;
    if let Some(scope) = &state.active {
      scope.cancel();
    }
  }

  pub(crate) fn is_requested(&self) -> bool {
    self.state.lock().requested
  }
}

/// A clonable handle that cancels one pipeline.
///
/// Handy for stage code that needs to stop its own pipeline: it does not keep
/// the pipeline (and therefore its stages) alive.
#[derive(Debug, Clone)]
pub struct CancelHandle {
  slot: Arc<CancelSlot>,
}

impl CancelHandle {
  pub(crate) fn new(slot: Arc<CancelSlot>) -> Self {
    Self { slot }
  }

  /// Requests cooperative shutdown. Idempotent and non-blocking.
  pub fn cancel(&self) {
    self.slot.cancel();
  }

  /// True once cancellation was requested through this handle or its
  /// pipeline. Like [`Pipeline::is_cancelled`](crate::Pipeline::is_cancelled),
  /// it does not report other reasons a run stopped.
  pub fn is_cancelled(&self) -> bool {
    self.slot.is_requested()
  }
}
