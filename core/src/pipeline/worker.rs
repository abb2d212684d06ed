// stageline/src/pipeline/worker.rs

//! The execution loop shared by all three stage roles.
//!
//! A worker repeats one step (acquire input, invoke the stage, hand the result
//! on) until something stops it. What differs between roles is only which
//! hand-off ends exist and whether the worker cancels its scope on exit:
//!
//! | role      | inbound | outbound | cancels own scope on exit |
//! |-----------|---------|----------|---------------------------|
//! | producer  | -       | yes      | no (nothing upstream)     |
//! | transform | yes     | yes      | yes                       |
//! | consumer  | yes     | -        | yes (the run scope)       |
//!
//! Cancellation is only observed between calls into stage code; a running
//! `produce`/`transform`/`consume` call always completes.

use crate::core::barrier::CompletionBarrier;
use crate::core::control::{StageExit, StageReport, StageRole};
use crate::core::handoff::{HandoffReceiver, HandoffSender};
use crate::core::scope::CancellationScope;
use crate::core::stage::{Consumer, Producer, Transform};
use std::fmt::Display;
use tracing::{event, instrument, Level};

pub(crate) enum Role<T, E> {
  Producer {
    stage: Box<dyn Producer<T, E>>,
    outbound: HandoffSender<T>,
  },
  Transform {
    stage: Box<dyn Transform<T, E>>,
    inbound: HandoffReceiver<T>,
    outbound: HandoffSender<T>,
  },
  Consumer {
    stage: Box<dyn Consumer<T, E>>,
    inbound: HandoffReceiver<T>,
  },
}

impl<T, E> Role<T, E>
where
  T: Send + 'static,
  E: Display + Send + 'static,
{
  pub(crate) fn kind(&self) -> StageRole {
    match self {
      Role::Producer { .. } => StageRole::Producer,
      Role::Transform { .. } => StageRole::Transform,
      Role::Consumer { .. } => StageRole::Consumer,
    }
  }

  /// Runs one iteration. `Err` carries the reason the worker must stop.
  async fn step(&mut self, scope: &CancellationScope) -> Result<(), StageExit> {
    match self {
      Role::Producer { stage, outbound } => {
        if scope.is_cancelled() {
          return Err(StageExit::Cancelled);
        }
        let item = stage.produce().await.map_err(stage_failed)?;
        forward(scope, outbound, item).await
      }
      Role::Transform { stage, inbound, outbound } => {
        let item = receive(scope, inbound).await?;
        let item = stage.transform(item).await.map_err(stage_failed)?;
        forward(scope, outbound, item).await
      }
      Role::Consumer { stage, inbound } => {
        let item = receive(scope, inbound).await?;
        stage.consume(item).await.map_err(stage_failed)
      }
    }
  }
}

/// One stage of a running pipeline.
pub(crate) struct StageWorker<T, E> {
  pub(crate) index: usize,
  pub(crate) name: String,
  /// The scope this worker listens on.
  pub(crate) scope: CancellationScope,
  pub(crate) role: Role<T, E>,
}

impl<T, E> StageWorker<T, E>
where
  T: Send + 'static,
  E: Display + Send + 'static,
{
  /// Spawns this worker as its own task, registered with `barrier`.
  pub(crate) fn spawn_on(self, barrier: &mut CompletionBarrier) {
    let index = self.index;
    let name = self.name.clone();
    let role = self.role.kind();
    barrier.spawn(index, &name, role, self.run());
  }

  #[instrument(
    name = "StageWorker::run",
    skip_all,
    fields(stage = %self.name, index = self.index, role = %self.role.kind())
  )]
  pub(crate) async fn run(self) -> StageReport {
    let StageWorker {
      index,
      name,
      scope,
      mut role,
    } = self;
    let kind = role.kind();

    // Armed before the loop so a panicking stage still stops everything upstream.
    let cascade = match kind {
      StageRole::Producer => None,
      StageRole::Transform | StageRole::Consumer => Some(scope.cancel_on_drop()),
    };
    event!(Level::DEBUG, "Stage worker started.");

    let mut processed: u64 = 0;
    let exit = loop {
      match role.step(&scope).await {
        Ok(()) => {
          processed += 1;
          event!(Level::TRACE, processed, "Item passed through stage.");
        }
        Err(exit) => break exit,
      }
    };

    // Upstream first, then downstream: cancel our scope, then close the outbound hand-off.
    drop(cascade);
    drop(role);

    event!(Level::DEBUG, ?exit, processed, "Stage worker stopped.");
    StageReport {
      index,
      name,
      role: kind,
      exit,
      processed,
    }
  }
}

fn stage_failed<E: Display>(err: E) -> StageExit {
  event!(Level::WARN, error = %err, "Stage function failed; stopping stage.");
  StageExit::Failed
}

async fn receive<T>(scope: &CancellationScope, inbound: &mut HandoffReceiver<T>) -> Result<T, StageExit> {
  tokio::select! {
    biased;
    _ = scope.cancelled() => Err(StageExit::Cancelled),
    item = inbound.recv() => item.ok_or(StageExit::InputClosed),
  }
}

/// Hands `item` downstream. A value the receiver took before cancellation
/// was observed still counts as handed off.
async fn forward<T>(scope: &CancellationScope, outbound: &HandoffSender<T>, item: T) -> Result<(), StageExit> {
  let mut delivery = tokio::select! {
    biased;
    _ = scope.cancelled() => return Err(StageExit::Cancelled),
    queued = outbound.enqueue(item) => queued.map_err(|_| StageExit::OutputClosed)?,
  };
  let taken = tokio::select! {
    biased;
    _ = scope.cancelled() => None,
    taken = delivery.taken() => Some(taken),
  };
  match taken {
    Some(taken) => taken.map_err(|_| StageExit::OutputClosed),
    None if delivery.withdraw() => Ok(()),
    None => Err(StageExit::Cancelled),
  }
}
