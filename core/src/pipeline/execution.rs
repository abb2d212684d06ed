// stageline/src/pipeline/execution.rs

//! Contains the `Pipeline::run()` method: wires hand-offs and nested scopes,
//! spawns one worker per stage and waits for all of them.

use crate::core::barrier::CompletionBarrier;
use crate::core::control::RunReport;
use crate::core::handoff;
use crate::core::scope::CancellationScope;
use crate::error::{StagelineError, StagelineResult};
use crate::pipeline::definition::{Pipeline, PipelineConfig};
use crate::pipeline::worker::{Role, StageWorker};
use std::fmt::Display;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{event, instrument, Level};

impl<T, E> Pipeline<T, E>
where
  T: Send + 'static,
  E: Display + Send + 'static,
{
  /// Runs the pipeline until every stage worker has terminated.
  ///
  /// The run is cancelled when `parent` is cancelled, when [`Pipeline::cancel`]
  /// is called on any handle, when the configured timeout elapses, or when any
  /// stage stops. Stage failures are not returned: they end the run and show up
  /// in the [`RunReport`]. The only error is [`StagelineError::AlreadyRan`].
  ///
  /// Scopes are derived consumer first, so the producer's scope is nested the
  /// deepest and any stage cancelling its own scope stops everything upstream.
  ///
  /// Dropping the returned future aborts all workers of the run.
  #[instrument(
    name = "Pipeline::run",
    skip_all,
    fields(
      element_type = %std::any::type_name::<T>(),
      worker_count = self.inner.worker_count,
    ),
    err(Display)
  )]
  pub async fn run(&self, parent: &CancellationToken) -> StagelineResult<RunReport> {
    let config = self.inner.config.lock().take().ok_or(StagelineError::AlreadyRan)?;
    let PipelineConfig {
      producer,
      transforms,
      consumer,
      timeout,
    } = config;

    // Every scope nested under the run scope inherits the deadline, so a stage
    // finishing exactly at the deadline still sees the run as cancelled.
    let mut run_scope = CancellationScope::derived_from(parent);
    if let Some(limit) = timeout {
      run_scope = run_scope.with_deadline(Instant::now() + limit);
    }
    // Installed before any worker exists, so no cancel request can slip past.
    self.inner.cancel.install(&run_scope);

    let mut barrier = CompletionBarrier::new(self.inner.worker_count);
    let consumer_index = transforms.len() + 1;

    let (mut outbound, inbound) = handoff::channel::<T>();
    let worker = StageWorker {
      index: consumer_index,
      name: consumer.name,
      scope: run_scope.clone(),
      role: Role::Consumer {
        stage: consumer.stage,
        inbound,
      },
    };
    worker.spawn_on(&mut barrier);

    let mut scope = run_scope.clone();
    for (offset, transform) in transforms.into_iter().enumerate().rev() {
      scope = scope.nest();
      let (upstream, inbound) = handoff::channel::<T>();
      let downstream = std::mem::replace(&mut outbound, upstream);
      let worker = StageWorker {
        index: offset + 1,
        name: transform.name,
        scope: scope.clone(),
        role: Role::Transform {
          stage: transform.stage,
          inbound,
          outbound: downstream,
        },
      };
      worker.spawn_on(&mut barrier);
    }

    // The producer listens on the innermost scope and has none of its own.
    let worker = StageWorker {
      index: 0,
      name: producer.name,
      scope,
      role: Role::Producer {
        stage: producer.stage,
        outbound,
      },
    };
    worker.spawn_on(&mut barrier);
    event!(Level::DEBUG, pending = barrier.pending(), "All stage workers spawned.");

    let stages = match run_scope.deadline() {
      None => barrier.wait().await,
      Some(deadline) => {
        let wait = barrier.wait();
        tokio::pin!(wait);
        tokio::select! {
          stages = &mut wait => stages,
          _ = tokio::time::sleep_until(deadline) => {
            event!(Level::INFO, limit = ?timeout, "Pipeline timeout elapsed; cancelling run.");
            run_scope.cancel();
            wait.await
          }
        }
      }
    };

    let report = RunReport { stages };
    event!(
      Level::INFO,
      delivered = report.delivered(),
      failed_stages = report.failed_stages().count(),
      "Pipeline run finished."
    );
    Ok(report)
  }
}
