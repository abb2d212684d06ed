// stageline/src/pipeline/definition.rs

//! Contains `PipelineConfig<T, E>`, its builder, and the `Pipeline<T, E>` handle.

use crate::core::scope::{CancelHandle, CancelSlot};
use crate::core::stage::{Consumer, FnConsumer, FnProducer, FnTransform, NamedStage, Producer, Transform};
use crate::error::{StagelineError, StagelineResult};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// The stages of a pipeline, in processing order.
///
/// `T` is the element type moved through the chain, `E` the error type its
/// stages fail with. Build one with [`PipelineConfig::builder`].
pub struct PipelineConfig<T, E = anyhow::Error> {
  pub(crate) producer: NamedStage<dyn Producer<T, E>>,
  pub(crate) transforms: Vec<NamedStage<dyn Transform<T, E>>>,
  pub(crate) consumer: NamedStage<dyn Consumer<T, E>>,
  pub(crate) timeout: Option<Duration>,
}

impl<T, E> PipelineConfig<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  pub fn builder() -> PipelineConfigBuilder<T, E> {
    PipelineConfigBuilder::new()
  }

  /// Stage names in processing order, producer first.
  pub fn stage_names(&self) -> Vec<&str> {
    std::iter::once(self.producer.name.as_str())
      .chain(self.transforms.iter().map(|t| t.name.as_str()))
      .chain(std::iter::once(self.consumer.name.as_str()))
      .collect()
  }

  pub fn worker_count(&self) -> usize {
    self.transforms.len() + 2
  }

  pub fn timeout(&self) -> Option<Duration> {
    self.timeout
  }
}

impl<T, E> std::fmt::Debug for PipelineConfig<T, E> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("PipelineConfig")
      .field("producer", &self.producer)
      .field("transforms", &self.transforms)
      .field("consumer", &self.consumer)
      .field("timeout", &self.timeout)
      .finish()
  }
}

/// Fluent builder for [`PipelineConfig`].
///
/// Transforms run in the order they are added. Every stage carries a name,
/// used in logs and in the [`RunReport`](crate::RunReport); names must be unique.
pub struct PipelineConfigBuilder<T, E = anyhow::Error> {
  producer: Option<NamedStage<dyn Producer<T, E>>>,
  transforms: Vec<NamedStage<dyn Transform<T, E>>>,
  consumer: Option<NamedStage<dyn Consumer<T, E>>>,
  timeout: Option<Duration>,
}

impl<T, E> PipelineConfigBuilder<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  pub fn new() -> Self {
    Self {
      producer: None,
      transforms: Vec::new(),
      consumer: None,
      timeout: None,
    }
  }

  /// Sets the producer. A later call replaces an earlier one.
  pub fn producer<S: Into<String>>(mut self, name: S, stage: impl Producer<T, E> + 'static) -> Self {
    self.producer = Some(NamedStage {
      name: name.into(),
      stage: Box::new(stage),
    });
    self
  }

  /// Sets the producer from an async closure.
  pub fn produce_with<S, F, Fut>(self, name: S, f: F) -> Self
  where
    S: Into<String>,
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
  {
    self.producer(name, FnProducer(f))
  }

  /// Appends a transform to the end of the chain.
  pub fn transform<S: Into<String>>(mut self, name: S, stage: impl Transform<T, E> + 'static) -> Self {
    self.transforms.push(NamedStage {
      name: name.into(),
      stage: Box::new(stage),
    });
    self
  }

  /// Appends a transform built from an async closure.
  pub fn transform_with<S, F, Fut>(self, name: S, f: F) -> Self
  where
    S: Into<String>,
    F: FnMut(T) -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
  {
    self.transform(name, FnTransform(f))
  }

  /// Sets the consumer. A later call replaces an earlier one.
  pub fn consumer<S: Into<String>>(mut self, name: S, stage: impl Consumer<T, E> + 'static) -> Self {
    self.consumer = Some(NamedStage {
      name: name.into(),
      stage: Box::new(stage),
    });
    self
  }

  /// Sets the consumer from an async closure.
  pub fn consume_with<S, F, Fut>(self, name: S, f: F) -> Self
  where
    S: Into<String>,
    F: FnMut(T) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
  {
    self.consumer(name, FnConsumer(f))
  }

  /// Cancels the run once `timeout` has elapsed since it started, exactly as
  /// an external cancellation would.
  pub fn timeout(mut self, timeout: Duration) -> Self {
    self.timeout = Some(timeout);
    self
  }

  pub fn build(self) -> StagelineResult<PipelineConfig<T, E>> {
    let producer = self.producer.ok_or(StagelineError::MissingProducer)?;
    let consumer = self.consumer.ok_or(StagelineError::MissingConsumer)?;

    let mut seen: Vec<&str> = Vec::with_capacity(self.transforms.len() + 2);
    let names = std::iter::once(producer.name.as_str())
      .chain(self.transforms.iter().map(|t| t.name.as_str()))
      .chain(std::iter::once(consumer.name.as_str()));
    for name in names {
      if seen.contains(&name) {
        return Err(StagelineError::DuplicateStageName {
          stage_name: name.to_string(),
        });
      }
      seen.push(name);
    }

    Ok(PipelineConfig {
      producer,
      transforms: self.transforms,
      consumer,
      timeout: self.timeout,
    })
  }
}

impl<T, E> Default for PipelineConfigBuilder<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}

pub(crate) struct PipelineInner<T, E> {
  /// Taken by the one and only run.
  pub(crate) config: Mutex<Option<PipelineConfig<T, E>>>,
  pub(crate) cancel: Arc<CancelSlot>,
  pub(crate) worker_count: usize,
}

/// A runnable pipeline: producer → transforms → consumer, one task per stage.
///
/// Cloning is cheap and every clone refers to the same pipeline, so
/// [`cancel`](Pipeline::cancel) on any clone reaches the run.
///
/// ```no_run
/// use stageline::{CancellationToken, Pipeline, PipelineConfig};
///
/// # async fn demo() -> anyhow::Result<()> {
/// let mut next = 0u64;
/// let config = PipelineConfig::<u64>::builder()
///   .produce_with("count", move || {
///     next += 1;
///     let n = next;
///     async move { anyhow::Ok(n) }
///   })
///   .transform_with("square", |n| async move { anyhow::Ok(n * n) })
///   .consume_with("print", |n| async move {
///     println!("{n}");
///     anyhow::Ok(())
///   })
///   .build()?;
///
/// let pipeline = Pipeline::new(config);
/// let report = pipeline.run(&CancellationToken::new()).await?;
/// println!("delivered {}", report.delivered());
/// # Ok(())
/// # }
/// ```
pub struct Pipeline<T, E = anyhow::Error> {
  pub(crate) inner: Arc<PipelineInner<T, E>>,
}

impl<T, E> Clone for Pipeline<T, E> {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
    }
  }
}

impl<T, E> Pipeline<T, E>
where
  T: Send + 'static,
  E: Send + 'static,
{
  /// Binds a configuration to a fresh pipeline. The cancellation slot exists
  /// from here on, so `cancel` is honoured no matter when it is called.
  pub fn new(config: PipelineConfig<T, E>) -> Self {
    let worker_count = config.worker_count();
    Self {
      inner: Arc::new(PipelineInner {
        config: Mutex::new(Some(config)),
        cancel: Arc::new(CancelSlot::default()),
        worker_count,
      }),
    }
  }

  /// Producer + transforms + consumer.
  pub fn worker_count(&self) -> usize {
    self.inner.worker_count
  }

  /// Requests cooperative shutdown of the run, whether it is in progress or
  /// has not started yet. Idempotent, never blocks; a no-op once the run is over.
  pub fn cancel(&self) {
    self.inner.cancel.cancel();
  }

  /// True once [`cancel`](Pipeline::cancel) has been called on any handle or
  /// through a [`CancelHandle`].
  ///
  /// Reports explicit requests only. A run stopped by its parent token, its
  /// timeout or one of its stages does not flip this; the
  /// [`RunReport`](crate::RunReport) says how each stage ended.
  pub fn is_cancelled(&self) -> bool {
    self.inner.cancel.is_requested()
  }

  /// A handle that can cancel this pipeline without keeping it alive.
  pub fn canceller(&self) -> CancelHandle {
    CancelHandle::new(Arc::clone(&self.inner.cancel))
  }

  /// True once `run` has been called.
  pub fn has_run(&self) -> bool {
    self.inner.config.lock().is_none()
  }
}

impl<T, E> std::fmt::Debug for Pipeline<T, E> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Pipeline")
      .field("worker_count", &self.inner.worker_count)
      .field("cancel", &self.inner.cancel)
      .finish_non_exhaustive()
  }
}
