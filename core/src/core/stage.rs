// stageline/src/core/stage.rs

//! The three stage contracts a pipeline is assembled from.
//!
//! Each stage is owned by exactly one worker for the whole run, hence the
//! `&mut self` receivers: stages may keep plain mutable state without locks.
//! A returned error stops the stage for good; nothing is retried.
//!
//! Closures can be used through [`FnProducer`], [`FnTransform`] and
//! [`FnConsumer`], or more conveniently through the `*_with` methods of
//! [`PipelineConfigBuilder`](crate::PipelineConfigBuilder).

use async_trait::async_trait;
use std::future::Future;

/// Head of the pipeline. Called repeatedly until it fails or the run is cancelled.
#[async_trait]
pub trait Producer<T, E>: Send {
  async fn produce(&mut self) -> Result<T, E>;
}

/// A middle stage. Called once per received item; its output is handed downstream.
#[async_trait]
pub trait Transform<T, E>: Send {
  async fn transform(&mut self, item: T) -> Result<T, E>;
}

/// Tail of the pipeline. Called once per received item.
#[async_trait]
pub trait Consumer<T, E>: Send {
  async fn consume(&mut self, item: T) -> Result<(), E>;
}

/// Adapts `FnMut() -> impl Future<Output = Result<T, E>>` into a [`Producer`].
pub struct FnProducer<F>(pub F);

/// Adapts `FnMut(T) -> impl Future<Output = Result<T, E>>` into a [`Transform`].
pub struct FnTransform<F>(pub F);

/// Adapts `FnMut(T) -> impl Future<Output = Result<(), E>>` into a [`Consumer`].
pub struct FnConsumer<F>(pub F);

#[async_trait]
impl<T, E, F, Fut> Producer<T, E> for FnProducer<F>
where
  F: FnMut() -> Fut + Send + 'static,
  Fut: Future<Output = Result<T, E>> + Send + 'static,
  T: Send + 'static,
  E: Send + 'static,
{
  async fn produce(&mut self) -> Result<T, E> {
    (self.0)().await
  }
}

#[async_trait]
impl<T, E, F, Fut> Transform<T, E> for FnTransform<F>
where
  F: FnMut(T) -> Fut + Send + 'static,
  Fut: Future<Output = Result<T, E>> + Send + 'static,
  T: Send + 'static,
  E: Send + 'static,
{
  async fn transform(&mut self, item: T) -> Result<T, E> {
    (self.0)(item).await
  }
}

#[async_trait]
impl<T, E, F, Fut> Consumer<T, E> for FnConsumer<F>
where
  F: FnMut(T) -> Fut + Send + 'static,
  Fut: Future<Output = Result<(), E>> + Send + 'static,
  T: Send + 'static,
  E: Send + 'static,
{
  async fn consume(&mut self, item: T) -> Result<(), E> {
    (self.0)(item).await
  }
}

/// A named stage as stored in a configuration.
pub(crate) struct NamedStage<S: ?Sized> {
  pub(crate) name: String,
  pub(crate) stage: Box<S>,
}

impl<S: ?Sized> std::fmt::Debug for NamedStage<S> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("NamedStage").field("name", &self.name).finish_non_exhaustive()
  }
}
