// tests/common/mod.rs
#![allow(dead_code)] // Not every test binary uses every helper

use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use stageline::{Consumer, Producer, Transform};
use std::sync::{
  atomic::{AtomicU64, Ordering},
  Arc,
};
use std::time::Duration;
use tracing::Level;

// --- Common Error Type for Tests ---
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TestError {
  #[error("Producer exhausted after {0} items")]
  Exhausted(u64),

  #[error("Transform rejected item {0}")]
  Rejected(u64),

  #[error("Consumer refused item {0}")]
  Refused(u64),
}

// --- Helper for Tracing Setup ---
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer() // Important for tests to capture output
    .try_init()
    .ok(); // Allow multiple initializations in tests (ok if fails)
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

// --- Common Stages ---

/// Emits 1, 2, 3, ... and counts every call.
/// Fails once `limit` items have been produced, if a limit is set.
#[derive(Clone, Default)]
pub struct Counter {
  pub calls: Arc<AtomicU64>,
  pub limit: Option<u64>,
  /// Items from this index on are delayed (tokio time) before being returned.
  pub slow_from: Option<(u64, Duration)>,
}

impl Counter {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_limit(limit: u64) -> Self {
    Self {
      limit: Some(limit),
      ..Self::default()
    }
  }

  pub fn calls(&self) -> u64 {
    self.calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl Producer<u64, TestError> for Counter {
  async fn produce(&mut self) -> Result<u64, TestError> {
    let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
    if let Some(limit) = self.limit {
      if n > limit {
        return Err(TestError::Exhausted(limit));
      }
    }
    if let Some((from, delay)) = self.slow_from {
      if n >= from {
        tokio::time::sleep(delay).await;
      }
    }
    Ok(n)
  }
}

/// Applies `f`, failing on the call number `fail_on` (1-based) if set.
pub struct MapStage {
  pub f: fn(u64) -> u64,
  pub calls: Arc<AtomicU64>,
  pub fail_on: Option<u64>,
}

impl MapStage {
  pub fn new(f: fn(u64) -> u64) -> Self {
    Self {
      f,
      calls: Arc::new(AtomicU64::new(0)),
      fail_on: None,
    }
  }

  pub fn failing_on(f: fn(u64) -> u64, call: u64) -> Self {
    Self {
      fail_on: Some(call),
      ..Self::new(f)
    }
  }
}

#[async_trait]
impl Transform<u64, TestError> for MapStage {
  async fn transform(&mut self, item: u64) -> Result<u64, TestError> {
    let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
    if self.fail_on == Some(call) {
      tracing::warn!(target: "test_stages", item, "rejecting item");
      return Err(TestError::Rejected(item));
    }
    Ok((self.f)(item))
  }
}

/// Records every consumed item; refuses the item number `refuse_on` (1-based) if set.
#[derive(Clone, Default)]
pub struct Collector {
  pub seen: Arc<Mutex<Vec<u64>>>,
  pub refuse_on: Option<u64>,
}

impl Collector {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn refusing_on(call: u64) -> Self {
    Self {
      refuse_on: Some(call),
      ..Self::default()
    }
  }

  pub fn seen(&self) -> Vec<u64> {
    self.seen.lock().clone()
  }
}

#[async_trait]
impl Consumer<u64, TestError> for Collector {
  async fn consume(&mut self, item: u64) -> Result<(), TestError> {
    let mut seen = self.seen.lock();
    if self.refuse_on == Some(seen.len() as u64 + 1) {
      return Err(TestError::Refused(item));
    }
    seen.push(item);
    tracing::debug!(target: "test_stages", item, total = seen.len(), "consumed");
    Ok(())
  }
}
