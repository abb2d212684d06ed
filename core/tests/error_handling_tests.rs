// tests/error_handling_tests.rs
mod common;

use common::*;
use stageline::{CancellationToken, Pipeline, PipelineConfig, StageExit, StageRole, StagelineError};
use std::sync::atomic::Ordering;

// Producer emits 1,2,3,...; the transform computes 2^n and fails on its sixth call.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_transform_failure_stops_both_directions() {
  setup_tracing();
  let collector = Collector::new();
  let counter = Counter::new();
  let pow2 = MapStage::failing_on(|n| 2u64.pow(n as u32), 6);
  let pow2_calls = pow2.calls.clone();

  let config = PipelineConfig::<u64, TestError>::builder()
    .producer("numbers", counter.clone())
    .transform("pow2", pow2)
    .consumer("collect", collector.clone())
    .build()
    .unwrap();

  let report = Pipeline::new(config).run(&CancellationToken::new()).await.unwrap();

  assert_eq!(collector.seen(), vec![2, 4, 8, 16, 32]);
  assert_eq!(pow2_calls.load(Ordering::SeqCst), 6);
  // Item 7 at most was produced while item 6 was being rejected.
  assert!(counter.calls() <= 7);

  let pow2 = report.stage("pow2").unwrap();
  assert_eq!(pow2.exit, StageExit::Failed);
  assert_eq!(pow2.processed, 5);
  assert_eq!(report.stage("collect").map(|s| s.exit), Some(StageExit::InputClosed));
  assert_ne!(report.stage("numbers").map(|s| s.exit), Some(StageExit::Failed));
  assert_eq!(report.failed_stages().count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mid_chain_failure_delivers_exactly_m_items() {
  setup_tracing();
  let collector = Collector::new();
  let config = PipelineConfig::<u64, TestError>::builder()
    .producer("numbers", Counter::new())
    .transform("first", MapStage::new(|n| n * 3))
    .transform("breaks", MapStage::failing_on(|n| n + 1, 8))
    .transform("last", MapStage::new(|n| n))
    .consumer("collect", collector.clone())
    .build()
    .unwrap();

  let report = Pipeline::new(config).run(&CancellationToken::new()).await.unwrap();

  let expected: Vec<u64> = (1..=7).map(|n| n * 3 + 1).collect();
  assert_eq!(collector.seen(), expected);
  assert_eq!(report.delivered(), 7);
  assert_eq!(report.stage("breaks").map(|s| s.exit), Some(StageExit::Failed));
  assert_eq!(report.stage("last").map(|s| s.exit), Some(StageExit::InputClosed));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_consumer_failure_stops_production() {
  setup_tracing();
  let counter = Counter::new();
  let collector = Collector::refusing_on(4);
  let config = PipelineConfig::<u64, TestError>::builder()
    .producer("numbers", counter.clone())
    .transform("identity", MapStage::new(|n| n))
    .consumer("collect", collector.clone())
    .build()
    .unwrap();

  let report = Pipeline::new(config).run(&CancellationToken::new()).await.unwrap();

  assert_eq!(collector.seen(), vec![1, 2, 3]);
  let consumer = report.stages.last().unwrap();
  assert_eq!(consumer.role, StageRole::Consumer);
  assert_eq!(consumer.exit, StageExit::Failed);
  assert_eq!(consumer.processed, 3);
  // Refused item 4; at most one item can be in hand per upstream stage.
  assert!(counter.calls() <= 6, "producer kept going: {}", counter.calls());
  assert!(report.stages[..2].iter().all(|s| s.exit == StageExit::Cancelled));
  // The consumer took item 4 before refusing it, so the transform handed off four.
  assert_eq!(report.stage("identity").map(|s| s.processed), Some(4));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_item_taken_by_refusing_consumer_counts_upstream() {
  setup_tracing();
  for round in 0..50 {
    let collector = Collector::refusing_on(1);
    let config = PipelineConfig::<u64, TestError>::builder()
      .producer("numbers", Counter::new())
      .transform("identity", MapStage::new(|n| n))
      .consumer("collect", collector.clone())
      .build()
      .unwrap();

    let report = Pipeline::new(config).run(&CancellationToken::new()).await.unwrap();

    assert!(collector.seen().is_empty(), "round {round}");
    assert_eq!(report.delivered(), 0);
    assert_eq!(report.stage("identity").map(|s| s.processed), Some(1), "round {round}");
    assert_eq!(report.stage("identity").map(|s| s.exit), Some(StageExit::Cancelled));
    let produced = report.stage("numbers").map_or(0, |s| s.processed);
    assert!((1..=2).contains(&produced), "round {round}: producer handed off {produced}");
  }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_producer_failure_drains_downstream() {
  setup_tracing();
  let collector = Collector::new();
  let config = PipelineConfig::<u64, TestError>::builder()
    .producer("numbers", Counter::with_limit(4))
    .transform("square", MapStage::new(|n| n * n))
    .consumer("collect", collector.clone())
    .build()
    .unwrap();

  let report = Pipeline::new(config).run(&CancellationToken::new()).await.unwrap();

  assert_eq!(collector.seen(), vec![1, 4, 9, 16]);
  assert_eq!(report.stages[0].exit, StageExit::Failed);
  assert_eq!(report.stages[1].exit, StageExit::InputClosed);
  assert_eq!(report.stages[2].exit, StageExit::InputClosed);
}

#[test]
fn test_builder_requires_producer_and_consumer() {
  let missing_producer = PipelineConfig::<u64, TestError>::builder()
    .consumer("collect", Collector::new())
    .build();
  assert_eq!(missing_producer.unwrap_err(), StagelineError::MissingProducer);

  let missing_consumer = PipelineConfig::<u64, TestError>::builder()
    .producer("numbers", Counter::new())
    .build();
  assert_eq!(missing_consumer.unwrap_err(), StagelineError::MissingConsumer);
}

#[test]
fn test_builder_rejects_duplicate_stage_names() {
  let result = PipelineConfig::<u64, TestError>::builder()
    .producer("numbers", Counter::new())
    .transform("double", MapStage::new(|n| n * 2))
    .transform("double", MapStage::new(|n| n * 2))
    .consumer("collect", Collector::new())
    .build();

  match result {
    Err(StagelineError::DuplicateStageName { stage_name }) => assert_eq!(stage_name, "double"),
    other => panic!("Expected DuplicateStageName, got {:?}", other.map(|c| c.stage_names().len())),
  }
}

#[test]
fn test_config_reports_stage_layout() {
  let config = PipelineConfig::<u64, TestError>::builder()
    .producer("numbers", Counter::new())
    .transform("a", MapStage::new(|n| n))
    .transform("b", MapStage::new(|n| n))
    .consumer("collect", Collector::new())
    .build()
    .unwrap();

  assert_eq!(config.stage_names(), vec!["numbers", "a", "b", "collect"]);
  assert_eq!(config.worker_count(), 4);
  assert_eq!(config.timeout(), None);
  assert_eq!(Pipeline::new(config).worker_count(), 4);
}
