// stageline/examples/pipeline_stop.rs

use stageline::{CancellationToken, Pipeline, PipelineConfig, StageExit, StagelineError};
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), StagelineError> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();
  info!("--- Pipeline Stop Example ---");

  // Scenario 1: an endless producer stopped from outside.
  let mut tick = 0u64;
  let config = PipelineConfig::<u64>::builder()
    .produce_with("ticker", move || {
      tick += 1;
      let n = tick;
      async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        anyhow::Ok(n)
      }
    })
    .consume_with("log", |n| async move {
      info!("tick {}", n);
      anyhow::Ok(())
    })
    .build()?;
  let pipeline = Pipeline::new(config);

  // Any clone of the handle (or a `canceller()`) reaches the running pipeline.
  let stopper = pipeline.clone();
  tokio::spawn(async move {
    tokio::time::sleep(Duration::from_millis(200)).await;
    info!("Requesting stop...");
    stopper.cancel();
  });

  let report = pipeline.run(&CancellationToken::new()).await?;
  info!("Stopped after {} ticks.", report.delivered());
  assert!(report.stages.iter().all(|s| s.exit == StageExit::Cancelled));

  // Scenario 2: the same kind of pipeline bounded by a timeout instead.
  let mut tick = 0u64;
  let config = PipelineConfig::<u64>::builder()
    .produce_with("ticker", move || {
      tick += 1;
      let n = tick;
      async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        anyhow::Ok(n)
      }
    })
    .consume_with("log", |n| async move {
      info!("tick {}", n);
      anyhow::Ok(())
    })
    .timeout(Duration::from_millis(150))
    .build()?;

  let report = Pipeline::new(config).run(&CancellationToken::new()).await?;
  info!("Timed out after {} ticks.", report.delivered());

  Ok(())
}
