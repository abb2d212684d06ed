// stageline/examples/basic_pipeline.rs

use stageline::{CancellationToken, Pipeline, PipelineConfig, StagelineError};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), StagelineError> {
  // Initialize tracing (optional, for demonstration)
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- Basic Pipeline Example ---");

  // 1. A producer that counts from 1 to 10, then reports it is exhausted.
  let mut next = 0u64;

  // 2. Assemble producer -> transforms -> consumer. Transforms run in the order added.
  let mut log = Vec::new();
  let config = PipelineConfig::<u64>::builder()
    .produce_with("count_to_ten", move || {
      next += 1;
      let n = next;
      async move {
        if n > 10 {
          anyhow::bail!("counted to ten");
        }
        anyhow::Ok(n)
      }
    })
    .transform_with("square", |n| async move { anyhow::Ok(n * n) })
    .transform_with("plus_one", |n| async move { anyhow::Ok(n + 1) })
    .consume_with("print", move |n| {
      log.push(n);
      info!("received {} (log now holds {} items)", n, log.len());
      async move { anyhow::Ok(()) }
    })
    .build()?;

  // 3. Run it. `run` returns once every stage has stopped.
  let pipeline = Pipeline::new(config);
  info!("Starting pipeline with {} workers...", pipeline.worker_count());
  let report = pipeline.run(&CancellationToken::new()).await?;

  // 4. Inspect how each stage ended.
  for stage in &report.stages {
    info!(
      "- {} ({}): {:?} after {} items",
      stage.name, stage.role, stage.exit, stage.processed
    );
  }

  assert_eq!(report.delivered(), 10);
  Ok(())
}
