// stageline/examples/error_handling.rs

use async_trait::async_trait;
use stageline::{CancellationToken, Consumer, Pipeline, PipelineConfig, Producer, StagelineError, Transform};
use tracing::{info, warn};

// 1. A custom error type for the stages of this pipeline.
#[derive(Debug, thiserror::Error)]
enum IngestError {
  #[error("No more lines to read")]
  EndOfInput,

  #[error("Line {line} is not a number: {text:?}")]
  NotANumber { line: usize, text: String },
}

// 2. Stages as plain structs; each one is owned by its worker, so `&mut self` is fine.
struct Lines {
  lines: Vec<&'static str>,
  position: usize,
}

#[async_trait]
impl Producer<String, IngestError> for Lines {
  async fn produce(&mut self) -> Result<String, IngestError> {
    let line = self.lines.get(self.position).ok_or(IngestError::EndOfInput)?;
    self.position += 1;
    Ok(format!("{}:{}", self.position, line))
  }
}

struct Validate;

#[async_trait]
impl Transform<String, IngestError> for Validate {
  async fn transform(&mut self, item: String) -> Result<String, IngestError> {
    let (line, text) = item.split_once(':').unwrap_or(("0", item.as_str()));
    if text.trim().parse::<i64>().is_err() {
      // The run will not hand this error back; report it here.
      let err = IngestError::NotANumber {
        line: line.parse().unwrap_or(0),
        text: text.to_string(),
      };
      warn!("{}", err);
      return Err(err);
    }
    Ok(item)
  }
}

#[derive(Default)]
struct Sum {
  total: i64,
}

#[async_trait]
impl Consumer<String, IngestError> for Sum {
  async fn consume(&mut self, item: String) -> Result<(), IngestError> {
    let value: i64 = item.split_once(':').map_or("0", |(_, v)| v).trim().parse().unwrap_or(0);
    self.total += value;
    info!("running total: {}", self.total);
    Ok(())
  }
}

#[tokio::main]
async fn main() -> Result<(), StagelineError> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();
  info!("--- Error Handling Example ---");

  // Scenario 1: clean input; the producer's EndOfInput ends the run and downstream drains.
  run_with(vec!["1", "2", "3"]).await?;

  // Scenario 2: a bad line stops the validator; upstream is cancelled, downstream drains.
  run_with(vec!["10", "20", "oops", "40"]).await?;

  Ok(())
}

async fn run_with(lines: Vec<&'static str>) -> Result<(), StagelineError> {
  let config = PipelineConfig::<String, IngestError>::builder()
    .producer("lines", Lines { lines, position: 0 })
    .transform("validate", Validate)
    .consumer("sum", Sum::default())
    .build()?;

  let report = Pipeline::new(config).run(&CancellationToken::new()).await?;
  info!("delivered {} values", report.delivered());
  for failed in report.failed_stages() {
    info!("stage '{}' ({}) stopped with {:?}", failed.name, failed.role, failed.exit);
  }
  Ok(())
}
