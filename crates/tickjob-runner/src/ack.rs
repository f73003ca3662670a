//! Operator acknowledgment after an attended failure.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::debug;

/// Blocks until a person has seen a failure. Only attended pipelines use it.
#[async_trait]
pub trait Acknowledger: Send + Sync {
    async fn acknowledge(&self, prompt: &str);
}

/// Prints the prompt and waits for Enter on stdin.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinAcknowledger;

#[async_trait]
impl Acknowledger for StdinAcknowledger {
    async fn acknowledge(&self, prompt: &str) {
        let mut stdout = tokio::io::stdout();
        // A closed console cannot be waited on; treat it as acknowledged.
        if stdout.write_all(format!("{prompt} ").as_bytes()).await.is_err() {
            return;
        }
        let _ = stdout.flush().await;

        let mut line = String::new();
        match BufReader::new(tokio::io::stdin()).read_line(&mut line).await {
            Ok(_) => debug!("operator acknowledged"),
            Err(e) => debug!("stdin closed before acknowledgment: {e}"),
        }
    }
}
