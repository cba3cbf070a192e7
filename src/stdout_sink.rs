use crate::sink::LogSink;
use async_trait::async_trait;
use std::error::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Console sink: one `write_all` per line on the process stdout.
///
/// Writes go through a mutex so concurrent callers cannot interleave
/// partial lines.
pub struct StdoutSink {
    stdout: Mutex<tokio::io::Stdout>,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self {
            stdout: Mutex::new(tokio::io::stdout()),
        }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LogSink for StdoutSink {
    async fn send(&self, line: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut stdout = self.stdout.lock().await;
        stdout.write_all(line.as_bytes()).await?;
        Ok(())
    }

    async fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut stdout = self.stdout.lock().await;
        stdout.flush().await?;
        Ok(())
    }
}
