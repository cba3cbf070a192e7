use async_trait::async_trait;
use std::error::Error;

/// Asynchronous destination for formatted JSON lines.
///
/// Implementations are responsible for transporting lines to a concrete
/// output (stdout, a file, an in-memory buffer). The layer calls `send` from
/// a background task and never awaits it on the application thread.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Write a single line.
    ///
    /// **Parameters**
    /// - `line`: one JSON object, already terminated with `\n`.
    ///
    /// **Returns**
    /// - `Ok(())` if the line was accepted.
    /// - `Err(..)` if the output failed. The layer retries the batch a
    ///   bounded number of times before dropping it.
    ///
    /// Implementations must write the line in one piece so lines from
    /// different events never interleave.
    async fn send(&self, line: &str) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Flush any buffered lines.
    ///
    /// Default implementation is a no-op.
    async fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}
