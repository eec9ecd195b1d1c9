use crate::record::LogRecord;
use async_trait::async_trait;
use std::error::Error;

/// Asynchronous destination for [`LogRecord`]s delivered by a
/// [`ChannelBackend`](crate::channel::ChannelBackend).
///
/// The backend calls `send` from its own worker and never awaits it on the
/// application thread, so implementations are free to do async I/O.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Deliver a single log record.
    ///
    /// **Returns**
    /// - `Ok(())` if the record was accepted by the destination.
    /// - `Err(..)` on failure. The backend treats this as transient and
    ///   retries the whole batch with backoff, up to its retry limit.
    async fn send(&self, record: &LogRecord) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Flush anything the sink buffers itself.
    ///
    /// Default implementation is a no-op.
    async fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}
