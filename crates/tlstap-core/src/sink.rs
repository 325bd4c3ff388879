//! Event sink trait
//!
//! Sinks are the downstream boundary of the sensor: publish is
//! fire-and-forget from the reader's point of view, and no backpressure
//! signal flows back into the capture path.

use crate::event::TlsHandshakeEvent;
use async_trait::async_trait;
use thiserror::Error;

/// Sink error type
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Sink is closed")]
    Closed,

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub type SinkResult<T> = Result<T, SinkError>;

/// Consumer of normalized handshake events.
///
/// A publish failure affects only the single event being published; the
/// reader logs it and moves on.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Sink name for logging.
    fn name(&self) -> &str;

    /// Publish one event.
    async fn publish(&self, event: &TlsHandshakeEvent) -> SinkResult<()>;

    /// Flush any buffered events.
    async fn flush(&self) -> SinkResult<()> {
        Ok(())
    }
}
