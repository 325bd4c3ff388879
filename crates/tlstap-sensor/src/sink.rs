//! Event sinks
//!
//! Two built-in sinks: a JSONL file writer and a log sink. Events carry
//! no timestamp of their own; the JSONL sink stamps each record when it
//! is written.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use tlstap_core::event::describe_tls_version;
use tlstap_core::{EventSink, SinkError, SinkResult, TlsHandshakeEvent};
use tracing::info;

#[derive(Debug, Clone)]
pub struct JsonlSinkConfig {
    /// Output file path
    pub path: PathBuf,

    /// Append to an existing file instead of truncating
    pub append: bool,

    /// Flush after each event
    pub flush_each: bool,
}

/// On-disk record shape: the event plus a write timestamp.
#[derive(Serialize)]
struct JsonlRecord<'a> {
    ts: DateTime<Utc>,
    #[serde(flatten)]
    event: &'a TlsHandshakeEvent,
}

/// Writes one JSON object per line to a file.
pub struct JsonlSink {
    config: JsonlSinkConfig,
    writer: Mutex<BufWriter<File>>,
}

impl JsonlSink {
    pub fn new(config: JsonlSinkConfig) -> SinkResult<Self> {
        let file = if config.append {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&config.path)?
        } else {
            File::create(&config.path)?
        };
        info!("JSONL sink writing to {}", config.path.display());

        Ok(Self {
            config,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }
}

#[async_trait]
impl EventSink for JsonlSink {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn publish(&self, event: &TlsHandshakeEvent) -> SinkResult<()> {
        let line = serde_json::to_string(&JsonlRecord {
            ts: Utc::now(),
            event,
        })?;

        let mut writer = self.writer.lock().map_err(|_| SinkError::Closed)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        if self.config.flush_each {
            writer.flush()?;
        }
        Ok(())
    }

    async fn flush(&self) -> SinkResult<()> {
        let mut writer = self.writer.lock().map_err(|_| SinkError::Closed)?;
        writer.flush()?;
        Ok(())
    }
}

/// Logs each handshake at info level. The default sink when no JSONL
/// output is configured.
pub struct LogSink;

#[async_trait]
impl EventSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn publish(&self, event: &TlsHandshakeEvent) -> SinkResult<()> {
        info!(
            client = %event.client,
            server = %event.server,
            version = %describe_tls_version(event.used_tls_version),
            cipher = %format!("0x{:04x}", event.used_cipher),
            sni = %event.server_name,
            "TLS handshake"
        );
        Ok(())
    }
}

/// Publishes to every inner sink, keeping going past individual failures.
pub struct FanoutSink {
    sinks: Vec<Box<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Box<dyn EventSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl EventSink for FanoutSink {
    fn name(&self) -> &str {
        "fanout"
    }

    async fn publish(&self, event: &TlsHandshakeEvent) -> SinkResult<()> {
        let mut first_err = None;
        for sink in &self.sinks {
            if let Err(err) = sink.publish(event).await {
                tracing::warn!(sink = sink.name(), error = %err, "sink publish failed");
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn flush(&self) -> SinkResult<()> {
        for sink in &self.sinks {
            sink.flush().await?;
        }
        Ok(())
    }
}
