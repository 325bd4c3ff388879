//! Event channel reader
//!
//! One long-lived task drains the raw-record channel fed by the per-CPU
//! perf pumps: decode, enrich both addresses, publish. Everything happens
//! sequentially in this task, so the sink sees events in the exact order
//! the channel delivered them, with at most one record in flight.

use crate::decode::decode_record;
use std::sync::Arc;
use std::time::Duration;
use tlstap_core::{Address, AddressEnricher, EventSink};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Budget for one enricher call. An enricher that overruns is abandoned
/// for that address so it cannot stall the read loop.
pub const ENRICH_TIMEOUT: Duration = Duration::from_millis(50);

/// Counters observed by the reader loop, returned when it exits.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReaderStats {
    /// Records decoded successfully.
    pub decoded: u64,
    /// Records dropped because they failed to decode.
    pub dropped: u64,
    /// Events accepted by the sink.
    pub published: u64,
}

/// Run the reader until the channel closes or the token is cancelled.
///
/// Both exits are the expected shutdown path and are not errors. A decode
/// failure drops the single record; a publish failure loses the single
/// event; neither terminates the loop.
pub async fn run_reader(
    mut rx: mpsc::Receiver<Vec<u8>>,
    cancel: CancellationToken,
    enricher: Arc<dyn AddressEnricher>,
    sink: Arc<dyn EventSink>,
) -> ReaderStats {
    let mut stats = ReaderStats::default();

    loop {
        let raw = tokio::select! {
            _ = cancel.cancelled() => break,
            raw = rx.recv() => match raw {
                Some(raw) => raw,
                None => break,
            },
        };

        let mut event = match decode_record(&raw) {
            Ok(event) => {
                stats.decoded += 1;
                event
            }
            Err(err) => {
                stats.dropped += 1;
                warn!(error = %err, len = raw.len(), "dropping undecodable record");
                continue;
            }
        };

        enrich_bounded(enricher.as_ref(), &mut event.client).await;
        enrich_bounded(enricher.as_ref(), &mut event.server).await;

        match sink.publish(&event).await {
            Ok(()) => stats.published += 1,
            Err(err) => {
                warn!(sink = sink.name(), error = %err, "publish failed, event lost");
            }
        }
    }

    info!(
        decoded = stats.decoded,
        dropped = stats.dropped,
        published = stats.published,
        "event channel closed, reader exiting"
    );
    stats
}

async fn enrich_bounded(enricher: &dyn AddressEnricher, addr: &mut Address) {
    if tokio::time::timeout(ENRICH_TIMEOUT, enricher.enrich(addr))
        .await
        .is_err()
    {
        debug!(enricher = enricher.name(), ip = %addr.ip, "enrichment timed out");
    }
}
