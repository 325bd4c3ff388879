//! Perf event channel
//!
//! The kernel side writes one fixed-size record per handshake into a
//! per-CPU perf event array. One pump task per online CPU copies raw
//! records into a single bounded mpsc channel; the reader on the other
//! end does all decoding and publishing sequentially.

use crate::decode::RECORD_LEN;
use crate::error::TcCaptureError;
use aya::maps::perf::{AsyncPerfEventArray, PerfBufferError};
use aya::maps::{Map, MapData};
use aya::util::online_cpus;
use bytes::BytesMut;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Bound on the raw-record channel between the pumps and the reader.
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Ring pages per CPU. Records are small, so two pages hold plenty of
/// headroom before the kernel starts counting losses.
const PAGE_COUNT: usize = 2;

/// Number of sample buffers handed to each `read_events` call.
const READ_BATCH: usize = 16;

/// Counters shared by every pump task.
#[derive(Debug, Default)]
pub struct PumpStats {
    lost: AtomicU64,
}

impl PumpStats {
    /// Records the kernel dropped because a ring filled before user space
    /// drained it.
    pub fn lost(&self) -> u64 {
        self.lost.load(Ordering::Relaxed)
    }

    fn add_lost(&self, n: u64) {
        self.lost.fetch_add(n, Ordering::Relaxed);
    }
}

/// The perf event array taken out of the loaded eBPF object.
pub struct EventChannel {
    array: AsyncPerfEventArray<MapData>,
}

impl EventChannel {
    pub fn new(map: Map) -> Result<Self, TcCaptureError> {
        let array = AsyncPerfEventArray::try_from(map)?;
        Ok(Self { array })
    }

    /// Spawn one pump task per online CPU, each forwarding raw records
    /// into `tx`. Pumps exit when the token is cancelled or the receiver
    /// is dropped. The returned stats aggregate lost-sample counts across
    /// all pumps.
    pub fn spawn_pumps(
        mut self,
        cancel: CancellationToken,
        tx: mpsc::Sender<Vec<u8>>,
    ) -> Result<(Vec<JoinHandle<()>>, Arc<PumpStats>), TcCaptureError> {
        let cpus = online_cpus().map_err(|(what, source)| TcCaptureError::OnlineCpus {
            what,
            source,
        })?;
        let stats = Arc::new(PumpStats::default());

        let mut handles = Vec::with_capacity(cpus.len());
        for cpu in cpus {
            let buf = self.array.open(cpu, Some(PAGE_COUNT))?;
            handles.push(tokio::spawn(pump(
                cpu,
                buf,
                cancel.clone(),
                tx.clone(),
                stats.clone(),
            )));
        }
        Ok((handles, stats))
    }
}

fn sample_buffers(capacity: usize) -> Vec<BytesMut> {
    (0..READ_BATCH)
        .map(|_| BytesMut::with_capacity(capacity))
        .collect()
}

async fn pump(
    cpu: u32,
    mut buf: aya::maps::perf::AsyncPerfEventArrayBuffer<MapData>,
    cancel: CancellationToken,
    tx: mpsc::Sender<Vec<u8>>,
    stats: Arc<PumpStats>,
) {
    // Records have a fixed size; the slack absorbs perf framing.
    let mut buffers = sample_buffers(RECORD_LEN + 64);

    loop {
        let events = tokio::select! {
            _ = cancel.cancelled() => break,
            events = buf.read_events(&mut buffers) => events,
        };

        match events {
            Ok(events) => {
                if events.lost > 0 {
                    stats.add_lost(events.lost as u64);
                    warn!(cpu, lost = events.lost, "perf ring overran, records lost");
                }
                for sample in buffers.iter().take(events.read) {
                    if tx.send(sample.to_vec()).await.is_err() {
                        // Reader gone, nothing left to feed.
                        debug!(cpu, "perf pump stopped, channel closed");
                        return;
                    }
                }
            }
            Err(PerfBufferError::MoreSpaceNeeded { size }) => {
                debug!(cpu, size, "growing perf sample buffers");
                buffers = sample_buffers(size);
            }
            Err(err) => {
                warn!(cpu, error = %err, "perf read failed");
            }
        }
    }
    debug!(cpu, "perf pump stopped");
}
