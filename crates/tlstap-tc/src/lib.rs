//! TC/eBPF capture for tlstap
//!
//! Installs a TC classifier on a network interface (clsact qdisc, one
//! filter per direction), drains the kernel's perf event channel, and
//! decodes the fixed-layout handshake records it carries.
//!
//! The attachment and channel layers are Linux-only; the decoder, the
//! reader loop, and the setup report are portable and unit-testable
//! anywhere.

pub mod decode;
pub mod error;
pub mod reader;
pub mod report;

#[cfg(target_os = "linux")]
pub mod attach;
#[cfg(target_os = "linux")]
pub mod channel;

pub use decode::{decode_record, DecodeError, RECORD_LEN};
pub use error::TcCaptureError;
pub use reader::{run_reader, ReaderStats, ENRICH_TIMEOUT};
pub use report::{Direction, FilterOutcome, QdiscOutcome, SetupReport};

#[cfg(target_os = "linux")]
pub use attach::{AttachConfig, TcAttachment, EVENT_MAP_NAME, PROGRAM_NAME};
#[cfg(target_os = "linux")]
pub use channel::{EventChannel, PumpStats, EVENT_CHANNEL_CAPACITY};
