//! Capture error type

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while setting up or running the TC capture.
///
/// All of these are fatal setup errors in the sense of the run policy:
/// attachment is attempted exactly once, and the surrounding process is
/// expected to restart the sensor if it fails. Per-direction filter
/// failures are not errors; they are recorded in the `SetupReport`.
#[derive(Error, Debug)]
pub enum TcCaptureError {
    #[error("network interface not found: {name}")]
    InterfaceNotFound { name: String },

    #[error("failed to read eBPF object {path}: {source}")]
    ObjectRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[cfg(target_os = "linux")]
    #[error("failed to load eBPF object: {0}")]
    ProgramLoad(#[from] aya::EbpfError),

    #[cfg(target_os = "linux")]
    #[error("eBPF program error: {0}")]
    Program(#[from] aya::programs::ProgramError),

    #[cfg(target_os = "linux")]
    #[error("eBPF map error: {0}")]
    Map(#[from] aya::maps::MapError),

    #[cfg(target_os = "linux")]
    #[error("failed to open perf buffer: {0}")]
    PerfBuffer(#[from] aya::maps::perf::PerfBufferError),

    #[error("program {name} not found in eBPF object")]
    ProgramNotFound { name: &'static str },

    #[error("map {name} not found in eBPF object")]
    MapNotFound { name: &'static str },

    #[error("failed to create clsact qdisc on {iface}: {source}")]
    QdiscCreate {
        iface: String,
        source: std::io::Error,
    },

    #[error("failed to list online CPUs ({what}): {source}")]
    OnlineCpus {
        what: &'static str,
        source: std::io::Error,
    },

    #[error("no filter could be attached in either direction on {iface}")]
    NoDirectionAttached { iface: String },
}
