//! TC program attachment
//!
//! Loads the compiled eBPF object, ensures a clsact qdisc on the target
//! interface, and attaches the classifier on ingress and egress. Stale
//! filters from a previous run are detached first so a crashed sensor can
//! be restarted without leaving duplicate filters behind.

use crate::error::TcCaptureError;
use crate::report::{Direction, FilterOutcome, QdiscOutcome, SetupReport};
use aya::programs::tc::{NlOptions, SchedClassifier, TcAttachOptions, TcAttachType};
use aya::programs::tc::{qdisc_add_clsact, qdisc_detach_program};
use aya::Ebpf;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Classifier program name inside the eBPF object.
pub const PROGRAM_NAME: &str = "tls_handshake";

/// Perf event array the classifier writes handshake records into.
pub const EVENT_MAP_NAME: &str = "TLS_EVENTS";

/// Filter priority used for both directions. A fixed priority and handle
/// make the stale-filter cleanup on restart deterministic.
const FILTER_PRIORITY: u16 = 1;
const FILTER_HANDLE: u32 = 1;

#[derive(Debug, Clone)]
pub struct AttachConfig {
    /// Interface to observe, e.g. `eth0`.
    pub interface: String,
    /// Path to the compiled eBPF object file.
    pub object_path: PathBuf,
}

/// A loaded eBPF object attached to one interface.
///
/// Dropping this detaches the filters (aya removes them with the program
/// links); the clsact qdisc is left in place.
pub struct TcAttachment {
    ebpf: Ebpf,
    report: SetupReport,
}

impl TcAttachment {
    /// Load the object and attach it to the configured interface.
    ///
    /// Per-direction filter failures are tolerated and recorded in the
    /// report; only when neither direction attaches is the whole setup
    /// considered failed.
    pub fn attach(config: &AttachConfig) -> Result<Self, TcCaptureError> {
        let if_index = nix::net::if_::if_nametoindex(config.interface.as_str()).map_err(|_| {
            TcCaptureError::InterfaceNotFound {
                name: config.interface.clone(),
            }
        })?;

        bump_memlock_rlimit();

        let object =
            std::fs::read(&config.object_path).map_err(|source| TcCaptureError::ObjectRead {
                path: config.object_path.clone(),
                source,
            })?;
        let mut ebpf = Ebpf::load(&object)?;

        let stale_ingress_removed = detach_stale(&config.interface, Direction::Ingress);
        let stale_egress_removed = detach_stale(&config.interface, Direction::Egress);

        let qdisc = match qdisc_add_clsact(&config.interface) {
            Ok(()) => QdiscOutcome::Created,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => QdiscOutcome::AlreadyPresent,
            Err(source) => {
                return Err(TcCaptureError::QdiscCreate {
                    iface: config.interface.clone(),
                    source,
                })
            }
        };
        debug!(iface = %config.interface, ?qdisc, "clsact qdisc ready");

        let program: &mut SchedClassifier = ebpf
            .program_mut(PROGRAM_NAME)
            .ok_or(TcCaptureError::ProgramNotFound { name: PROGRAM_NAME })?
            .try_into()?;
        program.load()?;

        let ingress = attach_direction(program, &config.interface, Direction::Ingress);
        let egress = attach_direction(program, &config.interface, Direction::Egress);

        if !ingress.is_attached() && !egress.is_attached() {
            return Err(TcCaptureError::NoDirectionAttached {
                iface: config.interface.clone(),
            });
        }

        let report = SetupReport {
            interface: config.interface.clone(),
            if_index,
            qdisc,
            stale_ingress_removed,
            stale_egress_removed,
            ingress,
            egress,
        };
        info!(
            iface = %config.interface,
            if_index,
            directions = %report.attached_directions().len(),
            degraded = report.is_degraded(),
            "TC capture attached"
        );

        Ok(Self { ebpf, report })
    }

    pub fn report(&self) -> &SetupReport {
        &self.report
    }

    /// Take ownership of the perf event map feeding handshake records.
    ///
    /// Can only be called once; the map moves out of the loaded object.
    pub fn take_event_channel(&mut self) -> Result<crate::channel::EventChannel, TcCaptureError> {
        let map = self
            .ebpf
            .take_map(EVENT_MAP_NAME)
            .ok_or(TcCaptureError::MapNotFound {
                name: EVENT_MAP_NAME,
            })?;
        crate::channel::EventChannel::new(map)
    }
}

fn direction_attach_type(direction: Direction) -> TcAttachType {
    match direction {
        Direction::Ingress => TcAttachType::Ingress,
        Direction::Egress => TcAttachType::Egress,
    }
}

/// Remove a filter left behind by a previous sensor process, if any.
/// Absence is the common case and not an error.
fn detach_stale(interface: &str, direction: Direction) -> bool {
    match qdisc_detach_program(interface, direction_attach_type(direction), PROGRAM_NAME) {
        Ok(()) => {
            debug!(iface = interface, %direction, "removed stale filter");
            true
        }
        Err(_) => false,
    }
}

fn attach_direction(
    program: &mut SchedClassifier,
    interface: &str,
    direction: Direction,
) -> FilterOutcome {
    let mut nl = NlOptions::default();
    nl.priority = FILTER_PRIORITY;
    nl.handle = FILTER_HANDLE;
    match program.attach_with_options(
        interface,
        direction_attach_type(direction),
        TcAttachOptions::Netlink(nl),
    ) {
        Ok(_) => FilterOutcome::Attached,
        Err(err) => {
            warn!(iface = interface, %direction, error = %err, "filter attach failed");
            FilterOutcome::Failed(err.to_string())
        }
    }
}

/// Raise RLIMIT_MEMLOCK so map creation succeeds on kernels without
/// memcg-based accounting. Failure is logged and ignored; loading may
/// still succeed on newer kernels.
fn bump_memlock_rlimit() {
    let rlim = libc::rlimit {
        rlim_cur: libc::RLIM_INFINITY,
        rlim_max: libc::RLIM_INFINITY,
    };
    let ret = unsafe { libc::setrlimit(libc::RLIMIT_MEMLOCK, &rlim) };
    if ret != 0 {
        warn!("failed to raise RLIMIT_MEMLOCK, eBPF map creation may fail");
    }
}
