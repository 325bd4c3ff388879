//! Structured attachment results
//!
//! Kernel setup is best-effort in places (a filter can fail on one
//! direction while the other attaches fine), and log lines are a poor API
//! for that. Every setup step lands in a `SetupReport` so callers and
//! tests can assert on partial-failure state directly.

/// Packet direction relative to the interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ingress,
    Egress,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Ingress => write!(f, "ingress"),
            Direction::Egress => write!(f, "egress"),
        }
    }
}

/// Outcome of ensuring the clsact qdisc on the interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QdiscOutcome {
    /// The qdisc was created by this run.
    Created,
    /// A clsact qdisc was already installed and was reused.
    AlreadyPresent,
}

/// Outcome of one per-direction filter attach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterOutcome {
    Attached,
    Failed(String),
}

impl FilterOutcome {
    pub fn is_attached(&self) -> bool {
        matches!(self, FilterOutcome::Attached)
    }
}

/// Result of one attachment run against an interface.
#[derive(Debug, Clone)]
pub struct SetupReport {
    /// Interface name as given.
    pub interface: String,
    /// Kernel-assigned interface index.
    pub if_index: u32,
    pub qdisc: QdiscOutcome,
    /// Whether a stale filter from a previous run was removed.
    pub stale_ingress_removed: bool,
    pub stale_egress_removed: bool,
    pub ingress: FilterOutcome,
    pub egress: FilterOutcome,
}

impl SetupReport {
    /// Directions that ended up with a working filter.
    pub fn attached_directions(&self) -> Vec<Direction> {
        let mut dirs = Vec::with_capacity(2);
        if self.ingress.is_attached() {
            dirs.push(Direction::Ingress);
        }
        if self.egress.is_attached() {
            dirs.push(Direction::Egress);
        }
        dirs
    }

    /// True when only one direction attached: the run continues with
    /// reduced coverage.
    pub fn is_degraded(&self) -> bool {
        self.ingress.is_attached() != self.egress.is_attached()
    }
}
