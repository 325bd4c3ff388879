//! Address enrichment for tlstap
//!
//! Enrichers annotate the client/server addresses of a handshake event
//! with names. The local-host enricher recognizes this machine's own
//! addresses; orchestrator-level enrichers (pod and service metadata)
//! would slot in behind the same trait.

pub mod host;

pub use host::LocalHostEnricher;
