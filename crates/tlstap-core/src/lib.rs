//! Core types and traits for tlstap
//!
//! The sensor is split along the seams of its pipeline: capture produces
//! normalized handshake events, enrichers annotate addresses, and sinks
//! receive the finished event. This crate defines the shared event model
//! and the two traits the other crates plug into.

pub mod enrich;
pub mod event;
pub mod sink;

pub use enrich::AddressEnricher;
pub use event::{Address, TlsHandshakeEvent};
pub use sink::{EventSink, SinkError, SinkResult};
