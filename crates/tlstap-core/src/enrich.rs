//! Address enrichment trait

use crate::event::Address;
use async_trait::async_trait;

/// Annotates an address record in place.
///
/// Enrichers run synchronously inside the reader loop, once per address,
/// before the event is published. The reader bounds each call with a
/// timeout, so implementations may do lookups but must tolerate being
/// abandoned mid-call.
#[async_trait]
pub trait AddressEnricher: Send + Sync {
    /// Enricher name for logging.
    fn name(&self) -> &str;

    /// Attach whatever metadata this enricher knows about `addr`.
    async fn enrich(&self, addr: &mut Address);
}

/// Enricher that leaves addresses untouched.
pub struct NoopEnricher;

#[async_trait]
impl AddressEnricher for NoopEnricher {
    fn name(&self) -> &str {
        "noop"
    }

    async fn enrich(&self, _addr: &mut Address) {}
}
