//! Boundary the surface calls through to warm ePDG DNS caches, decoupling
//! this crate from the selector's own DNS/network dependencies — the same
//! trait-at-the-seam shape as `iwlan_tunnel::IkeDriver`.

/// Performs (and discards the result of) one ePDG Selector resolution pass
/// for the given roaming mode ("DNS prefetch").
#[async_trait::async_trait]
pub trait EpdgPrefetcher: Send + Sync {
    async fn prefetch(&self, is_roaming: bool);
}
