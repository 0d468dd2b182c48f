//! Metadata (inventory key-value store) collaborator adapter.
//!
//! The core never owns this store — §1 lists the inventory/metadata
//! key-value store as an external collaborator assumed provided. This trait
//! is the seam: the hash recorder (C6) and driver registration write
//! through it, the read path (C7) and the supplemental `estimated_duration`
//! accessor read through it.

use async_trait::async_trait;

/// Keyed, per-target string metadata. Keys follow the dotted convention
/// from §6: `interfaces.images.<type>.last_sha512`, `...last_name`,
/// `...estimated_duration`.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn set(&self, target: &str, key: &str, value: &str) -> anyhow::Result<()>;
    async fn get(&self, target: &str, key: &str) -> anyhow::Result<Option<String>>;
}
