//! Power-rail collaborator adapter (C8).
//!
//! The core treats a [`PowerSequence`] opaquely: it never inspects a step's
//! component name or wait duration, it just hands the whole sequence to the
//! power rail and checks whether the call succeeded.

use async_trait::async_trait;

use crate::types::PowerSequence;

#[async_trait]
pub trait PowerRail: Send + Sync {
    /// Run `sequence` against `target`'s power rail.
    async fn sequence(&self, target: &str, sequence: &PowerSequence) -> anyhow::Result<()>;

    /// Validate, at registration time, that `sequence` is accepted by the
    /// power subsystem (used by [`crate::registry::Registry`] to reject bad
    /// driver configuration before any flash request runs).
    async fn sequence_verify(
        &self,
        target: &str,
        sequence: &PowerSequence,
        label: &str,
    ) -> anyhow::Result<()>;
}
