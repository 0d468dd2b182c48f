//! Console collaborator adapter (C8).
//!
//! Both operations are idempotent and must tolerate being called while the
//! named console is absent or already in the target state — the executor
//! calls `disable` once per `(driver, console_name)` pair when a parallel
//! group starts and `enable` once per pair at teardown, regardless of how
//! many other drivers in the same group also named that console. Real
//! console backends are expected to deduplicate overlapping disables
//! internally (e.g. via a generation counter) so the console only comes
//! back up once every disabler has released it.

use async_trait::async_trait;

#[async_trait]
pub trait Console: Send + Sync {
    async fn disable(&self, target: &str, name: &str) -> anyhow::Result<()>;
    async fn enable(&self, target: &str, name: &str) -> anyhow::Result<()>;
}
