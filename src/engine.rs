//! Top-level facade (§6 external interfaces): wires the registry, resolver,
//! bucketer, dispatchers, and collaborators into the three operations an
//! embedding RPC/HTTP layer calls.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::console::Console;
use crate::error::Result;
use crate::executor::{self, Heartbeat, NoopHeartbeat};
use crate::metadata::MetadataStore;
use crate::power::PowerRail;
use crate::read;
use crate::registry::Registry;
use crate::resolve::{self, FlashRequest};
use crate::serial;
use crate::types::ImageType;

/// One target's orchestration core: a read-only [`Registry`] plus the
/// collaborator handles every operation needs.
pub struct FlashEngine {
    registry: Registry,
    power: Arc<dyn PowerRail>,
    console: Arc<dyn Console>,
    metadata: Arc<dyn MetadataStore>,
}

impl FlashEngine {
    pub fn new(
        registry: Registry,
        power: Arc<dyn PowerRail>,
        console: Arc<dyn Console>,
        metadata: Arc<dyn MetadataStore>,
    ) -> Self {
        FlashEngine {
            registry,
            power,
            console,
            metadata,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// `put_flash`: resolve, bucket, dispatch serial then parallel.
    pub async fn put_flash(
        &self,
        target: &str,
        request: FlashRequest,
        user_storage_root: &Path,
    ) -> Result<()> {
        self.put_flash_with_heartbeat(target, request, user_storage_root, &NoopHeartbeat)
            .await
    }

    pub async fn put_flash_with_heartbeat(
        &self,
        target: &str,
        request: FlashRequest,
        user_storage_root: &Path,
        heartbeat: &dyn Heartbeat,
    ) -> Result<()> {
        let plan = resolve::resolve(&self.registry, user_storage_root, request).await?;

        serial::run_serial(
            &self.registry,
            target,
            plan.serial_bucket,
            &self.power,
            &self.console,
            &self.metadata,
            heartbeat,
        )
        .await?;

        if !plan.parallel_bucket.is_empty() {
            executor::run_parallel(
                &self.registry,
                target,
                plan.parallel_bucket,
                self.registry.pre_sequence(),
                self.registry.post_sequence(),
                &self.power,
                &self.console,
                &self.metadata,
                heartbeat,
            )
            .await?;
        }

        Ok(())
    }

    /// `get_flash`: read a region back through the owning driver.
    pub async fn get_flash(
        &self,
        target: &str,
        image_type: &str,
        offset: u64,
        length: u64,
        user_storage_root: &Path,
    ) -> Result<PathBuf> {
        read::read_flash(
            &self.registry,
            &self.power,
            target,
            image_type,
            offset,
            length,
            user_storage_root,
        )
        .await
    }

    /// `get_list`: every registered name plus the alias map.
    pub fn get_list(&self) -> Result<(Vec<ImageType>, HashMap<ImageType, ImageType>)> {
        Ok((self.registry.all_names(), self.registry.aliases()?))
    }

    /// Estimated duration of flashing `image_type`, resolved through any
    /// alias chain. Supplemental accessor (not in the external interface
    /// table, but the `estimated_duration` metadata key it feeds is).
    pub fn estimated_duration(&self, image_type: &str) -> Result<Duration> {
        let (id, _) = self.registry.resolve(image_type)?;
        Ok(self.registry.driver(id).meta().estimated_duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FlashConfig;
    use crate::metadata_memory::MemoryMetadataStore;
    use crate::testutil::{fake_one_shot, FakeConsole, FakePowerRail};
    use std::time::Duration;

    #[tokio::test]
    async fn put_flash_resolves_dispatches_and_records_hash() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("img.bin"), b"payload").unwrap();

        let (driver, calls) = fake_one_shot(Duration::from_secs(1));
        let registry = Registry::builder(FlashConfig::new(dir.path().join("state")))
            .driver("a", driver)
            .build(None)
            .await
            .unwrap();

        let (power, _) = FakePowerRail::new();
        let (console, _) = FakeConsole::new();
        let metadata: Arc<dyn MetadataStore> = Arc::new(MemoryMetadataStore::new());
        let engine = FlashEngine::new(registry, power, console, metadata);

        let request = vec![("a".to_string(), PathBuf::from("img.bin"))];
        let result = engine.put_flash("t0", request, dir.path()).await;
        assert!(result.is_ok(), "{result:?}");
        assert_eq!(calls.count("flash"), 1);
    }

    #[tokio::test]
    async fn get_list_reports_names_and_aliases() {
        let dir = tempfile::tempdir().unwrap();
        let (driver, _) = fake_one_shot(Duration::from_secs(1));
        let registry = Registry::builder(FlashConfig::new(dir.path().join("state")))
            .driver("a", driver)
            .alias("b", "a")
            .build(None)
            .await
            .unwrap();

        let (power, _) = FakePowerRail::new();
        let (console, _) = FakeConsole::new();
        let metadata: Arc<dyn MetadataStore> = Arc::new(MemoryMetadataStore::new());
        let engine = FlashEngine::new(registry, power, console, metadata);

        let (names, aliases) = engine.get_list().unwrap();
        assert!(names.contains(&"a".to_string()));
        assert!(names.contains(&"b".to_string()));
        assert_eq!(aliases.get("b"), Some(&"a".to_string()));
    }

    #[tokio::test]
    async fn estimated_duration_resolves_through_alias() {
        let dir = tempfile::tempdir().unwrap();
        let (driver, _) = fake_one_shot(Duration::from_secs(42));
        let registry = Registry::builder(FlashConfig::new(dir.path().join("state")))
            .driver("a", driver)
            .alias("b", "a")
            .build(None)
            .await
            .unwrap();

        let (power, _) = FakePowerRail::new();
        let (console, _) = FakeConsole::new();
        let metadata: Arc<dyn MetadataStore> = Arc::new(MemoryMetadataStore::new());
        let engine = FlashEngine::new(registry, power, console, metadata);

        assert_eq!(engine.estimated_duration("b").unwrap(), Duration::from_secs(42));
    }
}
