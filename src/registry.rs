//! Registry (C10): a target's named collection of drivers and aliases.
//!
//! Built once at target setup and read-only during flash requests (§5
//! "Registry: read-only during requests"). Alias cycles are rejected here,
//! at construction, rather than discovered lazily during a flash (§9
//! "Alias cycles").

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::FlashConfig;
use crate::driver::Driver;
use crate::error::{FlashError, Result};
use crate::metadata::MetadataStore;
use crate::power::PowerRail;
use crate::types::{ImageType, PowerSequence};

/// Stable handle to a registered driver, assigned in registration order.
/// Driver trait objects aren't `Hash`/`Eq`, so every map keyed by "which
/// driver" in this crate (buckets, resolved plans) uses `DriverId` instead
/// of the `Driver` value itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DriverId(pub(crate) usize);

enum Entry {
    Direct(DriverId),
    Alias(ImageType),
}

pub struct Registry {
    drivers: Vec<Driver>,
    entries: HashMap<ImageType, Entry>,
    config: FlashConfig,
    pre_sequence: Option<PowerSequence>,
    post_sequence: Option<PowerSequence>,
    read_pre_sequence: Option<PowerSequence>,
    read_post_sequence: Option<PowerSequence>,
}

impl Registry {
    /// Start building a registry for one target.
    pub fn builder(config: FlashConfig) -> RegistryBuilder {
        RegistryBuilder {
            drivers: Vec::new(),
            entries: HashMap::new(),
            config,
            pre_sequence: None,
            post_sequence: None,
            read_pre_sequence: None,
            read_post_sequence: None,
        }
    }

    pub fn config(&self) -> &FlashConfig {
        &self.config
    }

    /// Shared power sequence bracketing the parallel bucket (§2 C10: "a
    /// named collection of drivers and optional shared pre/post power
    /// sequences"; §4.4 feeds this to the executor as a single
    /// `pre_sequence`/`post_sequence`, independent of any individual
    /// driver's own sequence). Set once at target setup, not per driver.
    pub fn pre_sequence(&self) -> Option<&PowerSequence> {
        self.pre_sequence.as_ref()
    }

    pub fn post_sequence(&self) -> Option<&PowerSequence> {
        self.post_sequence.as_ref()
    }

    /// Server-wide power sequence bracketing [`crate::read::read_flash`]
    /// calls, if configured (§4.7).
    pub fn read_pre_sequence(&self) -> Option<&PowerSequence> {
        self.read_pre_sequence.as_ref()
    }

    pub fn read_post_sequence(&self) -> Option<&PowerSequence> {
        self.read_post_sequence.as_ref()
    }

    pub fn driver(&self, id: DriverId) -> &Driver {
        &self.drivers[id.0]
    }

    /// Resolve `image_type` through any alias chain to `(DriverId, canonical_type)`.
    pub fn resolve(&self, image_type: &str) -> Result<(DriverId, ImageType)> {
        let mut current = image_type.to_string();
        let mut hops = 0usize;
        loop {
            match self.entries.get(&current) {
                Some(Entry::Direct(id)) => return Ok((*id, current)),
                Some(Entry::Alias(target)) => {
                    current = target.clone();
                    hops += 1;
                    if hops > self.entries.len() {
                        // Unreachable in practice: cycles are rejected at
                        // build time. Kept as a defensive bound per §9.
                        return Err(FlashError::RegistryCycle {
                            image_type: image_type.to_string(),
                        });
                    }
                }
                None => {
                    return Err(FlashError::UnknownImageType {
                        image_type: image_type.to_string(),
                    })
                }
            }
        }
    }

    /// All registered names (direct image types and aliases), for `get_list`.
    pub fn all_names(&self) -> Vec<ImageType> {
        let mut names: Vec<_> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }

    /// `{alias: canonical_type}` for every alias entry, for `get_list`.
    pub fn aliases(&self) -> Result<HashMap<ImageType, ImageType>> {
        let mut out = HashMap::new();
        for (name, entry) in &self.entries {
            if let Entry::Alias(_) = entry {
                let (_, canonical) = self.resolve(name)?;
                out.insert(name.clone(), canonical);
            }
        }
        Ok(out)
    }
}

pub struct RegistryBuilder {
    drivers: Vec<Driver>,
    entries: HashMap<ImageType, Entry>,
    config: FlashConfig,
    pre_sequence: Option<PowerSequence>,
    post_sequence: Option<PowerSequence>,
    read_pre_sequence: Option<PowerSequence>,
    read_post_sequence: Option<PowerSequence>,
}

impl RegistryBuilder {
    /// Register `driver` under `image_type`.
    pub fn driver(mut self, image_type: impl Into<ImageType>, driver: Driver) -> Self {
        let id = DriverId(self.drivers.len());
        self.drivers.push(driver);
        self.entries.insert(image_type.into(), Entry::Direct(id));
        self
    }

    /// Register `alias` as pointing at `target` (which may itself be an
    /// alias, resolved transitively at lookup time).
    pub fn alias(mut self, alias: impl Into<ImageType>, target: impl Into<ImageType>) -> Self {
        self.entries
            .insert(alias.into(), Entry::Alias(target.into()));
        self
    }

    /// Shared power sequence run once around the whole parallel bucket
    /// (§2 C10, §4.4) — not to be confused with a driver's own
    /// `pre_sequence`, which only applies in the serial bucket (§4.5).
    pub fn pre_sequence(mut self, seq: PowerSequence) -> Self {
        self.pre_sequence = Some(seq);
        self
    }

    pub fn post_sequence(mut self, seq: PowerSequence) -> Self {
        self.post_sequence = Some(seq);
        self
    }

    pub fn read_pre_sequence(mut self, seq: PowerSequence) -> Self {
        self.read_pre_sequence = Some(seq);
        self
    }

    pub fn read_post_sequence(mut self, seq: PowerSequence) -> Self {
        self.read_post_sequence = Some(seq);
        self
    }

    /// Finish construction: reject alias cycles and (optionally) validate
    /// every driver's power sequences against the power rail.
    pub async fn build(self, power: Option<&dyn PowerRail>) -> Result<Registry> {
        let registry = Registry {
            drivers: self.drivers,
            entries: self.entries,
            config: self.config,
            pre_sequence: self.pre_sequence,
            post_sequence: self.post_sequence,
            read_pre_sequence: self.read_pre_sequence,
            read_post_sequence: self.read_post_sequence,
        };

        // Cycle detection: walk every alias to a driver, bounded by the
        // number of entries (§9 "bounding the walk by registry size").
        for name in registry.entries.keys() {
            registry.resolve(name).map_err(|e| match e {
                FlashError::RegistryCycle { .. } | FlashError::UnknownImageType { .. } => e,
                other => other,
            })?;
        }

        if let Some(power) = power {
            for driver in &registry.drivers {
                let meta = driver.meta();
                if let Some(seq) = &meta.pre_sequence {
                    power
                        .sequence_verify("registry-validation", seq, "pre")
                        .await
                        .map_err(FlashError::Other)?;
                }
                if let Some(seq) = &meta.post_sequence {
                    power
                        .sequence_verify("registry-validation", seq, "post")
                        .await
                        .map_err(FlashError::Other)?;
                }
            }
            if let Some(seq) = &registry.pre_sequence {
                power
                    .sequence_verify("registry-validation", seq, "pre")
                    .await
                    .map_err(FlashError::Other)?;
            }
            if let Some(seq) = &registry.post_sequence {
                power
                    .sequence_verify("registry-validation", seq, "post")
                    .await
                    .map_err(FlashError::Other)?;
            }
        }

        Ok(registry)
    }
}

/// Write the static `estimated_duration` metadata key for every registered
/// driver's image types (§6 persisted metadata keys; written at setup).
pub async fn publish_estimated_durations(
    registry: &Registry,
    target: &str,
    metadata: &Arc<dyn MetadataStore>,
    image_types: &[(ImageType, DriverId)],
) -> anyhow::Result<()> {
    for (image_type, id) in image_types {
        let secs = registry.driver(*id).meta().estimated_duration.as_secs();
        metadata
            .set(
                target,
                &format!("interfaces.images.{image_type}.estimated_duration"),
                &secs.to_string(),
            )
            .await?;
    }
    Ok(())
}
