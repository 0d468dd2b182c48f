//! Serial dispatcher (C5): run the serial bucket's drivers one at a time.
//!
//! One-shot drivers are flashed directly: no retry loop, no timeout beyond
//! whatever `flash()` itself imposes, hashes recorded only on success (§4.5).
//! Supervised-but-serial drivers reuse the parallel executor with a
//! single-entry group, wrapped in that driver's own pre/post power
//! sequence rather than a group-wide one — each serial driver gets its own
//! bracket (§4.5 "each serial driver gets its own wrapper").

use std::sync::Arc;

use crate::bucket::DriverImages;
use crate::console::Console;
use crate::error::{FlashError, PowerPhase, Result};
use crate::executor::{self, Heartbeat};
use crate::hash;
use crate::metadata::MetadataStore;
use crate::power::PowerRail;
use crate::registry::{DriverId, Registry};

/// Run every driver in `serial_bucket` to completion, in order, stopping at
/// the first failure (§4.5: serial drivers do not run concurrently and a
/// failure in one aborts the remaining ones rather than flashing a target
/// into a partially-updated state silently).
pub async fn run_serial(
    registry: &Registry,
    target: &str,
    serial_bucket: Vec<(DriverId, DriverImages)>,
    power: &Arc<dyn PowerRail>,
    console: &Arc<dyn Console>,
    metadata: &Arc<dyn MetadataStore>,
    heartbeat: &dyn Heartbeat,
) -> Result<()> {
    for (id, images) in serial_bucket {
        let driver = registry.driver(id).clone();
        match driver {
            crate::driver::Driver::OneShot(one_shot) => {
                let meta = one_shot.meta().clone();

                if let Some(seq) = &meta.pre_sequence {
                    power
                        .sequence(target, seq)
                        .await
                        .map_err(|source| FlashError::PowerSequenceFailed {
                            phase: PowerPhase::Pre,
                            source,
                        })?;
                }

                for name in &meta.consoles_disable {
                    console.disable(target, name).await.map_err(FlashError::Other)?;
                }

                let flash_result = one_shot.flash(target, &images).await;

                for name in &meta.consoles_disable {
                    if let Err(e) = console.enable(target, name).await {
                        tracing::warn!(console = %name, error = %e, "failed to re-enable console");
                    }
                }

                match flash_result {
                    Ok(()) => {
                        hash::record(target, &images, metadata).await;
                        if let Some(seq) = &meta.post_sequence {
                            if let Err(e) = power.sequence(target, seq).await {
                                tracing::warn!(error = %e, "post power sequence failed after successful flash");
                            }
                        }
                    }
                    Err(source) => {
                        let driver_name =
                            meta.display_name(&images.keys().cloned().collect::<Vec<_>>());
                        return Err(FlashError::DriverStartFailed {
                            driver: driver_name,
                            source,
                        });
                    }
                }
            }
            crate::driver::Driver::Supervised(supervised) => {
                let meta = supervised.meta();
                let group = vec![(id, images)];
                executor::run_parallel(
                    registry,
                    target,
                    group,
                    meta.pre_sequence.as_ref(),
                    meta.post_sequence.as_ref(),
                    power,
                    console,
                    metadata,
                    heartbeat,
                )
                .await?;
            }
        }
    }
    Ok(())
}
