//! Read path (C7): symmetric read-back of a flash region through the
//! driver contract's optional `flash_read` operation (§4.7).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{FlashError, PowerPhase, Result};
use crate::power::PowerRail;
use crate::registry::Registry;

/// Read `length` bytes starting at `offset` out of `image_type` and write
/// them to a fresh path under `user_storage_root`. Returns the server-side
/// path the caller should stream from.
pub async fn read_flash(
    registry: &Registry,
    power: &Arc<dyn PowerRail>,
    target: &str,
    image_type: &str,
    offset: u64,
    length: u64,
    user_storage_root: &Path,
) -> Result<PathBuf> {
    let (driver_id, canonical_type) = registry.resolve(image_type)?;
    let driver = registry.driver(driver_id);

    let dest_path = user_storage_root.join(format!("{canonical_type}.read"));

    if let Some(seq) = registry.read_pre_sequence() {
        power
            .sequence(target, seq)
            .await
            .map_err(|source| FlashError::PowerSequenceFailed {
                phase: PowerPhase::Pre,
                source,
            })?;
    }

    let result = match driver {
        crate::driver::Driver::OneShot(d) => {
            d.flash_read(target, &canonical_type, &dest_path, offset, length)
                .await
        }
        crate::driver::Driver::Supervised(d) => {
            d.flash_read(target, &canonical_type, &dest_path, offset, length)
                .await
        }
    };

    if result.is_ok() {
        if let Some(seq) = registry.read_post_sequence() {
            if let Err(e) = power.sequence(target, seq).await {
                tracing::warn!(error = %e, "post power sequence failed after successful read");
            }
        }
    }

    result.map(|()| dest_path)
}
