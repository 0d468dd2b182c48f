//! Image request resolver (C2).
//!
//! Turns a caller-supplied `{image_type -> file_path}` request into a
//! bucketed plan: alias resolution, path policy enforcement, atomic
//! decompression, mtime touch, last-write-wins grouping by driver, and
//! finally partitioning into serial/parallel buckets (§4.2).

use std::path::{Path, PathBuf};

use crate::bucket::{self, DriverImages, ResolvedPlan};
use crate::config::FlashConfig;
use crate::decompress;
use crate::error::{FlashError, Result};
use crate::registry::{DriverId, Registry};
use crate::types::ImageType;

/// One caller-supplied request. Order is significant: when two entries
/// alias to the same canonical type, the later one wins (§3, §8 property 2).
pub type FlashRequest = Vec<(ImageType, PathBuf)>;

fn resolve_path(config: &FlashConfig, user_storage_root: &Path, requested: &Path) -> Result<PathBuf> {
    if requested.is_absolute() {
        config
            .translate_absolute(requested)
            .ok_or_else(|| FlashError::PermissionDenied {
                path: requested.to_path_buf(),
            })
    } else {
        Ok(user_storage_root.join(requested))
    }
}

fn touch_mtime(path: &Path) -> Result<()> {
    let now = filetime::FileTime::now();
    filetime::set_file_mtime(path, now).map_err(|e| FlashError::SourceUnreadable {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Resolve `request` against `registry` into a bucketed plan ready for the
/// bucketer's callers (serial dispatcher, parallel executor).
pub async fn resolve(
    registry: &Registry,
    user_storage_root: &Path,
    request: FlashRequest,
) -> Result<ResolvedPlan> {
    let config = registry.config();
    let mut grouped: Vec<(DriverId, DriverImages)> = Vec::new();

    for (image_type, requested_path) in request {
        let (driver_id, canonical_type) = registry.resolve(&image_type)?;

        let located = resolve_path(config, user_storage_root, &requested_path)?;
        if !located.exists() {
            return Err(FlashError::SourceUnreadable {
                path: located,
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }

        let resolved = decompress::resolve_decompressed(config, located).await?;
        touch_mtime(&resolved)?;

        match grouped.iter_mut().find(|(id, _)| *id == driver_id) {
            Some((_, images)) => {
                images.insert(canonical_type, resolved);
            }
            None => {
                let mut images = DriverImages::new();
                images.insert(canonical_type, resolved);
                grouped.push((driver_id, images));
            }
        }
    }

    Ok(bucket::bucket(registry, grouped))
}
