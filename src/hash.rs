//! Hash recorder (C6): after a successful flash, record a content hash and
//! the original file name against the image-type metadata. Failure to
//! write metadata is logged but never fails the flash (§4.6, §7).

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha512};

use crate::bucket::DriverImages;
use crate::metadata::MetadataStore;

fn hash_file_blocking(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha512::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Record `interfaces.images.<type>.last_sha512` and `...last_name` for
/// every image in `images`, which were just flashed successfully by one
/// driver.
pub async fn record(target: &str, images: &DriverImages, metadata: &Arc<dyn MetadataStore>) {
    for (image_type, path) in images {
        let path = path.clone();
        let digest = match tokio::task::spawn_blocking(move || hash_file_blocking(&path)).await {
            Ok(Ok(digest)) => digest,
            Ok(Err(e)) => {
                tracing::warn!(image_type, error = %e, "failed to hash flashed file; metadata not recorded");
                continue;
            }
            Err(e) => {
                tracing::warn!(image_type, error = %e, "hashing task panicked; metadata not recorded");
                continue;
            }
        };

        if let Err(e) = metadata
            .set(
                target,
                &format!("interfaces.images.{image_type}.last_sha512"),
                &digest,
            )
            .await
        {
            tracing::warn!(image_type, error = %e, "failed to record last_sha512");
        }
        if let Err(e) = metadata
            .set(
                target,
                &format!("interfaces.images.{image_type}.last_name"),
                &path_as_flashed(images, image_type),
            )
            .await
        {
            tracing::warn!(image_type, error = %e, "failed to record last_name");
        }
    }
}

fn path_as_flashed(images: &DriverImages, image_type: &str) -> String {
    images
        .get(image_type)
        .map(|p: &PathBuf| p.display().to_string())
        .unwrap_or_default()
}
