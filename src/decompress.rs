//! Decompression lock manager (C9).
//!
//! Keyed by a deterministic hash of the source file path so concurrent
//! flash requests for the same compressed source serialize on one
//! decompression instead of racing on the output file. The lock lives
//! under the target's state directory rather than next to the source,
//! because the source directory (user storage, a read-only mount) may not
//! be writable (§4.9).
//!
//! Compressed sources are recognized by magic bytes, not file extension
//! (gzip's `\x1f\x8b`); anything else is returned untouched. The
//! decompressed output is written to a temp path and renamed onto its
//! final name only once the decoder finishes successfully, so presence of
//! the final path is proof of completeness — a truncated or corrupted
//! compressed input surfaces as [`FlashError::DecompressionCorrupted`]
//! instead of silently leaving a partial file behind.

use std::io::Read;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use sha2::{Digest, Sha256};
use std::fs::File;

use crate::config::FlashConfig;
use crate::error::{FlashError, Result};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

fn mkid(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..8])
}

fn lock_path(config: &FlashConfig, source: &Path) -> PathBuf {
    config
        .state_dir
        .join(format!("images.flash.decompress.{}.lock", mkid(source)))
}

fn decompressed_sibling(source: &Path) -> PathBuf {
    let name = source.to_string_lossy();
    if let Some(stripped) = name.strip_suffix(".gz") {
        PathBuf::from(stripped)
    } else {
        PathBuf::from(format!("{name}.decompressed"))
    }
}

fn is_gzip(source: &Path) -> Result<bool> {
    let mut f = File::open(source).map_err(|e| FlashError::SourceUnreadable {
        path: source.to_path_buf(),
        source: e,
    })?;
    let mut magic = [0u8; 2];
    match f.read_exact(&mut magic) {
        Ok(()) => Ok(magic == GZIP_MAGIC),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(FlashError::SourceUnreadable {
            path: source.to_path_buf(),
            source: e,
        }),
    }
}

fn decompress_to(source: &Path, dest: &Path) -> Result<()> {
    let mut tmp = dest.as_os_str().to_owned();
    tmp.push(format!(".tmp-{}", std::process::id()));
    let tmp = PathBuf::from(tmp);
    let result = (|| -> std::io::Result<()> {
        let src = File::open(source)?;
        let mut decoder = flate2::read::GzDecoder::new(src);
        let mut out = File::create(&tmp)?;
        std::io::copy(&mut decoder, &mut out)?;
        Ok(())
    })();

    match result {
        Ok(()) => {
            std::fs::rename(&tmp, dest).map_err(|e| FlashError::SourceUnreadable {
                path: dest.to_path_buf(),
                source: e,
            })?;
            Ok(())
        }
        Err(_) => {
            let _ = std::fs::remove_file(&tmp);
            Err(FlashError::DecompressionCorrupted {
                path: source.to_path_buf(),
            })
        }
    }
}

/// Resolve `source` to the path that should actually be flashed: the
/// decompressed sibling if `source` is a recognized compressed form,
/// otherwise `source` itself. Runs under a per-source advisory lock so two
/// concurrent requests for the same source don't race.
pub async fn resolve_decompressed(config: &FlashConfig, source: PathBuf) -> Result<PathBuf> {
    std::fs::create_dir_all(&config.state_dir).map_err(|e| FlashError::SourceUnreadable {
        path: config.state_dir.clone(),
        source: e,
    })?;
    let lock_file_path = lock_path(config, &source);

    tokio::task::spawn_blocking(move || {
        let lock_file = File::create(&lock_file_path).map_err(|e| FlashError::SourceUnreadable {
            path: lock_file_path.clone(),
            source: e,
        })?;
        lock_file
            .lock_exclusive()
            .map_err(|e| FlashError::SourceUnreadable {
                path: lock_file_path.clone(),
                source: e,
            })?;

        let result = (|| -> Result<PathBuf> {
            if !is_gzip(&source)? {
                return Ok(source.clone());
            }
            let dest = decompressed_sibling(&source);
            if dest.exists() {
                return Ok(dest);
            }
            decompress_to(&source, &dest)?;
            Ok(dest)
        })();

        let _ = lock_file.unlock();
        result
    })
    .await
    .map_err(|e| FlashError::Other(anyhow::anyhow!("decompress task panicked: {e}")))?
}
