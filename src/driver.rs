//! The driver contract (§4.1): the interface every flasher backend
//! implements. Two shapes — one-shot and supervised — are expressed as two
//! traits, never one trait with optional methods, so the bucketer and
//! executor know statically which protocol they're driving.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::FlashError;
use crate::types::{DriverMeta, ImageType};

/// A driver whose `flash` entry point blocks until the whole operation is
/// complete. The core applies no retry loop or timeout beyond whatever the
/// call itself imposes.
#[async_trait]
pub trait OneShotFlasher: Send + Sync {
    fn meta(&self) -> &DriverMeta;

    /// Flash every image in `images` into `target`. Errors are not retried.
    async fn flash(
        &self,
        target: &str,
        images: &BTreeMap<ImageType, PathBuf>,
    ) -> anyhow::Result<()>;

    /// Read a region back, if supported. Default: unsupported.
    async fn flash_read(
        &self,
        _target: &str,
        _image_type: &str,
        _dest_path: &Path,
        _offset: u64,
        _length: u64,
    ) -> Result<(), FlashError> {
        Err(FlashError::Unsupported {
            operation: "flash_read",
        })
    }
}

/// A driver whose execution the core polls via `start`/`check_done`/
/// `post_check`/`kill`. `start` must return as soon as the external work has
/// been launched — it must not block until completion.
#[async_trait]
pub trait SupervisedFlasher: Send + Sync {
    fn meta(&self) -> &DriverMeta;

    /// Launch the external work (typically spawning a child process) and
    /// record launch state (pid, cmdline) into `ctx`. Must not block on
    /// completion.
    async fn start(
        &self,
        target: &str,
        images: &BTreeMap<ImageType, PathBuf>,
        ctx: &mut Context,
    ) -> anyhow::Result<()>;

    /// Non-blocking poll: `true` iff the external work has finished,
    /// regardless of success.
    async fn check_done(
        &self,
        target: &str,
        images: &BTreeMap<ImageType, PathBuf>,
        ctx: &Context,
    ) -> bool;

    /// Called once `check_done` returns `true`. `None` means success; any
    /// other value is a diagnostic message driving a retry or an abort.
    async fn post_check(
        &self,
        target: &str,
        images: &BTreeMap<ImageType, PathBuf>,
        ctx: &Context,
    ) -> Option<String>;

    /// Terminate any still-running child and release resources. Must be
    /// safe to call on a driver that already finished.
    async fn kill(
        &self,
        target: &str,
        images: &BTreeMap<ImageType, PathBuf>,
        ctx: &mut Context,
        reason: &str,
    );

    /// Read a region back, if supported. Default: unsupported.
    async fn flash_read(
        &self,
        _target: &str,
        _image_type: &str,
        _dest_path: &Path,
        _offset: u64,
        _length: u64,
    ) -> Result<(), FlashError> {
        Err(FlashError::Unsupported {
            operation: "flash_read",
        })
    }
}

/// A registered driver, tagged by which contract it implements. Held behind
/// an `Arc` because the same driver instance is shared across requests
/// (registry state is read-only during flash requests).
#[derive(Clone)]
pub enum Driver {
    OneShot(Arc<dyn OneShotFlasher>),
    Supervised(Arc<dyn SupervisedFlasher>),
}

impl Driver {
    pub fn meta(&self) -> &DriverMeta {
        match self {
            Driver::OneShot(d) => d.meta(),
            Driver::Supervised(d) => d.meta(),
        }
    }

    pub fn is_parallel(&self) -> bool {
        self.meta().parallel
    }

    pub fn as_supervised(&self) -> Option<&Arc<dyn SupervisedFlasher>> {
        match self {
            Driver::Supervised(d) => Some(d),
            Driver::OneShot(_) => None,
        }
    }

    pub fn as_one_shot(&self) -> Option<&Arc<dyn OneShotFlasher>> {
        match self {
            Driver::OneShot(d) => Some(d),
            Driver::Supervised(_) => None,
        }
    }
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Driver::OneShot(_) => write!(f, "Driver::OneShot(..)"),
            Driver::Supervised(_) => write!(f, "Driver::Supervised(..)"),
        }
    }
}
