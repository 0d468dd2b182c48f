//! Per-driver execution scratch (§3 "Context").
//!
//! A `Context` is created fresh for each driver participating in a flash
//! request and is never shared between drivers or reused across requests —
//! this is what lets the parallel executor supervise several drivers from a
//! single task without any locking: each `Context` is touched only by the
//! supervisor loop for the one driver it belongs to.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

use crate::types::ImageType;

/// Scratch state owned by one driver's (possibly retried) execution.
#[derive(Debug, Clone)]
pub struct Context {
    /// When the current attempt was started. Not reset on retry unless the
    /// driver implementation itself chooses to reset it — the executor's
    /// own deadline tracking is independent of this (see `executor.rs`).
    pub ts0: Instant,
    /// 1-based attempt counter, incremented on each retry.
    pub retry_count: u32,
    /// The sub-map of images this driver is responsible for.
    pub images: BTreeMap<ImageType, PathBuf>,
    /// Command line used to launch the child, kept only for diagnostics.
    pub cmdline: Vec<String>,
    /// Path to this run's pidfile, named `<state_dir>/flash-<types>.pid`.
    pub pidfile: PathBuf,
    /// Path to this run's logfile, named `<state_dir>/flash-<log_name>.log`.
    pub logfile: PathBuf,
    /// OS process id of the spawned child, once `start` has recorded one.
    pub pid: Option<u32>,
}

impl Context {
    pub fn new(images: BTreeMap<ImageType, PathBuf>, pidfile: PathBuf, logfile: PathBuf) -> Self {
        Context {
            ts0: Instant::now(),
            retry_count: 1,
            images,
            cmdline: Vec::new(),
            pidfile,
            logfile,
            pid: None,
        }
    }

    /// Record a new attempt: bump the retry counter. Does not touch `ts0` —
    /// the parallel executor's deadline is absolute from loop entry and does
    /// not get refreshed by retries (see design note in the specification).
    pub fn retry(&mut self) {
        self.retry_count += 1;
    }
}
