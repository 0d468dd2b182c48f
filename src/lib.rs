//! Image-flashing orchestration core for a hardware test-harness server.
//!
//! Given a request to flash several images onto a target, this crate
//! resolves image-type aliases, groups images by the driver that flashes
//! them, partitions drivers into serial and parallel buckets, supervises
//! each flashing subprocess through to completion or failure, and records
//! content hashes of everything successfully flashed. Concrete flasher
//! backends, the RPC surface that delivers requests, authentication, and
//! target ownership locking are out of scope — this crate only defines the
//! seams ([`driver::Driver`], [`power::PowerRail`], [`console::Console`],
//! [`metadata::MetadataStore`]) those subsystems plug into.

pub mod bucket;
pub mod config;
pub mod console;
pub mod context;
pub mod decompress;
pub mod driver;
pub mod engine;
pub mod error;
pub mod executor;
pub mod hash;
pub mod metadata;
pub mod metadata_memory;
pub mod power;
pub mod read;
pub mod registry;
pub mod resolve;
pub mod serial;
pub mod types;

#[cfg(test)]
pub(crate) mod testutil;

pub use engine::FlashEngine;
pub use error::{FlashError, Result};
