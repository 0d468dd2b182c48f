//! Core data model: image types, power sequences, and the driver's
//! immutable metadata record.

use std::time::Duration;

/// Short identifier naming a destination within a target (e.g. `kernel-arm`).
pub type ImageType = String;

/// One step of an ordered power-rail sequence. The core treats the whole
/// sequence opaquely and only ever hands it to [`crate::power::PowerRail::sequence`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PowerStep {
    /// Turn a named component off. `"full"` is a reserved component name
    /// meaning "power off everything".
    Off(String),
    /// Turn a named component on.
    On(String),
    /// Pause for the given number of seconds before continuing.
    Wait(u64),
}

/// An ordered list of [`PowerStep`]s, run start-to-end or not at all.
pub type PowerSequence = Vec<PowerStep>;

/// Immutable metadata shared by both driver flavors. Set once at
/// registration; never mutated afterward (see the "per-driver mutable
/// scratch" design note — all mutable state lives in [`crate::context::Context`]
/// instead).
#[derive(Debug, Clone)]
pub struct DriverMeta {
    /// `true` if this driver may run concurrently with other `parallel`
    /// drivers sharing a single pre/post power sequence.
    pub parallel: bool,
    /// Rough wall-clock budget for one (non-retried) run; used to size the
    /// parallel executor's deadline.
    pub estimated_duration: Duration,
    /// Poll interval for supervised drivers. Must be `> 500ms` per the
    /// data-model invariant; enforced by [`DriverMeta::supervised`].
    pub check_period: Duration,
    /// Number of additional attempts after the first, for supervised
    /// drivers. Ignored for one-shot drivers.
    pub retries: u32,
    /// Console names to disable for the duration of a flash, in order.
    pub consoles_disable: Vec<String>,
    /// Power sequence run before this driver executes, when it is in the
    /// serial bucket (each serial driver gets its own wrapper).
    pub pre_sequence: Option<PowerSequence>,
    /// Power sequence run after this driver executes successfully, when
    /// serial.
    pub post_sequence: Option<PowerSequence>,
    /// Name used in log lines and pidfile/logfile naming; defaults to the
    /// image types the driver serves when absent.
    pub log_name: Option<String>,
}

impl DriverMeta {
    /// Construct metadata for a one-shot driver (no `check_period`/`retries`
    /// semantics apply).
    pub fn one_shot(estimated_duration: Duration) -> Self {
        DriverMeta {
            parallel: false,
            estimated_duration,
            check_period: Duration::from_secs(2),
            retries: 0,
            consoles_disable: Vec::new(),
            pre_sequence: None,
            post_sequence: None,
            log_name: None,
        }
    }

    /// Construct metadata for a supervised driver. Panics if `check_period`
    /// is not greater than 500ms, per the data-model invariant in §3.
    pub fn supervised(estimated_duration: Duration, check_period: Duration, retries: u32) -> Self {
        assert!(
            check_period > Duration::from_millis(500),
            "check_period must be greater than 0.5s, got {check_period:?}"
        );
        DriverMeta {
            parallel: false,
            estimated_duration,
            check_period,
            retries,
            consoles_disable: Vec::new(),
            pre_sequence: None,
            post_sequence: None,
            log_name: None,
        }
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn consoles_disable(mut self, consoles: Vec<String>) -> Self {
        self.consoles_disable = consoles;
        self
    }

    pub fn pre_sequence(mut self, seq: PowerSequence) -> Self {
        self.pre_sequence = Some(seq);
        self
    }

    pub fn post_sequence(mut self, seq: PowerSequence) -> Self {
        self.post_sequence = Some(seq);
        self
    }

    pub fn log_name(mut self, name: impl Into<String>) -> Self {
        self.log_name = Some(name.into());
        self
    }

    /// Name to use in pidfile/logfile naming and log lines.
    pub fn display_name(&self, fallback_image_types: &[String]) -> String {
        self.log_name
            .clone()
            .unwrap_or_else(|| fallback_image_types.join("-"))
    }
}
