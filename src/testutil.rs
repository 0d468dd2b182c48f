//! Test doubles shared by this crate's own unit tests: fake drivers, a fake
//! power rail, and a fake console subsystem. Not part of the public API —
//! integration tests under `tests/` define their own, smaller doubles since
//! `#[cfg(test)]` items aren't visible across the crate boundary.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::context::Context;
use crate::console::Console;
use crate::driver::{Driver, OneShotFlasher, SupervisedFlasher};
use crate::power::PowerRail;
use crate::types::{DriverMeta, ImageType, PowerSequence};

/// Records, in order, every call made into a fake driver — used by tests to
/// assert on the start/poll/retry/kill sequence without a real subprocess.
#[derive(Default, Debug)]
pub struct CallLog {
    pub events: Mutex<Vec<String>>,
}

impl CallLog {
    pub fn push(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    pub fn count(&self, needle: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.contains(needle))
            .count()
    }
}

pub struct FakeOneShot {
    meta: DriverMeta,
    pub calls: Arc<CallLog>,
    pub fail: bool,
}

#[async_trait]
impl OneShotFlasher for FakeOneShot {
    fn meta(&self) -> &DriverMeta {
        &self.meta
    }

    async fn flash(
        &self,
        _target: &str,
        _images: &BTreeMap<ImageType, PathBuf>,
    ) -> anyhow::Result<()> {
        self.calls.push("flash");
        if self.fail {
            anyhow::bail!("fake one-shot failure");
        }
        Ok(())
    }
}

pub fn fake_one_shot(estimated_duration: Duration) -> (Driver, Arc<CallLog>) {
    let calls = Arc::new(CallLog::default());
    let driver = Driver::OneShot(Arc::new(FakeOneShot {
        meta: DriverMeta::one_shot(estimated_duration),
        calls: calls.clone(),
        fail: false,
    }));
    (driver, calls)
}

pub fn fake_one_shot_failing(estimated_duration: Duration) -> (Driver, Arc<CallLog>) {
    let calls = Arc::new(CallLog::default());
    let driver = Driver::OneShot(Arc::new(FakeOneShot {
        meta: DriverMeta::one_shot(estimated_duration),
        calls: calls.clone(),
        fail: true,
    }));
    (driver, calls)
}

/// A supervised driver whose `check_done` reports true once a fixed number
/// of polls have occurred, and whose `post_check` fails a configurable
/// number of times before succeeding.
pub struct FakeSupervised {
    meta: DriverMeta,
    pub calls: Arc<CallLog>,
    polls_until_done: u32,
    poll_count: AtomicU32,
    post_check_failures: u32,
    post_check_attempts: AtomicU32,
    pub never_done: bool,
}

#[async_trait]
impl SupervisedFlasher for FakeSupervised {
    fn meta(&self) -> &DriverMeta {
        &self.meta
    }

    async fn start(
        &self,
        _target: &str,
        _images: &BTreeMap<ImageType, PathBuf>,
        ctx: &mut Context,
    ) -> anyhow::Result<()> {
        self.calls.push(format!("start:{}", ctx.retry_count));
        self.poll_count.store(0, Ordering::SeqCst);
        ctx.pid = Some(4242);
        Ok(())
    }

    async fn check_done(
        &self,
        _target: &str,
        _images: &BTreeMap<ImageType, PathBuf>,
        _ctx: &Context,
    ) -> bool {
        if self.never_done {
            self.calls.push("check_done:false");
            return false;
        }
        let n = self.poll_count.fetch_add(1, Ordering::SeqCst) + 1;
        let done = n >= self.polls_until_done;
        self.calls.push(format!("check_done:{done}"));
        done
    }

    async fn post_check(
        &self,
        _target: &str,
        _images: &BTreeMap<ImageType, PathBuf>,
        _ctx: &Context,
    ) -> Option<String> {
        let attempt = self.post_check_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.post_check_failures {
            self.calls.push("post_check:fail");
            Some(format!("fake failure #{attempt}"))
        } else {
            self.calls.push("post_check:ok");
            None
        }
    }

    async fn kill(
        &self,
        _target: &str,
        _images: &BTreeMap<ImageType, PathBuf>,
        _ctx: &mut Context,
        reason: &str,
    ) {
        self.calls.push(format!("kill:{reason}"));
    }
}

pub struct FakeSupervisedBuilder {
    estimated_duration: Duration,
    check_period: Duration,
    retries: u32,
    parallel: bool,
    polls_until_done: u32,
    post_check_failures: u32,
    never_done: bool,
    consoles_disable: Vec<String>,
}

impl FakeSupervisedBuilder {
    pub fn new() -> Self {
        FakeSupervisedBuilder {
            estimated_duration: Duration::from_secs(2),
            check_period: Duration::from_millis(600),
            retries: 2,
            parallel: false,
            polls_until_done: 1,
            post_check_failures: 0,
            never_done: false,
            consoles_disable: Vec::new(),
        }
    }

    pub fn estimated_duration(mut self, d: Duration) -> Self {
        self.estimated_duration = d;
        self
    }
    pub fn check_period(mut self, d: Duration) -> Self {
        self.check_period = d;
        self
    }
    pub fn retries(mut self, r: u32) -> Self {
        self.retries = r;
        self
    }
    pub fn parallel(mut self, p: bool) -> Self {
        self.parallel = p;
        self
    }
    pub fn polls_until_done(mut self, n: u32) -> Self {
        self.polls_until_done = n;
        self
    }
    pub fn post_check_failures(mut self, n: u32) -> Self {
        self.post_check_failures = n;
        self
    }
    pub fn never_done(mut self, v: bool) -> Self {
        self.never_done = v;
        self
    }
    pub fn consoles_disable(mut self, names: Vec<String>) -> Self {
        self.consoles_disable = names;
        self
    }

    pub fn build(self) -> (Driver, Arc<CallLog>) {
        let calls = Arc::new(CallLog::default());
        let meta = DriverMeta::supervised(self.estimated_duration, self.check_period, self.retries)
            .parallel(self.parallel)
            .consoles_disable(self.consoles_disable);
        let driver = Driver::Supervised(Arc::new(FakeSupervised {
            meta,
            calls: calls.clone(),
            polls_until_done: self.polls_until_done,
            poll_count: AtomicU32::new(0),
            post_check_failures: self.post_check_failures,
            post_check_attempts: AtomicU32::new(0),
            never_done: self.never_done,
        }));
        (driver, calls)
    }
}

pub struct FakePowerRail {
    pub calls: Arc<CallLog>,
    pub fail_pre: bool,
}

impl FakePowerRail {
    pub fn new() -> (Arc<dyn PowerRail>, Arc<CallLog>) {
        let calls = Arc::new(CallLog::default());
        (
            Arc::new(FakePowerRail {
                calls: calls.clone(),
                fail_pre: false,
            }),
            calls,
        )
    }
}

#[async_trait]
impl PowerRail for FakePowerRail {
    async fn sequence(&self, _target: &str, _sequence: &PowerSequence) -> anyhow::Result<()> {
        self.calls.push("sequence");
        if self.fail_pre {
            anyhow::bail!("fake power failure");
        }
        Ok(())
    }

    async fn sequence_verify(
        &self,
        _target: &str,
        _sequence: &PowerSequence,
        _label: &str,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

pub struct FakeConsole {
    pub calls: Arc<CallLog>,
}

impl FakeConsole {
    pub fn new() -> (Arc<dyn Console>, Arc<CallLog>) {
        let calls = Arc::new(CallLog::default());
        (Arc::new(FakeConsole { calls: calls.clone() }), calls)
    }
}

#[async_trait]
impl Console for FakeConsole {
    async fn disable(&self, _target: &str, name: &str) -> anyhow::Result<()> {
        self.calls.push(format!("disable:{name}"));
        Ok(())
    }

    async fn enable(&self, _target: &str, name: &str) -> anyhow::Result<()> {
        self.calls.push(format!("enable:{name}"));
        Ok(())
    }
}
