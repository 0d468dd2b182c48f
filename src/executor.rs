//! Parallel executor (C4): the start/poll/retry/timeout/kill state machine.
//!
//! Supervises one or more supervised drivers concurrently from a single
//! task — there is no data race because each driver's [`Context`] is
//! touched only by this supervisor, never shared. The only OS-level
//! concurrency is the child processes the drivers themselves spawn.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::bucket::DriverImages;
use crate::console::Console;
use crate::context::Context;
use crate::error::{FlashError, PowerPhase, Result};
use crate::hash;
use crate::metadata::MetadataStore;
use crate::power::PowerRail;
use crate::registry::{DriverId, Registry};
use crate::types::PowerSequence;

/// Called once per poll tick so an external liveness watchdog sees the
/// request is still making progress (§4.4 "heartbeat").
pub trait Heartbeat: Send + Sync {
    fn touch(&self, target: &str);
}

pub struct NoopHeartbeat;
impl Heartbeat for NoopHeartbeat {
    fn touch(&self, _target: &str) {}
}

struct RunState {
    id: DriverId,
    images: DriverImages,
    ctx: Context,
    done: bool,
}

fn pidfile_for(registry: &Registry, id: DriverId, images: &DriverImages) -> std::path::PathBuf {
    let types: Vec<String> = images.keys().cloned().collect();
    let name = registry.driver(id).meta().display_name(&types);
    registry.config().state_dir.join(format!("flash-{name}.pid"))
}

fn logfile_for(registry: &Registry, id: DriverId, images: &DriverImages) -> std::path::PathBuf {
    let types: Vec<String> = images.keys().cloned().collect();
    let name = registry.driver(id).meta().display_name(&types);
    registry.config().state_dir.join(format!("flash-{name}.log"))
}

/// Run a group of supervised drivers sharing one pre/post power sequence.
/// `group` must contain only [`crate::driver::Driver::Supervised`] entries —
/// the serial dispatcher and bucketer are responsible for that invariant.
pub async fn run_parallel(
    registry: &Registry,
    target: &str,
    group: Vec<(DriverId, DriverImages)>,
    pre_sequence: Option<&PowerSequence>,
    post_sequence: Option<&PowerSequence>,
    power: &Arc<dyn PowerRail>,
    console: &Arc<dyn Console>,
    metadata: &Arc<dyn MetadataStore>,
    heartbeat: &dyn Heartbeat,
) -> Result<()> {
    if let Some(seq) = pre_sequence {
        power
            .sequence(target, seq)
            .await
            .map_err(|source| FlashError::PowerSequenceFailed {
                phase: PowerPhase::Pre,
                source,
            })?;
    }

    // Disable every console named by every participating driver before any
    // `start` call — flashing may need the wire the console is using.
    let mut disabled_consoles: Vec<String> = Vec::new();
    for (id, _) in &group {
        for name in &registry.driver(*id).meta().consoles_disable {
            console
                .disable(target, name)
                .await
                .map_err(FlashError::Other)?;
            disabled_consoles.push(name.clone());
        }
    }

    let mut states = Vec::with_capacity(group.len());
    for (id, images) in group {
        let pidfile = pidfile_for(registry, id, &images);
        let logfile = logfile_for(registry, id, &images);
        let mut ctx = Context::new(images.clone(), pidfile, logfile);

        let driver = registry
            .driver(id)
            .as_supervised()
            .expect("parallel executor only runs supervised drivers")
            .clone();

        if let Err(start_err) = start_with_retries(&driver, target, &images, &mut ctx).await {
            // This driver never got running. Kill whatever siblings did
            // manage to start, re-enable consoles, and fail the whole group.
            for s in &mut states {
                kill_one(registry, target, s).await;
            }
            reenable_consoles(console, target, &disabled_consoles).await;
            return Err(start_err);
        }

        states.push(RunState {
            id,
            images,
            ctx,
            done: false,
        });
    }

    let deadline = states
        .iter()
        .map(|s| registry.driver(s.id).meta().estimated_duration)
        .max()
        .unwrap_or(Duration::from_secs(0));
    let period = states
        .iter()
        .map(|s| registry.driver(s.id).meta().check_period)
        .min()
        .unwrap_or(Duration::from_secs(1));

    let loop_start = Instant::now();

    loop {
        if loop_start.elapsed() >= deadline {
            let still_running: Vec<String> = states
                .iter()
                .filter(|s| !s.done)
                .map(|s| registry.driver(s.id).meta().display_name(&s.images.keys().cloned().collect::<Vec<_>>()))
                .collect();
            for s in &mut states {
                kill_one(registry, target, s).await;
            }
            reenable_consoles(console, target, &disabled_consoles).await;
            return Err(FlashError::Timeout {
                drivers: still_running,
            });
        }

        heartbeat.touch(target);
        tokio::time::sleep(period).await;

        let mut fatal: Option<FlashError> = None;

        for i in 0..states.len() {
            if states[i].done {
                continue;
            }
            let id = states[i].id;
            let driver = registry
                .driver(id)
                .as_supervised()
                .expect("parallel executor only runs supervised drivers");
            let meta = driver.meta();

            if states[i].ctx.ts0.elapsed() <= meta.check_period {
                continue;
            }
            if !driver
                .check_done(target, &states[i].images, &states[i].ctx)
                .await
            {
                continue;
            }

            let outcome = driver
                .post_check(target, &states[i].images, &states[i].ctx)
                .await;

            match outcome {
                None => {
                    states[i].done = true;
                    hash::record(target, &states[i].images, metadata).await;
                    let name =
                        meta.display_name(&states[i].images.keys().cloned().collect::<Vec<_>>());
                    tracing::info!(driver = %name, "flashing completed");
                }
                Some(diagnostic) => {
                    let name =
                        meta.display_name(&states[i].images.keys().cloned().collect::<Vec<_>>());
                    if states[i].ctx.retry_count <= meta.retries {
                        states[i].ctx.retry();
                        tracing::warn!(
                            driver = %name,
                            retry = states[i].ctx.retry_count,
                            retries = meta.retries,
                            %diagnostic,
                            "flashing failed, retrying"
                        );
                        let state = &mut states[i];
                        let start_result = driver.start(target, &state.images, &mut state.ctx).await;
                        if let Err(e) = start_result {
                            fatal = Some(FlashError::DriverStartFailed {
                                driver: name,
                                source: e,
                            });
                            break;
                        }
                    } else {
                        tracing::error!(driver = %name, retry_count = states[i].ctx.retry_count, %diagnostic, "flashing failed, retries exhausted");
                        fatal = Some(FlashError::PostCheckFailed {
                            driver: name,
                            diagnostic,
                        });
                        break;
                    }
                }
            }
        }

        if let Some(err) = fatal {
            for s in &mut states {
                kill_one(registry, target, s).await;
            }
            reenable_consoles(console, target, &disabled_consoles).await;
            return Err(err);
        }

        if states.iter().all(|s| s.done) {
            reenable_consoles(console, target, &disabled_consoles).await;
            if let Some(seq) = post_sequence {
                if let Err(e) = power.sequence(target, seq).await {
                    // Logged, not propagated: the flash already succeeded
                    // (§4.4 step 5, §7 propagation policy).
                    tracing::warn!(error = %e, "post power sequence failed after successful flash");
                }
            }
            return Ok(());
        }
    }
}

async fn start_with_retries(
    driver: &Arc<dyn crate::driver::SupervisedFlasher>,
    target: &str,
    images: &DriverImages,
    ctx: &mut Context,
) -> Result<()> {
    let meta = driver.meta();
    loop {
        match driver.start(target, images, ctx).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                let driver_name = meta.display_name(&images.keys().cloned().collect::<Vec<_>>());
                if ctx.retry_count <= meta.retries {
                    tracing::warn!(driver = %driver_name, retry = ctx.retry_count, error = %e, "driver failed to start, retrying");
                    ctx.retry();
                    continue;
                }
                return Err(FlashError::DriverStartFailed {
                    driver: driver_name,
                    source: e,
                });
            }
        }
    }
}

async fn kill_one(registry: &Registry, target: &str, state: &mut RunState) {
    let driver = registry
        .driver(state.id)
        .as_supervised()
        .expect("parallel executor only runs supervised drivers");
    driver
        .kill(target, &state.images, &mut state.ctx, "flash request failed")
        .await;
}

async fn reenable_consoles(console: &Arc<dyn Console>, target: &str, names: &[String]) {
    for name in names {
        if let Err(e) = console.enable(target, name).await {
            tracing::warn!(console = %name, error = %e, "failed to re-enable console");
        }
    }
}
