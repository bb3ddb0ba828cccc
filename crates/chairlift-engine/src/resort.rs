//! The orchestrator: builds the substrate, owns the actor threads, and
//! tears everything down.
//!
//! # Shutdown
//!
//! [`Resort::shutdown`] walks a fixed state machine:
//!
//! 1. **Running → Draining**: stop admissions and give chairs still on
//!    the cable a bounded budget to come home.
//! 2. **Draining → Quiescing**: raise `Shutdown` on both platform lines,
//!    stop the clock, and give the actors a bounded budget to exit.
//! 3. **Quiescing → Dropped**: destroy the substrate (waking every
//!    blocked call with `Closed`) and join every thread.
//!
//! `Drop` runs the same sequence if it has not run yet.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chairlift_core::{StartupError, WorkerRole};
use chairlift_sync::InterruptKind;
use crossbeam_channel::Sender;
use tracing::{debug, info};

use crate::clock::{ClockControl, ClockState, TimeService};
use crate::config::ResortConfig;
use crate::dispatch::ChairDispatcher;
use crate::manager::{PoolName, ResourceManager, Substrate};
use crate::platform::{UpperWorker, WorkerReport};
use crate::region::StatsSnapshot;
use crate::rider::{Rider, RiderProfile};

/// Real-time budget for in-flight chairs to return during shutdown.
const DRAIN_BUDGET: Duration = Duration::from_millis(500);
/// Real-time budget for actors to notice the shutdown request.
const QUIESCE_BUDGET: Duration = Duration::from_millis(200);

// ── ShutdownReport ─────────────────────────────────────────────────

/// Report from the shutdown state machine.
#[derive(Debug)]
pub struct ShutdownReport {
    /// Total time spent in the shutdown sequence.
    pub total_ms: u64,
    /// Time spent waiting for in-flight chairs.
    pub drain_ms: u64,
    /// Time spent waiting for actors to exit on their own.
    pub quiesce_ms: u64,
    /// Chairs still on the cable when the substrate was destroyed.
    pub chairs_stranded: u32,
    /// Whether the clock thread was joined successfully.
    pub clock_joined: bool,
    /// Reports of the platform workers that were joined.
    pub workers: Vec<WorkerReport>,
    /// Statistics at the moment of teardown.
    pub stats: StatsSnapshot,
}

// ── ShutdownState ──────────────────────────────────────────────────

/// Lifecycle position of a [`Resort`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    /// Actors are running.
    Running,
    /// Admissions stopped, in-flight chairs finishing.
    Draining,
    /// Actors asked to stop.
    Quiescing,
    /// Substrate destroyed, threads joined.
    Dropped,
}

// ── Resort ─────────────────────────────────────────────────────────

/// A running chairlift resort.
pub struct Resort {
    manager: ResourceManager,
    clock_tx: Option<Sender<ClockControl>>,
    clock_thread: Option<JoinHandle<ClockState>>,
    workers: Vec<JoinHandle<WorkerReport>>,
    state: ShutdownState,
}

impl Resort {
    /// Build the substrate and start the clock and both platform workers.
    ///
    /// Nothing is left running on failure.
    pub fn start(config: ResortConfig) -> Result<Self, StartupError> {
        let manager = ResourceManager::create(&config)?;
        let substrate = Arc::clone(manager.substrate());
        let mut resort = Self {
            manager,
            clock_tx: None,
            clock_thread: None,
            workers: Vec::with_capacity(WorkerRole::ALL.len()),
            state: ShutdownState::Running,
        };

        let (tx, rx) = crossbeam_channel::bounded(16);
        let service = TimeService::new(
            Arc::clone(&substrate),
            rx,
            Duration::from_millis(config.clock_tick_ms),
        );
        resort.clock_thread = Some(spawn("chairlift-clock", move || service.run())?);
        resort.clock_tx = Some(tx);

        let lower = ChairDispatcher::new(Arc::clone(&substrate), &config);
        resort
            .workers
            .push(spawn("chairlift-lower", move || lower.run())?);
        let upper = UpperWorker::new(Arc::clone(&substrate), &config);
        resort
            .workers
            .push(spawn("chairlift-upper", move || upper.run())?);

        info!(
            key = %config.resort_key,
            station_capacity = config.station_capacity,
            chairs_in_flight = config.max_chairs_in_flight,
            "resort started"
        );
        Ok(resort)
    }

    /// The shared substrate, for clients.
    pub fn substrate(&self) -> &Arc<Substrate> {
        self.manager.substrate()
    }

    /// A rider client bound to this resort.
    pub fn rider(&self, profile: RiderProfile) -> Rider {
        Rider::new(Arc::clone(self.substrate()), profile)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ShutdownState {
        self.state
    }

    /// Freeze the simulation. Returns `false` if already suspended.
    pub fn suspend(&self) -> bool {
        if !self.substrate().region().set_paused() {
            return false;
        }
        self.notify_clock(ClockControl::Suspend);
        info!("simulation suspended");
        true
    }

    /// Unfreeze the simulation and wake every pause waiter.
    /// Returns `false` if not suspended.
    pub fn resume(&self) -> bool {
        let substrate = self.substrate();
        let Some(waiters) = substrate.region().clear_paused() else {
            return false;
        };
        self.notify_clock(ClockControl::Resume);
        // Only fails once the substrate is gone, when nobody is waiting.
        let _ = substrate.pool(PoolName::PauseClear).release(waiters);
        info!(waiters, "simulation resumed");
        true
    }

    /// Snapshot of the run statistics.
    pub fn stats(&self) -> StatsSnapshot {
        self.substrate().region().stats()
    }

    fn notify_clock(&self, control: ClockControl) {
        if let Some(tx) = &self.clock_tx {
            let _ = tx.send(control);
        }
    }

    /// Stop the resort and release every resource. Idempotent.
    pub fn shutdown(&mut self) -> ShutdownReport {
        let substrate = Arc::clone(self.substrate());
        if self.state == ShutdownState::Dropped {
            return ShutdownReport {
                total_ms: 0,
                drain_ms: 0,
                quiesce_ms: 0,
                chairs_stranded: 0,
                clock_joined: true,
                workers: Vec::new(),
                stats: substrate.region().stats(),
            };
        }

        let start = Instant::now();

        // Phase 1: Running → Draining
        self.state = ShutdownState::Draining;
        if substrate.region().begin_closing() {
            debug!("admissions stopped");
        }
        if substrate.region().is_paused() {
            self.resume();
        }
        let chairs = substrate.pool(PoolName::ChairsInFlight);
        let drain_deadline = Instant::now() + DRAIN_BUDGET;
        while chairs.value() < chairs.limit() && Instant::now() < drain_deadline {
            thread::sleep(substrate.poll_interval());
        }
        let drain_ms = start.elapsed().as_millis() as u64;

        // Phase 2: Draining → Quiescing
        self.state = ShutdownState::Quiescing;
        for role in WorkerRole::ALL {
            substrate.line(role).deliver(InterruptKind::Shutdown);
        }
        self.notify_clock(ClockControl::Shutdown);
        self.clock_tx.take();
        let quiesce_deadline = Instant::now() + QUIESCE_BUDGET;
        loop {
            let clock_done = self.clock_thread.as_ref().is_none_or(|h| h.is_finished());
            let all_done = clock_done && self.workers.iter().all(|h| h.is_finished());
            if all_done || Instant::now() > quiesce_deadline {
                break;
            }
            thread::yield_now();
        }
        let quiesce_ms = start.elapsed().as_millis() as u64 - drain_ms;

        // Phase 3: Quiescing → Dropped
        self.state = ShutdownState::Dropped;
        let chairs_stranded = chairs.limit().saturating_sub(chairs.value());
        let stats = substrate.region().stats();
        self.manager.destroy();

        let clock_joined = match self.clock_thread.take() {
            Some(handle) => handle.join().is_ok(),
            None => true,
        };
        let workers: Vec<WorkerReport> = self
            .workers
            .drain(..)
            .filter_map(|h| h.join().ok())
            .collect();

        let total_ms = start.elapsed().as_millis() as u64;
        info!(
            total_ms,
            chairs_stranded,
            chairs_dispatched = stats.chairs_dispatched,
            "resort shut down"
        );
        ShutdownReport {
            total_ms,
            drain_ms,
            quiesce_ms,
            chairs_stranded,
            clock_joined,
            workers,
            stats,
        }
    }
}

impl Drop for Resort {
    fn drop(&mut self) {
        if self.state != ShutdownState::Dropped {
            self.shutdown();
        }
    }
}

impl std::fmt::Debug for Resort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resort")
            .field("substrate", self.substrate())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

fn spawn<T, F>(name: &str, f: F) -> Result<JoinHandle<T>, StartupError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    thread::Builder::new()
        .name(name.into())
        .spawn(f)
        .map_err(|_| StartupError::ThreadSpawnFailed {
            actor: name.into(),
        })
}
