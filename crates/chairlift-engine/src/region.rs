//! The shared region: lifecycle flags, the simulated clock, guarded
//! counters, and the entry log.
//!
//! Granularity follows how each field is used:
//!
//! - The clock is a single `AtomicU64`, written only by the time service
//!   and read lock-free by everyone else.
//! - Lifecycle and emergency flags are atomics for lock-free reads, but
//!   every write that must stay consistent with a counter happens while
//!   the state guard is held.
//! - Compound counters (station occupancy, waiter counts, halt bits,
//!   incident sequence) live behind the state guard. The guard is only
//!   ever held inside the methods below, never across a blocking call.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use chairlift_core::{IncidentId, RegionError, TouristId, TouristKind, WorkerRole};

use crate::config::SimParams;
use crate::Stopped;

const MS_PER_MINUTE: f64 = 60_000.0;

/// Counters that must change together, protected by the state guard.
#[derive(Debug, Default)]
struct GuardedState {
    lower_station_count: u32,
    emergency_waiters: u32,
    pause_waiters: u32,
    halted: [bool; 2],
    incident: IncidentId,
}

impl GuardedState {
    fn any_halted(&self) -> bool {
        self.halted.iter().any(|h| *h)
    }
}

/// One tourist's entry into the resort, kept for reporting.
#[derive(Clone, Debug, PartialEq)]
pub struct EntryRecord {
    /// Who entered.
    pub tourist_id: TouristId,
    /// Walker or cyclist.
    pub kind: TouristKind,
    /// Simulated time of entry, milliseconds.
    pub entered_at_ms: u64,
    /// Completed rides so far.
    pub rides: u32,
}

/// Point-in-time copy of the run statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Chairs that left the lower platform.
    pub chairs_dispatched: u64,
    /// Boarding confirmations delivered.
    pub riders_confirmed: u64,
    /// Arrivals reported at the upper platform.
    pub riders_arrived: u64,
    /// Incidents initiated by the lower worker.
    pub incidents_lower: u64,
    /// Incidents initiated by the upper worker.
    pub incidents_upper: u64,
    /// Simulated clock at the time of the snapshot, milliseconds.
    pub sim_time_ms: u64,
}

#[derive(Debug, Default)]
struct Stats {
    chairs_dispatched: AtomicU64,
    riders_confirmed: AtomicU64,
    riders_arrived: AtomicU64,
    incidents: [AtomicU64; 2],
}

/// State visible to every actor for the lifetime of one run.
pub struct SharedRegion {
    params: SimParams,
    station_capacity: u32,
    running: AtomicBool,
    closing: AtomicBool,
    emergency_stop: AtomicBool,
    paused: AtomicBool,
    current_sim_time_ms: AtomicU64,
    guard: Mutex<GuardedState>,
    entries: Mutex<Vec<Option<EntryRecord>>>,
    stats: Stats,
}

// Compile-time assertion: SharedRegion must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<SharedRegion>();
};

impl SharedRegion {
    /// Create a live region with the clock at opening time.
    pub fn new(params: SimParams, station_capacity: u32, max_tourists: usize) -> Self {
        Self {
            params,
            station_capacity,
            running: AtomicBool::new(true),
            closing: AtomicBool::new(false),
            emergency_stop: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            current_sim_time_ms: AtomicU64::new(minutes_to_ms(params.sim_start_minutes)),
            guard: Mutex::new(GuardedState::default()),
            entries: Mutex::new(vec![None; max_tourists]),
            stats: Stats::default(),
        }
    }

    fn guard(&self) -> MutexGuard<'_, GuardedState> {
        self.guard.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write-once clock and danger parameters.
    pub fn params(&self) -> &SimParams {
        &self.params
    }

    /// Maximum waiting-area occupancy, in slots.
    pub fn station_capacity(&self) -> u32 {
        self.station_capacity
    }

    // ── Lifecycle ─────────────────────────────────────────────────

    /// Whether the run is still live. Cleared once, at shutdown.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Whether the resort has stopped admitting tourists.
    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    /// Stop admissions. Returns `true` for the call that flipped the flag.
    pub fn begin_closing(&self) -> bool {
        !self.closing.swap(true, Ordering::AcqRel)
    }

    /// End the run. Returns `true` for the call that flipped the flag.
    pub fn stop_running(&self) -> bool {
        self.begin_closing();
        self.running.swap(false, Ordering::AcqRel)
    }

    // ── Clock ─────────────────────────────────────────────────────

    /// Current simulated time in milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.current_sim_time_ms.load(Ordering::Acquire)
    }

    /// Current simulated time in minutes.
    pub fn now_minutes(&self) -> f64 {
        self.now_ms() as f64 / MS_PER_MINUTE
    }

    /// Publish a new clock value. Only the time service calls this.
    ///
    /// Never moves the clock backwards.
    pub(crate) fn publish_sim_time_ms(&self, ms: u64) {
        self.current_sim_time_ms.fetch_max(ms, Ordering::AcqRel);
    }

    /// Block until the published clock has advanced by `minutes`.
    ///
    /// Paused intervals do not count because the clock does not move
    /// while paused. Returns [`Stopped`] if the run ends first.
    pub fn sleep_sim_minutes(&self, minutes: f64, poll: Duration) -> Result<(), Stopped> {
        let target = self.now_ms().saturating_add(minutes_to_ms(minutes.max(0.0)));
        self.sleep_until_ms(target, poll)
    }

    /// Block until the published clock reaches `target_ms`.
    pub fn sleep_until_ms(&self, target_ms: u64, poll: Duration) -> Result<(), Stopped> {
        while self.now_ms() < target_ms {
            if !self.is_running() {
                return Err(Stopped);
            }
            thread::sleep(poll);
        }
        Ok(())
    }

    // ── Emergency bookkeeping ─────────────────────────────────────

    /// Whether any platform worker currently considers the lift halted.
    pub fn is_emergency_stopped(&self) -> bool {
        self.emergency_stop.load(Ordering::Acquire)
    }

    /// Start a new incident owned by `role` and halt the lift.
    pub(crate) fn begin_incident(&self, role: WorkerRole) -> IncidentId {
        let mut state = self.guard();
        state.incident = IncidentId(state.incident.0 + 1);
        state.halted[role.index()] = true;
        self.emergency_stop.store(true, Ordering::Release);
        self.stats.incidents[role.index()].fetch_add(1, Ordering::Relaxed);
        state.incident
    }

    /// Join the current incident as the non-initiating worker.
    ///
    /// Succeeds only if the incident is newer than `after` and its
    /// initiator (the peer) is still halted, so a receiver never waits on
    /// an incident that already finished.
    pub(crate) fn join_incident(&self, role: WorkerRole, after: IncidentId) -> Option<IncidentId> {
        let mut state = self.guard();
        if state.incident <= after || !state.halted[role.peer().index()] {
            return None;
        }
        state.halted[role.index()] = true;
        self.emergency_stop.store(true, Ordering::Release);
        Some(state.incident)
    }

    /// Latest incident id allocated.
    pub fn current_incident(&self) -> IncidentId {
        self.guard().incident
    }

    /// Clear `role`'s halt.
    ///
    /// If that leaves no worker halted, the emergency flag drops and the
    /// waiter count is read and zeroed in the same critical section; the
    /// caller must release exactly that many emergency-clear units.
    pub(crate) fn clear_halt(&self, role: WorkerRole) -> Option<u32> {
        let mut state = self.guard();
        state.halted[role.index()] = false;
        if state.any_halted() {
            return None;
        }
        self.emergency_stop.store(false, Ordering::Release);
        Some(std::mem::take(&mut state.emergency_waiters))
    }

    /// Count the caller as an emergency waiter if the lift is halted.
    ///
    /// Returns `false` (and counts nothing) if the lift is running.
    pub(crate) fn register_emergency_waiter(&self) -> bool {
        let mut state = self.guard();
        if !self.emergency_stop.load(Ordering::Acquire) {
            return false;
        }
        state.emergency_waiters += 1;
        true
    }

    /// Actors currently blocked awaiting emergency clearance.
    pub fn emergency_waiters(&self) -> u32 {
        self.guard().emergency_waiters
    }

    // ── Pause bookkeeping ─────────────────────────────────────────

    /// Whether the simulation is suspended.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Suspend. Returns `true` if this call changed the state.
    pub(crate) fn set_paused(&self) -> bool {
        let _state = self.guard();
        !self.paused.swap(true, Ordering::AcqRel)
    }

    /// Resume. Returns the pause-waiter count to release, read and zeroed
    /// under the guard, or `None` if not paused.
    pub(crate) fn clear_paused(&self) -> Option<u32> {
        let mut state = self.guard();
        if !self.paused.swap(false, Ordering::AcqRel) {
            return None;
        }
        Some(std::mem::take(&mut state.pause_waiters))
    }

    /// Count the caller as a pause waiter if paused.
    pub(crate) fn register_pause_waiter(&self) -> bool {
        let mut state = self.guard();
        if !self.paused.load(Ordering::Acquire) {
            return false;
        }
        state.pause_waiters += 1;
        true
    }

    /// Actors currently blocked awaiting resume.
    pub fn pause_waiters(&self) -> u32 {
        self.guard().pause_waiters
    }

    // ── Station occupancy ─────────────────────────────────────────

    /// Slots currently occupied in the waiting area.
    pub fn lower_station_count(&self) -> u32 {
        self.guard().lower_station_count
    }

    /// Add `slots` to the waiting area. The station pool already bounds
    /// this; the count mirrors it for reporting.
    pub(crate) fn station_enter(&self, slots: u32) -> u32 {
        let mut state = self.guard();
        state.lower_station_count += slots;
        debug_assert!(state.lower_station_count <= self.station_capacity);
        state.lower_station_count
    }

    /// Remove `slots` from the waiting area.
    pub(crate) fn station_leave(&self, slots: u32) -> u32 {
        let mut state = self.guard();
        debug_assert!(state.lower_station_count >= slots);
        state.lower_station_count = state.lower_station_count.saturating_sub(slots);
        state.lower_station_count
    }

    // ── Entry log ─────────────────────────────────────────────────

    /// Append a tourist's entry record. Each id may be recorded once.
    pub fn record_entry(&self, record: EntryRecord) -> Result<(), RegionError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let capacity = entries.len();
        let slot = entries
            .get_mut(record.tourist_id.0 as usize)
            .ok_or(RegionError::EntryLogFull { capacity })?;
        if slot.is_some() {
            return Err(RegionError::DuplicateEntry {
                tourist_id: record.tourist_id.0,
            });
        }
        *slot = Some(record);
        Ok(())
    }

    /// Count one completed ride for `tourist`, if it has an entry record.
    pub fn record_ride(&self, tourist: TouristId) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(Some(record)) = entries.get_mut(tourist.0 as usize) {
            record.rides += 1;
        }
    }

    /// All entry records, in tourist-id order.
    pub fn entries(&self) -> Vec<EntryRecord> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .flatten()
            .cloned()
            .collect()
    }

    // ── Statistics ────────────────────────────────────────────────

    pub(crate) fn note_dispatch(&self, riders: u64) {
        self.stats.chairs_dispatched.fetch_add(1, Ordering::Relaxed);
        self.stats.riders_confirmed.fetch_add(riders, Ordering::Relaxed);
    }

    pub(crate) fn note_arrival(&self) {
        self.stats.riders_arrived.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy of the run statistics.
    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            chairs_dispatched: self.stats.chairs_dispatched.load(Ordering::Relaxed),
            riders_confirmed: self.stats.riders_confirmed.load(Ordering::Relaxed),
            riders_arrived: self.stats.riders_arrived.load(Ordering::Relaxed),
            incidents_lower: self.stats.incidents[WorkerRole::Lower.index()]
                .load(Ordering::Relaxed),
            incidents_upper: self.stats.incidents[WorkerRole::Upper.index()]
                .load(Ordering::Relaxed),
            sim_time_ms: self.now_ms(),
        }
    }
}

impl std::fmt::Debug for SharedRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedRegion")
            .field("running", &self.is_running())
            .field("closing", &self.is_closing())
            .field("emergency_stop", &self.is_emergency_stopped())
            .field("paused", &self.is_paused())
            .field("now_ms", &self.now_ms())
            .finish_non_exhaustive()
    }
}

/// Convert simulated minutes to whole simulated milliseconds.
pub fn minutes_to_ms(minutes: f64) -> u64 {
    (minutes * MS_PER_MINUTE).round().max(0.0) as u64
}
