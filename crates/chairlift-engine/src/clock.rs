//! The pause-consistent simulated clock.
//!
//! [`TimeService`] is the only writer of the shared clock. It owns a
//! [`ClockState`] exclusively, wakes every `clock_tick_ms` (the timeout
//! of its control-channel receive), and publishes simulated milliseconds
//! into the [`SharedRegion`](crate::region::SharedRegion). Suspend and
//! resume arrive over the same channel, so state changes and ticks are
//! serialized on one thread without a lock. Nothing is published while
//! the region is flagged paused, even before the matching `Suspend` has
//! been received.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use tracing::{debug, info};

use crate::config::SimParams;
use crate::manager::Substrate;
use crate::region::minutes_to_ms;

/// Control messages from the orchestrator to the time service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClockControl {
    /// Freeze the clock.
    Suspend,
    /// Unfreeze the clock; the frozen interval is never counted.
    Resume,
    /// Stop the service loop.
    Shutdown,
}

// ── ClockState ─────────────────────────────────────────────────────

/// Real-to-simulated time conversion with pause accounting.
#[derive(Clone, Debug)]
pub struct ClockState {
    real_start: Instant,
    pause_offset: Duration,
    pause_start: Option<Instant>,
    time_acceleration: f64,
    sim_start_minutes: f64,
}

impl ClockState {
    /// A running clock whose simulated time is `sim_start_minutes` at
    /// `real_start`.
    pub fn new(real_start: Instant, params: &SimParams) -> Self {
        Self {
            real_start,
            pause_offset: Duration::ZERO,
            pause_start: None,
            time_acceleration: params.time_acceleration,
            sim_start_minutes: params.sim_start_minutes,
        }
    }

    /// Freeze at `at`. Returns `false` if already suspended.
    pub fn suspend(&mut self, at: Instant) -> bool {
        if self.pause_start.is_some() {
            return false;
        }
        self.pause_start = Some(at);
        true
    }

    /// Unfreeze at `at`, adding the frozen interval to the pause offset.
    /// Returns `false` if not suspended.
    pub fn resume(&mut self, at: Instant) -> bool {
        match self.pause_start.take() {
            Some(start) => {
                self.pause_offset += at.saturating_duration_since(start);
                true
            }
            None => false,
        }
    }

    /// Whether the clock is frozen.
    pub fn is_suspended(&self) -> bool {
        self.pause_start.is_some()
    }

    /// Total real time excluded so far by completed pauses.
    pub fn pause_offset(&self) -> Duration {
        self.pause_offset
    }

    /// Real time that counts towards the simulation, clamped at zero.
    pub fn effective_elapsed(&self, at: Instant) -> Duration {
        let current_pause = self
            .pause_start
            .map_or(Duration::ZERO, |start| at.saturating_duration_since(start));
        at.saturating_duration_since(self.real_start)
            .saturating_sub(self.pause_offset)
            .saturating_sub(current_pause)
    }

    /// Simulated minutes at real instant `at`.
    pub fn sim_minutes(&self, at: Instant) -> f64 {
        self.sim_start_minutes + self.effective_elapsed(at).as_secs_f64() * self.time_acceleration
    }
}

// ── TimeService ────────────────────────────────────────────────────

/// The clock actor.
pub struct TimeService {
    substrate: Arc<Substrate>,
    clock: ClockState,
    tick: Duration,
    control: Receiver<ClockControl>,
}

impl TimeService {
    /// Build the service; the clock starts counting now.
    pub fn new(substrate: Arc<Substrate>, control: Receiver<ClockControl>, tick: Duration) -> Self {
        let clock = ClockState::new(Instant::now(), substrate.region().params());
        Self {
            substrate,
            clock,
            tick,
            control,
        }
    }

    /// Run until told to stop, the channel disconnects, or the substrate
    /// stops running. Returns the final clock state.
    pub fn run(mut self) -> ClockState {
        info!(
            tick_ms = self.tick.as_millis() as u64,
            acceleration = self.clock.time_acceleration,
            "time service started"
        );
        loop {
            match self.control.recv_timeout(self.tick) {
                Ok(ClockControl::Suspend) => {
                    if self.clock.suspend(Instant::now()) {
                        debug!("clock suspended");
                    }
                }
                Ok(ClockControl::Resume) => {
                    if self.clock.resume(Instant::now()) {
                        debug!(
                            pause_offset_ms = self.clock.pause_offset().as_millis() as u64,
                            "clock resumed"
                        );
                    }
                }
                Ok(ClockControl::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {}
            }
            if !self.substrate.region().is_running() {
                break;
            }
            self.publish(Instant::now());
        }
        info!(sim_minutes = self.substrate.region().now_minutes(), "time service stopped");
        self.clock
    }

    fn publish(&self, at: Instant) {
        let region = self.substrate.region();
        if region.is_paused() {
            return;
        }
        let minutes = self.clock.sim_minutes(at);
        region.publish_sim_time_ms(minutes_to_ms(minutes));
        if minutes >= region.params().sim_end_minutes && region.begin_closing() {
            info!(sim_minutes = minutes, "closing time reached");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResortConfig;
    use crate::manager::ResourceManager;
    use std::thread;

    fn params(acceleration: f64) -> SimParams {
        SimParams {
            time_acceleration: acceleration,
            ..ResortConfig::default().sim_params()
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn running_clock_advances_by_acceleration() {
        let t0 = Instant::now();
        let clock = ClockState::new(t0, &params(2.0));
        assert!(approx(clock.sim_minutes(t0), 480.0));
        assert!(approx(clock.sim_minutes(t0 + Duration::from_secs(3)), 486.0));
    }

    #[test]
    fn paused_interval_is_excluded() {
        // 2x acceleration; suspended from 1s to 4s of real time.
        let t0 = Instant::now();
        let mut clock = ClockState::new(t0, &params(2.0));
        assert!(clock.suspend(t0 + Duration::from_secs(1)));
        assert!(!clock.suspend(t0 + Duration::from_secs(2)));

        // Frozen at the suspend point while paused.
        assert!(approx(clock.sim_minutes(t0 + Duration::from_secs(3)), 482.0));

        assert!(clock.resume(t0 + Duration::from_secs(4)));
        assert!(!clock.resume(t0 + Duration::from_secs(4)));
        assert_eq!(clock.pause_offset(), Duration::from_secs(3));

        // 6s real, 3s effective.
        assert_eq!(
            clock.effective_elapsed(t0 + Duration::from_secs(6)),
            Duration::from_secs(3)
        );
        assert!(approx(clock.sim_minutes(t0 + Duration::from_secs(6)), 486.0));
    }

    #[test]
    fn elapsed_clamps_at_zero() {
        let t0 = Instant::now();
        let later = t0 + Duration::from_secs(5);
        let clock = ClockState::new(later, &params(1.0));
        assert_eq!(clock.effective_elapsed(t0), Duration::ZERO);
        assert!(approx(clock.sim_minutes(t0), 480.0));
    }

    #[test]
    fn service_publishes_freezes_and_stops() {
        // 600 simulated minutes in 6 real seconds: 100 per second.
        let config = ResortConfig {
            real_duration_secs: 6.0,
            clock_tick_ms: 2,
            ..ResortConfig::default()
        };
        let manager = ResourceManager::create(&config).unwrap();
        let (tx, rx) = crossbeam_channel::bounded(4);
        let service = TimeService::new(Arc::clone(manager.substrate()), rx, Duration::from_millis(2));
        let handle = thread::spawn(move || service.run());
        let region = manager.substrate().region();

        let start = region.now_ms();
        let deadline = Instant::now() + Duration::from_secs(5);
        while region.now_ms() == start {
            assert!(Instant::now() < deadline, "clock never advanced");
            thread::sleep(Duration::from_millis(2));
        }

        tx.send(ClockControl::Suspend).unwrap();
        thread::sleep(Duration::from_millis(20));
        let frozen = region.now_ms();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(region.now_ms(), frozen, "clock moved while suspended");

        tx.send(ClockControl::Resume).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while region.now_ms() == frozen {
            assert!(Instant::now() < deadline, "clock never resumed");
            thread::sleep(Duration::from_millis(2));
        }

        tx.send(ClockControl::Shutdown).unwrap();
        let clock = handle.join().unwrap();
        assert!(clock.pause_offset() >= Duration::from_millis(50));
    }

    #[test]
    fn paused_region_freezes_published_time_before_suspend_arrives() {
        let config = ResortConfig {
            real_duration_secs: 6.0,
            clock_tick_ms: 2,
            ..ResortConfig::default()
        };
        let manager = ResourceManager::create(&config).unwrap();
        let (tx, rx) = crossbeam_channel::bounded(4);
        let service = TimeService::new(Arc::clone(manager.substrate()), rx, Duration::from_millis(2));
        let handle = thread::spawn(move || service.run());
        let region = manager.substrate().region();

        // Flag only; the clock itself is never told to suspend.
        assert!(region.set_paused());
        thread::sleep(Duration::from_millis(20));
        let frozen = region.now_ms();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(region.now_ms(), frozen, "published while paused");

        assert_eq!(region.clear_paused(), Some(0));
        let deadline = Instant::now() + Duration::from_secs(5);
        while region.now_ms() == frozen {
            assert!(Instant::now() < deadline, "clock never moved again");
            thread::sleep(Duration::from_millis(2));
        }

        tx.send(ClockControl::Shutdown).unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn service_sets_closing_at_end_of_day() {
        let config = ResortConfig {
            sim_start_minutes: 0.0,
            sim_end_minutes: 1.0,
            real_duration_secs: 0.05,
            clock_tick_ms: 1,
            ..ResortConfig::default()
        };
        let manager = ResourceManager::create(&config).unwrap();
        let (_tx, rx) = crossbeam_channel::bounded(1);
        let service = TimeService::new(Arc::clone(manager.substrate()), rx, Duration::from_millis(1));
        let handle = thread::spawn(move || service.run());

        let region = manager.substrate().region();
        let deadline = Instant::now() + Duration::from_secs(5);
        while !region.is_closing() {
            assert!(Instant::now() < deadline, "closing never set");
            thread::sleep(Duration::from_millis(2));
        }
        manager.destroy();
        handle.join().unwrap();
    }
}
