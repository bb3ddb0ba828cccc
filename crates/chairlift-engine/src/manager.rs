//! Substrate lifecycle: build, register, attach, destroy.
//!
//! A [`Substrate`] bundles the shared region with every resource pool,
//! mailbox and platform interrupt line of one run. The
//! [`ResourceManager`] builds it in one step, registers it under its
//! [`ResortKey`] so other components can [`attach`](ResourceManager::attach),
//! and tears it down exactly once.
//!
//! # Teardown
//!
//! [`Substrate::destroy`] is one atomic swap followed by closing every
//! primitive. It takes no locks beyond the primitives' own and is safe to
//! call from any thread, any number of times. Every call blocked on a
//! pool or mailbox returns `Closed`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};
use std::time::Duration;

use chairlift_core::{
    ArrivalNotification, BoardingConfirmation, BoardingRequest, CashierRequest, CashierResponse,
    Handshake, PoolError, ResortKey, StartupError, WorkerRole,
};
use chairlift_sync::{InterruptKind, InterruptLine, InterruptTable, Interruptible, Mailbox, ResourcePool};
use tracing::{debug, trace};

use crate::config::ResortConfig;
use crate::region::SharedRegion;
use crate::{RideError, Stopped};

// ── Pool names ─────────────────────────────────────────────────────

/// Every resource pool a substrate owns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PoolName {
    /// Waiting-area slots at the lower station.
    Station,
    /// Gates into the resort.
    EntryGates,
    /// Gates onto the lower platform.
    PlatformGates,
    /// Gates leaving the upper platform.
    ExitGates,
    /// Chairs currently on the cable.
    ChairsInFlight,
    /// Capacity-1 lock held by the incident initiator.
    EmergencyLock,
    /// Bulk wakeup for emergency waiters.
    EmergencyClear,
    /// Bulk wakeup for pause waiters.
    PauseClear,
}

impl PoolName {
    /// Every pool, in teardown order.
    pub const ALL: [PoolName; 8] = [
        PoolName::Station,
        PoolName::EntryGates,
        PoolName::PlatformGates,
        PoolName::ExitGates,
        PoolName::ChairsInFlight,
        PoolName::EmergencyLock,
        PoolName::EmergencyClear,
        PoolName::PauseClear,
    ];
}

// ── Substrate ──────────────────────────────────────────────────────

/// Everything actors share for one run.
pub struct Substrate {
    key: ResortKey,
    region: SharedRegion,
    station: ResourcePool,
    entry_gates: ResourcePool,
    platform_gates: ResourcePool,
    exit_gates: ResourcePool,
    chairs_in_flight: ResourcePool,
    emergency_lock: ResourcePool,
    emergency_clear: ResourcePool,
    pause_clear: ResourcePool,
    boarding: Arc<Mailbox<BoardingRequest>>,
    confirmations: Mailbox<BoardingConfirmation>,
    arrivals: Arc<Mailbox<ArrivalNotification>>,
    cashier_requests: Mailbox<CashierRequest>,
    cashier_responses: Mailbox<CashierResponse>,
    handshakes: Arc<Mailbox<Handshake>>,
    lines: [InterruptLine; 2],
    poll: Duration,
    destroyed: AtomicBool,
}

// Compile-time assertion: Substrate must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<Substrate>();
};

impl Substrate {
    fn new(config: &ResortConfig) -> Self {
        let boarding = Arc::new(Mailbox::new("boarding"));
        let arrivals = Arc::new(Mailbox::new("arrivals"));
        let handshakes = Arc::new(Mailbox::new("handshakes"));

        // Each platform worker parks on its own inbox and the handshake
        // mailbox; a delivery must wake both.
        let line = |role: WorkerRole, inbox: Arc<dyn Interruptible>| {
            InterruptLine::new(
                match role {
                    WorkerRole::Lower => "lower-platform",
                    WorkerRole::Upper => "upper-platform",
                },
                InterruptTable::recording(&InterruptKind::ALL),
                vec![inbox, handshakes.clone() as Arc<dyn Interruptible>],
            )
        };
        let lines = [
            line(WorkerRole::Lower, boarding.clone() as Arc<dyn Interruptible>),
            line(WorkerRole::Upper, arrivals.clone() as Arc<dyn Interruptible>),
        ];

        Self {
            key: config.resort_key.clone(),
            region: SharedRegion::new(
                config.sim_params(),
                config.station_capacity,
                config.max_tourists,
            ),
            station: ResourcePool::bounded("station", config.station_capacity),
            entry_gates: ResourcePool::bounded("entry-gates", config.entry_gates),
            platform_gates: ResourcePool::bounded("platform-gates", config.platform_gates),
            exit_gates: ResourcePool::bounded("exit-gates", config.exit_gates),
            chairs_in_flight: ResourcePool::bounded(
                "chairs-in-flight",
                config.max_chairs_in_flight,
            ),
            emergency_lock: ResourcePool::bounded("emergency-lock", 1),
            emergency_clear: ResourcePool::wakeup("emergency-clear"),
            pause_clear: ResourcePool::wakeup("pause-clear"),
            boarding,
            confirmations: Mailbox::new("confirmations"),
            arrivals,
            cashier_requests: Mailbox::new("cashier-requests"),
            cashier_responses: Mailbox::new("cashier-responses"),
            handshakes,
            lines,
            poll: Duration::from_millis(config.poll_ms),
            destroyed: AtomicBool::new(false),
        }
    }

    /// Registry key.
    pub fn key(&self) -> &ResortKey {
        &self.key
    }

    /// The shared region.
    pub fn region(&self) -> &SharedRegion {
        &self.region
    }

    /// Look up a pool by name.
    pub fn pool(&self, name: PoolName) -> &ResourcePool {
        match name {
            PoolName::Station => &self.station,
            PoolName::EntryGates => &self.entry_gates,
            PoolName::PlatformGates => &self.platform_gates,
            PoolName::ExitGates => &self.exit_gates,
            PoolName::ChairsInFlight => &self.chairs_in_flight,
            PoolName::EmergencyLock => &self.emergency_lock,
            PoolName::EmergencyClear => &self.emergency_clear,
            PoolName::PauseClear => &self.pause_clear,
        }
    }

    /// Boarding requests for the lower platform.
    pub fn boarding(&self) -> &Mailbox<BoardingRequest> {
        &self.boarding
    }

    /// Boarding confirmations, tagged by tourist id.
    pub fn confirmations(&self) -> &Mailbox<BoardingConfirmation> {
        &self.confirmations
    }

    /// Arrivals for the upper platform.
    pub fn arrivals(&self) -> &Mailbox<ArrivalNotification> {
        &self.arrivals
    }

    /// Requests to the cashier.
    pub fn cashier_requests(&self) -> &Mailbox<CashierRequest> {
        &self.cashier_requests
    }

    /// Cashier responses, tagged by response base plus tourist id.
    pub fn cashier_responses(&self) -> &Mailbox<CashierResponse> {
        &self.cashier_responses
    }

    /// Worker-to-worker handshakes, tagged by destination role.
    pub fn handshakes(&self) -> &Mailbox<Handshake> {
        &self.handshakes
    }

    /// Interrupt line of one platform worker.
    pub fn line(&self, role: WorkerRole) -> &InterruptLine {
        &self.lines[role.index()]
    }

    /// Real-time slice between pending-flag checks.
    pub fn poll_interval(&self) -> Duration {
        self.poll
    }

    /// Whether [`destroy`](Self::destroy) has run.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    // ── Client operations ──────────────────────────────────────────

    /// Block while the lift is halted.
    ///
    /// Registers as an emergency waiter under the state guard, then parks
    /// on the emergency-clear pool until the resume's bulk release. Loops
    /// because a new incident may begin between the wakeup and the
    /// caller's next step.
    pub fn await_emergency_clear(&self) -> Result<(), Stopped> {
        while self.region.register_emergency_waiter() {
            self.emergency_clear.acquire_interruptible(1)?;
        }
        if self.is_destroyed() {
            return Err(Stopped);
        }
        Ok(())
    }

    /// Block while the simulation is suspended. Same pattern as
    /// [`await_emergency_clear`](Self::await_emergency_clear).
    pub fn await_unpaused(&self) -> Result<(), Stopped> {
        while self.region.register_pause_waiter() {
            self.pause_clear.acquire_interruptible(1)?;
        }
        if self.is_destroyed() {
            return Err(Stopped);
        }
        Ok(())
    }

    /// Take `slots` of waiting-area capacity.
    ///
    /// Refused with [`RideError::Stopped`] once the resort is closing, and
    /// with [`RideError::Refused`] for a party larger than the station.
    pub fn enter_station(&self, slots: u32) -> Result<(), RideError> {
        if self.region.is_closing() {
            return Err(RideError::Stopped);
        }
        self.station.acquire_interruptible(slots)?;
        if self.region.is_closing() {
            // Closed while we were queued; hand the slots back.
            let _ = self.station.release(slots);
            return Err(RideError::Stopped);
        }
        self.region.station_enter(slots);
        Ok(())
    }

    /// Give back `slots` of waiting-area capacity.
    pub fn leave_station(&self, slots: u32) -> Result<(), PoolError> {
        self.region.station_leave(slots);
        self.station.release(slots)
    }

    /// Wait for `minutes` of simulated time on this substrate's clock.
    pub fn sleep_sim_minutes(&self, minutes: f64) -> Result<(), Stopped> {
        self.region.sleep_sim_minutes(minutes, self.poll)
    }

    // ── Teardown ───────────────────────────────────────────────────

    /// Destroy every primitive, waking all blocked calls.
    ///
    /// Returns `true` for the call that performed the teardown.
    pub fn destroy(&self) -> bool {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.region.stop_running();
        for line in &self.lines {
            line.deliver(InterruptKind::Shutdown);
        }
        for name in PoolName::ALL {
            self.pool(name).close();
        }
        self.boarding.close();
        self.confirmations.close();
        self.arrivals.close();
        self.cashier_requests.close();
        self.cashier_responses.close();
        self.handshakes.close();
        trace!(key = %self.key, "substrate destroyed");
        true
    }
}

impl std::fmt::Debug for Substrate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Substrate")
            .field("key", &self.key)
            .field("region", &self.region)
            .field("destroyed", &self.is_destroyed())
            .finish_non_exhaustive()
    }
}

// ── Registry ───────────────────────────────────────────────────────

type Registry = Mutex<HashMap<ResortKey, Weak<Substrate>>>;

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Owner of one substrate's lifecycle.
///
/// Dropping the manager destroys the substrate.
#[derive(Debug)]
pub struct ResourceManager {
    substrate: Arc<Substrate>,
}

impl ResourceManager {
    /// Validate `config`, build a substrate and register it.
    ///
    /// Fails with [`StartupError::AlreadyExists`] if a live substrate is
    /// registered under the same key, and with [`StartupError::Config`]
    /// if validation fails. Nothing is registered on failure.
    pub fn create(config: &ResortConfig) -> Result<Self, StartupError> {
        config.validate().map_err(|e| StartupError::Config {
            reason: e.to_string(),
        })?;
        let mut registry = registry().lock().unwrap_or_else(PoisonError::into_inner);
        let live = registry
            .get(&config.resort_key)
            .and_then(Weak::upgrade)
            .is_some_and(|s| !s.is_destroyed());
        if live {
            return Err(StartupError::AlreadyExists {
                key: config.resort_key.clone(),
            });
        }
        let substrate = Arc::new(Substrate::new(config));
        registry.insert(config.resort_key.clone(), Arc::downgrade(&substrate));
        debug!(key = %config.resort_key, "substrate created");
        Ok(Self { substrate })
    }

    /// Look up a live substrate by key.
    pub fn attach(key: &ResortKey) -> Result<Arc<Substrate>, StartupError> {
        let registry = registry().lock().unwrap_or_else(PoisonError::into_inner);
        registry
            .get(key)
            .and_then(Weak::upgrade)
            .filter(|s| !s.is_destroyed())
            .ok_or_else(|| StartupError::NotFound { key: key.clone() })
    }

    /// The managed substrate.
    pub fn substrate(&self) -> &Arc<Substrate> {
        &self.substrate
    }

    /// Destroy the substrate and unregister it. Idempotent.
    ///
    /// Returns `true` for the call that performed the teardown.
    pub fn destroy(&self) -> bool {
        let first = self.substrate.destroy();
        if first {
            let mut registry = registry().lock().unwrap_or_else(PoisonError::into_inner);
            // Only remove our own entry; the key may already be reused.
            let ours = registry
                .get(self.substrate.key())
                .is_some_and(|w| std::ptr::eq(w.as_ptr(), Arc::as_ptr(&self.substrate)));
            if ours {
                registry.remove(self.substrate.key());
            }
        }
        first
    }
}

impl Drop for ResourceManager {
    fn drop(&mut self) {
        self.destroy();
    }
}
