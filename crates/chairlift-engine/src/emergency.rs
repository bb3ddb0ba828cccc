//! Two-party emergency-stop protocol.
//!
//! Both platform workers own an [`EmergencyCoordinator`] and call into it
//! from their main loops. The coordinator runs a whole incident inline,
//! so a worker that returns from [`check`](EmergencyCoordinator::check)
//! or [`poll`](EmergencyCoordinator::poll) always finds the lift running
//! (or the substrate gone).
//!
//! # Roles
//!
//! - **Initiator**: the worker whose danger check tripped *and* won the
//!   non-blocking acquire of the capacity-1 emergency lock. It allocates
//!   the incident id, halts the lift, notifies the peer out-of-band,
//!   waits out the incident duration in simulated time, then runs the
//!   `ReadyToResume` / `IAmReady` handshake. It clears its halt last,
//!   releases the lock and bulk-releases every emergency waiter.
//! - **Receiver**: the other worker. It joins the incident (only while
//!   the initiator is still halted), waits for `ReadyToResume`, clears its
//!   own halt, and answers `IAmReady`. It never touches the lock.
//!
//! A worker whose own check trips while the lock is held falls through
//! to the receiver path. Because the receiver clears before answering,
//! the initiator's clear is always the one that empties the halt set,
//! so exactly one bulk wakeup happens per incident.

use std::sync::Arc;
use std::thread;

use chairlift_core::{Handshake, HandshakeKind, IncidentId, MailboxError, PoolError, WorkerRole};
use chairlift_sync::{InterruptKind, Selector};
use tracing::{info, warn};

use crate::danger::DangerCheck;
use crate::manager::{PoolName, Substrate};
use crate::Stopped;

/// Where a coordinator is in the protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmergencyState {
    /// No incident in progress for this worker.
    Idle,
    /// Running an incident this worker detected.
    Initiator,
    /// Participating in an incident the peer detected.
    Receiver,
    /// Handshake done or in progress, about to clear.
    Resuming,
}

/// What a call into the coordinator did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Nothing happened.
    Quiet,
    /// This worker ran an incident as initiator.
    Initiated(IncidentId),
    /// This worker ran an incident as receiver.
    Joined(IncidentId),
}

/// Per-worker protocol state.
pub struct EmergencyCoordinator {
    role: WorkerRole,
    substrate: Arc<Substrate>,
    danger: DangerCheck,
    state: EmergencyState,
    last_joined: IncidentId,
    initiated: u32,
    joined: u32,
}

impl EmergencyCoordinator {
    /// Coordinator for `role`; `seed` feeds its danger check.
    pub fn new(role: WorkerRole, substrate: Arc<Substrate>, seed: u64) -> Self {
        let danger = DangerCheck::new(seed, role, substrate.region().params());
        Self {
            role,
            substrate,
            danger,
            state: EmergencyState::Idle,
            last_joined: IncidentId::default(),
            initiated: 0,
            joined: 0,
        }
    }

    /// Incidents run so far as `(initiator, receiver)`.
    pub fn tally(&self) -> (u32, u32) {
        (self.initiated, self.joined)
    }

    /// The worker this coordinator serves.
    pub fn role(&self) -> WorkerRole {
        self.role
    }

    /// Current protocol state.
    pub fn state(&self) -> EmergencyState {
        self.state
    }

    /// Whether a notification is pending or the lift is halted.
    pub fn needs_attention(&self) -> bool {
        self.substrate
            .line(self.role)
            .is_pending(InterruptKind::EmergencyStop)
            || self.substrate.region().is_emergency_stopped()
    }

    /// [`Stopped`] if a shutdown is pending or the run has ended.
    pub fn check_shutdown(&self) -> Result<(), Stopped> {
        if self.substrate.line(self.role).is_pending(InterruptKind::Shutdown)
            || !self.substrate.region().is_running()
        {
            return Err(Stopped);
        }
        Ok(())
    }

    /// Service pending notifications without rolling for danger.
    ///
    /// Joins the peer's incident if there is one to join, then waits
    /// until the lift is clear.
    pub fn poll(&mut self) -> Result<Resolution, Stopped> {
        self.check_shutdown()?;
        let mut resolution = Resolution::Quiet;
        loop {
            self.substrate.line(self.role).take(InterruptKind::EmergencyStop);
            if let Some(incident) = self.try_join() {
                resolution = Resolution::Joined(self.run_receiver(incident)?);
                continue;
            }
            if !self.substrate.region().is_emergency_stopped() {
                return Ok(resolution);
            }
            // The peer is finishing an incident we already answered.
            thread::sleep(self.substrate.poll_interval());
            self.check_shutdown()?;
        }
    }

    /// Service notifications, then roll for danger once.
    pub fn check(&mut self) -> Result<Resolution, Stopped> {
        let serviced = self.poll()?;
        if serviced != Resolution::Quiet {
            return Ok(serviced);
        }
        let region = self.substrate.region();
        if region.is_paused() || !self.danger.roll(region.now_minutes()) {
            return Ok(Resolution::Quiet);
        }
        self.detected()
    }

    /// Local danger detected: race for the emergency lock.
    fn detected(&mut self) -> Result<Resolution, Stopped> {
        match self.substrate.pool(PoolName::EmergencyLock).try_acquire(1) {
            Ok(()) => Ok(Resolution::Initiated(self.run_initiator()?)),
            Err(PoolError::WouldBlock) => {
                // Lost the race. Join if the winner has already halted.
                match self.try_join() {
                    Some(incident) => Ok(Resolution::Joined(self.run_receiver(incident)?)),
                    None => self.poll(),
                }
            }
            Err(_) => Err(Stopped),
        }
    }

    fn try_join(&self) -> Option<IncidentId> {
        self.substrate
            .region()
            .join_incident(self.role, self.last_joined)
    }

    // ── Initiator ──────────────────────────────────────────────────

    fn run_initiator(&mut self) -> Result<IncidentId, Stopped> {
        let region = self.substrate.region();
        let incident = region.begin_incident(self.role);
        self.state = EmergencyState::Initiator;
        info!(role = %self.role, %incident, "emergency stop initiated");
        self.substrate
            .line(self.role.peer())
            .deliver(InterruptKind::EmergencyStop);

        let start = region.now_minutes();
        let duration = region.params().danger_duration_sim;
        while region.now_minutes() - start < duration {
            self.check_shutdown()?;
            thread::sleep(self.substrate.poll_interval());
        }

        self.state = EmergencyState::Resuming;
        self.send(HandshakeKind::ReadyToResume, incident)?;
        self.await_handshake(HandshakeKind::IAmReady, incident)?;

        let waiters = region.clear_halt(self.role);
        self.substrate.pool(PoolName::EmergencyLock).release(1)?;
        let released = waiters.unwrap_or(0);
        self.substrate
            .pool(PoolName::EmergencyClear)
            .release(released)?;

        self.danger.incident_ended(region.now_minutes());
        self.state = EmergencyState::Idle;
        self.initiated += 1;
        info!(role = %self.role, %incident, released, "lift resumed");
        Ok(incident)
    }

    // ── Receiver ───────────────────────────────────────────────────

    fn run_receiver(&mut self, incident: IncidentId) -> Result<IncidentId, Stopped> {
        self.state = EmergencyState::Receiver;
        info!(role = %self.role, %incident, "joined emergency stop");
        self.await_handshake(HandshakeKind::ReadyToResume, incident)?;

        self.state = EmergencyState::Resuming;
        self.substrate.line(self.role).take(InterruptKind::EmergencyStop);
        let region = self.substrate.region();
        if let Some(waiters) = region.clear_halt(self.role) {
            // Only reachable if the initiator already cleared.
            self.substrate
                .pool(PoolName::EmergencyClear)
                .release(waiters)?;
        }
        self.send(HandshakeKind::IAmReady, incident)?;

        self.last_joined = incident;
        self.danger.incident_ended(region.now_minutes());
        self.state = EmergencyState::Idle;
        self.joined += 1;
        Ok(incident)
    }

    // ── Handshake plumbing ─────────────────────────────────────────

    fn send(&self, kind: HandshakeKind, incident: IncidentId) -> Result<(), Stopped> {
        self.substrate.handshakes().send(
            self.role.peer().tag(),
            Handshake {
                kind,
                from: self.role,
                incident,
            },
        )?;
        Ok(())
    }

    /// Wait for the peer's next handshake.
    ///
    /// An unexpected kind or incident is logged and accepted: the message
    /// still proves the peer reached its side of the exchange.
    fn await_handshake(
        &self,
        expected: HandshakeKind,
        incident: IncidentId,
    ) -> Result<Handshake, Stopped> {
        let mailbox = self.substrate.handshakes();
        loop {
            self.check_shutdown()?;
            match mailbox.receive_timeout(
                Selector::Exact(self.role.tag()),
                self.substrate.poll_interval(),
            ) {
                Ok(envelope) => {
                    let msg = envelope.payload;
                    if msg.kind != expected || msg.incident != incident {
                        warn!(
                            role = %self.role,
                            ?expected,
                            got = ?msg.kind,
                            %incident,
                            got_incident = %msg.incident,
                            "unexpected handshake, continuing"
                        );
                    }
                    return Ok(msg);
                }
                Err(MailboxError::Closed) => return Err(Stopped),
                Err(_) => continue,
            }
        }
    }
}

impl std::fmt::Debug for EmergencyCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmergencyCoordinator")
            .field("role", &self.role)
            .field("state", &self.state)
            .field("last_joined", &self.last_joined)
            .finish_non_exhaustive()
    }
}
