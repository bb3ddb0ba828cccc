//! Lower-platform chair dispatcher.
//!
//! The dispatcher alternates between two states. While accumulating it
//! takes boarding requests lowest-tag first and packs them into a
//! [`PendingBatch`]. It dispatches when:
//!
//! - an admit fills the chair exactly;
//! - a request does not fit (the batch leaves first, the request is
//!   requeued under [`Tag::REQUEUED`] and heads the next chair);
//! - no request arrived for `batch_timeout_ms` while the batch is non-empty.
//!
//! Dispatching takes one chairs-in-flight unit, stamps one trip id,
//! departure time and chair id, and confirms every buffered tourist
//! individually with identical values. Chair ids wrap over the fleet and
//! may repeat while an earlier trip is still out; trip ids never repeat.
//!
//! Danger is checked after every admitted request and before the chair
//! it completes leaves, so a trip raised on that admit holds the chair.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chairlift_core::{
    BoardingConfirmation, BoardingRequest, ChairId, MailboxError, PoolError, Tag, TouristId,
    TripId, WorkerRole, CHAIR_CAPACITY,
};
use chairlift_sync::Selector;
use smallvec::SmallVec;
use tracing::{debug, info, warn};

use crate::config::ResortConfig;
use crate::emergency::EmergencyCoordinator;
use crate::manager::{PoolName, Substrate};
use crate::platform::WorkerReport;
use crate::Stopped;

// ── PendingBatch ───────────────────────────────────────────────────

/// One tourist waiting in the pending batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchEntry {
    /// Who boards.
    pub tourist_id: TouristId,
    /// Slots the tourist and companions take.
    pub slots: u8,
}

/// Result of offering a request to the batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    /// Buffered; the chair still has room.
    Buffered,
    /// Buffered; the chair is now exactly full.
    Full,
    /// Does not fit; the request is handed back untouched.
    Rejected(BoardingRequest),
}

/// Tourists accumulated for the next chair.
///
/// Invariant: `slots()` never exceeds [`CHAIR_CAPACITY`].
#[derive(Clone, Debug, Default)]
pub struct PendingBatch {
    entries: SmallVec<[BatchEntry; CHAIR_CAPACITY as usize]>,
    slots: u8,
}

impl PendingBatch {
    /// An empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer `request` to the batch.
    pub fn try_admit(&mut self, request: BoardingRequest) -> Admission {
        let needed = request.slots_needed;
        if needed == 0 || self.slots.saturating_add(needed) > CHAIR_CAPACITY {
            return Admission::Rejected(request);
        }
        self.entries.push(BatchEntry {
            tourist_id: request.tourist_id,
            slots: needed,
        });
        self.slots += needed;
        if self.slots == CHAIR_CAPACITY {
            Admission::Full
        } else {
            Admission::Buffered
        }
    }

    /// Empty the batch, returning what it held.
    pub fn take(&mut self) -> SmallVec<[BatchEntry; CHAIR_CAPACITY as usize]> {
        self.slots = 0;
        std::mem::take(&mut self.entries)
    }

    /// Buffered tourists.
    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    /// Slots taken so far.
    pub fn slots(&self) -> u8 {
        self.slots
    }

    /// Number of buffered tourists.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ── ChairDispatcher ────────────────────────────────────────────────

/// The lower platform worker.
pub struct ChairDispatcher {
    substrate: Arc<Substrate>,
    emergency: EmergencyCoordinator,
    batch: PendingBatch,
    last_admit: Instant,
    batch_timeout: Duration,
    next_chair: ChairId,
    next_trip: TripId,
    fleet_size: u32,
    chairs: u64,
}

impl ChairDispatcher {
    /// Build the dispatcher for `substrate`.
    pub fn new(substrate: Arc<Substrate>, config: &ResortConfig) -> Self {
        let emergency = EmergencyCoordinator::new(WorkerRole::Lower, Arc::clone(&substrate), config.seed);
        Self {
            substrate,
            emergency,
            batch: PendingBatch::new(),
            last_admit: Instant::now(),
            batch_timeout: Duration::from_millis(config.batch_timeout_ms),
            next_chair: ChairId(0),
            next_trip: TripId(0),
            fleet_size: config.fleet_size,
            chairs: 0,
        }
    }

    /// Run until the substrate shuts down.
    pub fn run(mut self) -> WorkerReport {
        info!(role = %WorkerRole::Lower, "platform worker started");
        while self.step().is_ok() {}
        let (initiated, joined) = self.emergency.tally();
        info!(
            role = %WorkerRole::Lower,
            chairs = self.chairs,
            stranded = self.batch.len(),
            "platform worker stopped"
        );
        WorkerReport {
            role: WorkerRole::Lower,
            chairs: self.chairs,
            initiated,
            joined,
        }
    }

    /// One receive-and-react iteration.
    pub fn step(&mut self) -> Result<(), Stopped> {
        let wait = self.receive_window();
        match self
            .substrate
            .boarding()
            .receive_timeout(Selector::Lowest, wait)
        {
            Ok(envelope) => self.on_request(envelope.payload),
            Err(MailboxError::Closed) => Err(Stopped),
            Err(_) => {
                self.emergency.check()?;
                if !self.batch.is_empty() && self.last_admit.elapsed() >= self.batch_timeout {
                    debug!(tourists = self.batch.len(), "batch timed out");
                    self.dispatch()?;
                }
                Ok(())
            }
        }
    }

    /// How long to wait for the next request: the batch timeout
    /// remainder if a batch is pending, capped by the poll interval.
    fn receive_window(&self) -> Duration {
        let poll = self.substrate.poll_interval();
        if self.batch.is_empty() {
            return poll;
        }
        self.batch_timeout
            .saturating_sub(self.last_admit.elapsed())
            .min(poll)
    }

    fn on_request(&mut self, request: BoardingRequest) -> Result<(), Stopped> {
        if self.emergency.needs_attention() {
            self.requeue(request)?;
            self.emergency.poll()?;
            return Ok(());
        }
        let full = match self.batch.try_admit(request) {
            Admission::Buffered => false,
            Admission::Full => true,
            Admission::Rejected(request) if self.batch.is_empty() => {
                warn!(
                    tourist = %request.tourist_id,
                    slots = request.slots_needed,
                    "boarding request can never fit a chair, dropped"
                );
                return Ok(());
            }
            Admission::Rejected(request) => {
                self.dispatch()?;
                self.requeue(request)?;
                false
            }
        };
        self.last_admit = Instant::now();
        self.emergency.check()?;
        if full {
            self.dispatch()?;
        }
        Ok(())
    }

    fn requeue(&self, request: BoardingRequest) -> Result<(), Stopped> {
        self.substrate.boarding().send(Tag::REQUEUED, request)?;
        Ok(())
    }

    /// Release the pending batch as one chair.
    fn dispatch(&mut self) -> Result<(), Stopped> {
        self.emergency.poll()?;
        self.acquire_chair()?;

        let region = self.substrate.region();
        let departure_ms = region.now_ms();
        let chair_id = self.next_chair;
        let trip = self.next_trip;
        let slots = self.batch.slots();
        let entries = self.batch.take();
        let occupant_count = entries.len() as u8;
        for entry in &entries {
            let confirmation = BoardingConfirmation {
                tourist_id: entry.tourist_id,
                trip,
                departure_ms,
                chair_id,
                occupant_count,
            };
            if self
                .substrate
                .confirmations()
                .send(Tag::tourist(entry.tourist_id), confirmation)
                .is_err()
            {
                return Err(Stopped);
            }
        }
        region.note_dispatch(u64::from(occupant_count));
        self.chairs += 1;
        self.next_chair = chair_id.next_in_fleet(self.fleet_size);
        self.next_trip = trip.next();
        debug!(%chair_id, %trip, occupant_count, slots, departure_ms, "chair dispatched");
        Ok(())
    }

    /// Take one chairs-in-flight unit, servicing notifications while the
    /// lift is saturated.
    fn acquire_chair(&mut self) -> Result<(), Stopped> {
        let chairs = PoolName::ChairsInFlight;
        loop {
            match self
                .substrate
                .pool(chairs)
                .acquire_timeout(1, self.substrate.poll_interval())
            {
                Ok(()) => return Ok(()),
                Err(PoolError::Timeout) => {
                    self.emergency.poll()?;
                }
                Err(_) => return Err(Stopped),
            }
        }
    }
}

impl std::fmt::Debug for ChairDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChairDispatcher")
            .field("batch", &self.batch)
            .field("next_chair", &self.next_chair)
            .field("chairs", &self.chairs)
            .finish_non_exhaustive()
    }
}
