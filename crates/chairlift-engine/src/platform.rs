//! Upper platform worker and the report both platform workers return.
//!
//! The upper worker receives arrival notifications, counts them per trip
//! and returns the trip's chairs-in-flight unit once all of its occupants
//! have arrived. Counting by trip rather than chair id keeps two trips of
//! the same chair apart when the fleet wraps while one is still out. Between arrivals it services emergency
//! notifications and rolls its own danger check.

use std::collections::HashMap;
use std::sync::Arc;

use chairlift_core::{ArrivalNotification, MailboxError, PoolError, Tag, TripId, WorkerRole};
use chairlift_sync::Selector;
use tracing::{debug, info, warn};

use crate::config::ResortConfig;
use crate::emergency::EmergencyCoordinator;
use crate::manager::{PoolName, Substrate};
use crate::Stopped;

/// What a platform worker did before it stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerReport {
    /// Which worker.
    pub role: WorkerRole,
    /// Chairs dispatched (lower) or returned (upper).
    pub chairs: u64,
    /// Incidents this worker initiated.
    pub initiated: u32,
    /// Incidents this worker joined as receiver.
    pub joined: u32,
}

/// The upper platform worker.
pub struct UpperWorker {
    substrate: Arc<Substrate>,
    emergency: EmergencyCoordinator,
    arrived: HashMap<TripId, u8>,
    chairs: u64,
}

impl UpperWorker {
    /// Build the worker for `substrate`.
    pub fn new(substrate: Arc<Substrate>, config: &ResortConfig) -> Self {
        let emergency =
            EmergencyCoordinator::new(WorkerRole::Upper, Arc::clone(&substrate), config.seed);
        Self {
            substrate,
            emergency,
            arrived: HashMap::new(),
            chairs: 0,
        }
    }

    /// Run until the substrate shuts down.
    pub fn run(mut self) -> WorkerReport {
        info!(role = %WorkerRole::Upper, "platform worker started");
        while self.step().is_ok() {}
        let (initiated, joined) = self.emergency.tally();
        info!(
            role = %WorkerRole::Upper,
            chairs = self.chairs,
            partial_chairs = self.arrived.len(),
            "platform worker stopped"
        );
        WorkerReport {
            role: WorkerRole::Upper,
            chairs: self.chairs,
            initiated,
            joined,
        }
    }

    /// One receive-and-react iteration.
    pub fn step(&mut self) -> Result<(), Stopped> {
        match self.substrate.arrivals().receive_timeout(
            Selector::Exact(Tag::ARRIVAL),
            self.substrate.poll_interval(),
        ) {
            Ok(envelope) => {
                self.on_arrival(envelope.payload)?;
                self.emergency.check()?;
                Ok(())
            }
            Err(MailboxError::Closed) => Err(Stopped),
            Err(_) => {
                self.emergency.check()?;
                Ok(())
            }
        }
    }

    fn on_arrival(&mut self, arrival: ArrivalNotification) -> Result<(), Stopped> {
        self.substrate.region().note_arrival();
        let count = self.arrived.entry(arrival.trip).or_insert(0);
        *count = count.saturating_add(1);
        if *count < arrival.occupant_count {
            return Ok(());
        }
        self.arrived.remove(&arrival.trip);
        match self.substrate.pool(PoolName::ChairsInFlight).release(1) {
            Ok(()) => {}
            Err(PoolError::Closed) => return Err(Stopped),
            Err(e) => {
                warn!(chair_id = %arrival.chair_id, trip = %arrival.trip, error = %e, "chair returned twice");
                return Ok(());
            }
        }
        self.chairs += 1;
        debug!(
            chair_id = %arrival.chair_id,
            trip = %arrival.trip,
            occupants = arrival.occupant_count,
            "chair returned"
        );
        Ok(())
    }
}

impl std::fmt::Debug for UpperWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpperWorker")
            .field("partial_chairs", &self.arrived.len())
            .field("chairs", &self.chairs)
            .finish_non_exhaustive()
    }
}
