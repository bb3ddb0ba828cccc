//! Client side of a ride.
//!
//! A [`Rider`] drives one tourist (plus any kids travelling with them)
//! through the resort using only pool and mailbox operations:
//!
//! 1. pass an entry gate once and record the entry;
//! 2. per ride: wait out pauses, take waiting-area slots, pass a platform
//!    gate, wait out emergencies, request boarding;
//! 3. on confirmation leave the waiting area, ride until the chair's
//!    shared arrival time, wait out emergencies, report the arrival;
//! 4. pass an exit gate.
//!
//! Every shutdown-class failure ends the ride with [`RideError::Stopped`];
//! a pool that can never satisfy the party yields [`RideError::Refused`].

use std::sync::Arc;

use chairlift_core::{
    ArrivalNotification, BoardingRequest, ChairId, MailboxError, Tag, TouristId, TouristKind,
    TripId, CHAIR_CAPACITY,
};
use chairlift_sync::Selector;
use tracing::{debug, warn};

use crate::manager::{PoolName, Substrate};
use crate::region::{minutes_to_ms, EntryRecord};
use crate::RideError;

/// Who is riding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RiderProfile {
    /// Tourist id; also the confirmation tag.
    pub tourist_id: TouristId,
    /// Walker or cyclist.
    pub kind: TouristKind,
    /// Kids riding along.
    pub kid_count: u8,
    /// Expedited boarding (VIP).
    pub expedited: bool,
}

impl RiderProfile {
    /// A lone walker with standard boarding.
    pub fn walker(id: u32) -> Self {
        Self {
            tourist_id: TouristId(id),
            kind: TouristKind::Walker,
            kid_count: 0,
            expedited: false,
        }
    }

    /// Chair slots the party needs, never more than one chair.
    pub fn slots(&self) -> u8 {
        self.kind
            .base_slots()
            .saturating_add(self.kid_count)
            .min(CHAIR_CAPACITY)
    }

    /// Boarding priority tag.
    pub fn boarding_tag(&self) -> Tag {
        if self.expedited {
            Tag::EXPEDITED
        } else {
            Tag::STANDARD
        }
    }
}

/// One completed ride.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RideRecord {
    /// Chair ridden.
    pub chair_id: ChairId,
    /// Departure the rider was confirmed on.
    pub trip: TripId,
    /// Departure time stamped by the dispatcher.
    pub departure_ms: u64,
    /// Tourists on the chair.
    pub occupant_count: u8,
    /// Simulated time of the arrival report.
    pub arrived_ms: u64,
}

/// A tourist working through the resort.
#[derive(Debug)]
pub struct Rider {
    substrate: Arc<Substrate>,
    profile: RiderProfile,
    entered: bool,
}

impl Rider {
    /// A rider on `substrate`.
    pub fn new(substrate: Arc<Substrate>, profile: RiderProfile) -> Self {
        Self {
            substrate,
            profile,
            entered: false,
        }
    }

    /// Who is riding.
    pub fn profile(&self) -> &RiderProfile {
        &self.profile
    }

    /// Pass an entry gate and record the entry. Idempotent.
    pub fn enter_resort(&mut self) -> Result<(), RideError> {
        if self.entered {
            return Ok(());
        }
        let region = self.substrate.region();
        if region.is_closing() {
            return Err(RideError::Stopped);
        }
        {
            let _gate = self.substrate.pool(PoolName::EntryGates).permit(1)?;
            let record = EntryRecord {
                tourist_id: self.profile.tourist_id,
                kind: self.profile.kind,
                entered_at_ms: region.now_ms(),
                rides: 0,
            };
            if let Err(e) = region.record_entry(record) {
                warn!(tourist = %self.profile.tourist_id, error = %e, "entry not recorded");
            }
        }
        self.entered = true;
        Ok(())
    }

    /// Take `rides` rides, stopping early once the resort closes.
    pub fn run(&mut self, rides: u32) -> Result<Vec<RideRecord>, RideError> {
        self.enter_resort()?;
        let mut done = Vec::with_capacity(rides as usize);
        for _ in 0..rides {
            if self.substrate.region().is_closing() {
                break;
            }
            done.push(self.ride()?);
        }
        Ok(done)
    }

    /// One ride from the lower station to the upper exit.
    pub fn ride(&mut self) -> Result<RideRecord, RideError> {
        self.enter_resort()?;
        let s = &self.substrate;
        let id = self.profile.tourist_id;
        let slots = self.profile.slots();

        s.await_unpaused()?;
        s.enter_station(u32::from(slots))?;
        {
            let _gate = s.pool(PoolName::PlatformGates).permit(1)?;
        }
        s.await_emergency_clear()?;
        s.boarding().send(
            self.profile.boarding_tag(),
            BoardingRequest {
                tourist_id: id,
                kind: self.profile.kind,
                slots_needed: slots,
                kid_count: self.profile.kid_count,
            },
        )?;

        let confirmation = loop {
            match s.confirmations().receive(Selector::Exact(Tag::tourist(id))) {
                Ok(envelope) => break envelope.payload,
                Err(MailboxError::Interrupted) => continue,
                Err(_) => return Err(RideError::Stopped),
            }
        };
        s.leave_station(u32::from(slots))?;

        // Everyone on the chair wakes at the same simulated instant.
        let region = s.region();
        let arrival_ms = confirmation
            .departure_ms
            .saturating_add(minutes_to_ms(region.params().chair_travel_time_sim));
        region.sleep_until_ms(arrival_ms, s.poll_interval())?;
        s.await_emergency_clear()?;

        s.arrivals().send(
            Tag::ARRIVAL,
            ArrivalNotification {
                tourist_id: id,
                kind: self.profile.kind,
                kid_count: self.profile.kid_count,
                chair_id: confirmation.chair_id,
                trip: confirmation.trip,
                occupant_count: confirmation.occupant_count,
            },
        )?;
        let arrived_ms = region.now_ms();
        region.record_ride(id);
        {
            let _gate = s.pool(PoolName::ExitGates).permit(1)?;
        }
        debug!(tourist = %id, chair_id = %confirmation.chair_id, arrived_ms, "ride complete");
        Ok(RideRecord {
            chair_id: confirmation.chair_id,
            trip: confirmation.trip,
            departure_ms: confirmation.departure_ms,
            occupant_count: confirmation.occupant_count,
            arrived_ms,
        })
    }
}
