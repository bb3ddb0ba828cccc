//! Strongly-typed identifiers and mailbox tags.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies a tourist for the lifetime of a run.
///
/// Ids are assigned by whoever spawns riders and double as the mailbox
/// tag for that tourist's boarding confirmation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TouristId(pub u32);

impl fmt::Display for TouristId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for TouristId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identifies a physical chair in the fleet.
///
/// Chair ids cycle over `0..fleet_size`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChairId(pub u32);

impl ChairId {
    /// The chair after this one, wrapping at `fleet_size`.
    pub fn next_in_fleet(self, fleet_size: u32) -> Self {
        Self((self.0 + 1) % fleet_size.max(1))
    }
}

impl fmt::Display for ChairId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sequence number of one chair departure.
///
/// Chair ids are reused as the fleet cycles, possibly while an earlier
/// trip of the same chair is still on the cable; a trip id never is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TripId(pub u64);

impl TripId {
    /// The trip dispatched after this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for TripId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sequence number of an emergency stop.
///
/// Allocated by the initiator under the state guard; strictly increasing
/// within a run. `IncidentId(0)` means "no incident yet".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IncidentId(pub u64);

impl fmt::Display for IncidentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Routing key and priority of a mailbox message.
///
/// Lower tags are served first by lowest-tag receives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(pub u64);

impl Tag {
    /// Boarding requests bounced out of a full chair. Always served first.
    pub const REQUEUED: Tag = Tag(1);
    /// Expedited (VIP) boarding requests.
    pub const EXPEDITED: Tag = Tag(2);
    /// Standard boarding requests.
    pub const STANDARD: Tag = Tag(3);
    /// Arrival notifications at the upper platform.
    pub const ARRIVAL: Tag = Tag(1);
    /// Requests to the cashier.
    pub const CASHIER: Tag = Tag(1);
    /// Base added to a tourist id to address a cashier response.
    pub const CASHIER_RESPONSE_BASE: u64 = 1_000;

    /// Tag addressing a boarding confirmation to one tourist.
    pub fn tourist(id: TouristId) -> Self {
        Self(u64::from(id.0))
    }

    /// Tag addressing a cashier response to one tourist.
    pub fn cashier_response(id: TouristId) -> Self {
        Self(Self::CASHIER_RESPONSE_BASE + u64::from(id.0))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The two platform workers that jointly run the lift.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WorkerRole {
    /// Lower platform: batches boarding requests into chairs.
    Lower,
    /// Upper platform: receives arrivals and returns chairs to the pool.
    Upper,
}

impl WorkerRole {
    /// Both roles, in index order.
    pub const ALL: [WorkerRole; 2] = [WorkerRole::Lower, WorkerRole::Upper];

    /// The other platform worker.
    pub fn peer(self) -> Self {
        match self {
            Self::Lower => Self::Upper,
            Self::Upper => Self::Lower,
        }
    }

    /// Dense index for per-role arrays.
    pub fn index(self) -> usize {
        match self {
            Self::Lower => 0,
            Self::Upper => 1,
        }
    }

    /// Handshake mailbox tag addressing this worker.
    pub fn tag(self) -> Tag {
        Tag(self.index() as u64 + 1)
    }
}

impl fmt::Display for WorkerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lower => write!(f, "lower"),
            Self::Upper => write!(f, "upper"),
        }
    }
}

/// Counter for [`ResortKey::unique`] allocation.
static RESORT_KEY_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Key under which a substrate is registered, analogous to an IPC key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResortKey(pub String);

impl ResortKey {
    /// A key never handed out before within this process.
    pub fn unique() -> Self {
        let n = RESORT_KEY_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(format!("resort-{n}"))
    }
}

impl fmt::Display for ResortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResortKey {
    fn from(v: &str) -> Self {
        Self(v.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chair_ids_cycle_over_fleet() {
        let mut chair = ChairId(0);
        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(chair.0);
            chair = chair.next_in_fleet(3);
        }
        assert_eq!(seen, vec![0, 1, 2, 0, 1]);
    }

    #[test]
    fn zero_fleet_does_not_divide_by_zero() {
        assert_eq!(ChairId(7).next_in_fleet(0), ChairId(0));
    }

    #[test]
    fn requeued_beats_every_boarding_class() {
        assert!(Tag::REQUEUED < Tag::EXPEDITED);
        assert!(Tag::EXPEDITED < Tag::STANDARD);
    }

    #[test]
    fn roles_are_mutual_peers_with_distinct_tags() {
        for role in WorkerRole::ALL {
            assert_eq!(role.peer().peer(), role);
            assert_ne!(role.tag(), role.peer().tag());
        }
    }

    #[test]
    fn unique_keys_differ() {
        assert_ne!(ResortKey::unique(), ResortKey::unique());
    }

    #[test]
    fn cashier_responses_never_collide_with_request_tag() {
        assert_ne!(Tag::cashier_response(TouristId(0)), Tag::CASHIER);
        assert_eq!(Tag::cashier_response(TouristId(5)), Tag(1_005));
    }
}
