//! Message schemas exchanged through mailboxes.
//!
//! Field lists follow the conceptual wire contract between actors; they
//! are plain values moved through in-process mailboxes, never serialized.

use crate::id::{ChairId, IncidentId, TouristId, TripId, WorkerRole};

/// Number of slots on one chair.
pub const CHAIR_CAPACITY: u8 = 4;

/// How a tourist travels down once at the top.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TouristKind {
    /// Walks down a trail.
    Walker,
    /// Rides a bike trail; the bike needs its own slot.
    Cyclist,
}

impl TouristKind {
    /// Chair slots this tourist needs on their own (without kids).
    pub fn base_slots(self) -> u8 {
        match self {
            Self::Walker => 1,
            Self::Cyclist => 2,
        }
    }
}

/// Ticket product requested at the cashier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TicketType {
    /// One ride.
    Single,
    /// Unlimited rides for a short window.
    TimedShort,
    /// Unlimited rides for a medium window.
    TimedMedium,
    /// Unlimited rides for a long window.
    TimedLong,
    /// Unlimited rides until close.
    Daily,
}

/// Request sent to the cashier, tagged [`Tag::CASHIER`](crate::Tag::CASHIER).
#[derive(Clone, Debug, PartialEq)]
pub struct CashierRequest {
    /// Who is buying.
    pub tourist_id: TouristId,
    /// Walker or cyclist.
    pub kind: TouristKind,
    /// Age in years.
    pub age: u8,
    /// Whether the tourist holds a VIP pass.
    pub is_vip: bool,
    /// Kids travelling with this tourist.
    pub kid_count: u8,
    /// The product asked for.
    pub requested: TicketType,
}

/// Whether a ticket was sold, and at what price.
#[derive(Clone, Debug, PartialEq)]
pub enum TicketOutcome {
    /// Sold for this price in cents.
    Price(u32),
    /// Refused, with a reason for the report.
    Rejected(String),
}

/// Cashier reply, tagged [`Tag::cashier_response`](crate::Tag::cashier_response).
#[derive(Clone, Debug, PartialEq)]
pub struct CashierResponse {
    /// Product issued.
    pub ticket: TicketType,
    /// Simulated minute after which the ticket stops working.
    pub valid_until_minutes: f64,
    /// Price or refusal.
    pub outcome: TicketOutcome,
}

/// Request to board a chair, tagged by priority class.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoardingRequest {
    /// Who wants to board.
    pub tourist_id: TouristId,
    /// Walker or cyclist.
    pub kind: TouristKind,
    /// Slots the whole party occupies, `1..=CHAIR_CAPACITY`.
    pub slots_needed: u8,
    /// Kids riding with this tourist.
    pub kid_count: u8,
}

/// Confirmation that a tourist is on a departing chair.
///
/// Every occupant of one chair receives an identical `trip`,
/// `departure_ms`, `chair_id` and `occupant_count`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoardingConfirmation {
    /// Addressee.
    pub tourist_id: TouristId,
    /// Departure this confirmation belongs to.
    pub trip: TripId,
    /// Simulated time of departure, in milliseconds.
    pub departure_ms: u64,
    /// Chair carrying the party.
    pub chair_id: ChairId,
    /// Number of confirmed tourists on the chair.
    pub occupant_count: u8,
}

/// Sent by each tourist on reaching the upper platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArrivalNotification {
    /// Who arrived.
    pub tourist_id: TouristId,
    /// Walker or cyclist.
    pub kind: TouristKind,
    /// Kids that arrived with this tourist.
    pub kid_count: u8,
    /// Chair the tourist rode.
    pub chair_id: ChairId,
    /// Trip from the boarding confirmation.
    pub trip: TripId,
    /// Occupant count from the boarding confirmation.
    pub occupant_count: u8,
}

/// Kind of a worker-to-worker handshake message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandshakeKind {
    /// Initiator to receiver: the incident duration has elapsed.
    ReadyToResume,
    /// Receiver to initiator: acknowledged, receiver has cleared its halt.
    IAmReady,
}

/// Worker-to-worker handshake, tagged by the destination worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Handshake {
    /// Message kind.
    pub kind: HandshakeKind,
    /// Sender.
    pub from: WorkerRole,
    /// Incident this message belongs to.
    pub incident: IncidentId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cyclist_needs_more_than_walker() {
        assert!(TouristKind::Cyclist.base_slots() > TouristKind::Walker.base_slots());
        assert!(TouristKind::Cyclist.base_slots() <= CHAIR_CAPACITY);
    }
}
