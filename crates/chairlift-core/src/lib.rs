//! Core types for the chairlift resort simulation.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the vocabulary shared by every actor: strongly-typed ids, the error
//! taxonomy for pools, mailboxes and startup, and the message schemas
//! exchanged through mailboxes.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod id;
pub mod message;

pub use error::{MailboxError, PoolError, RegionError, StartupError};
pub use id::{ChairId, IncidentId, ResortKey, Tag, TouristId, TripId, WorkerRole};
pub use message::{
    ArrivalNotification, BoardingConfirmation, BoardingRequest, CashierRequest, CashierResponse,
    Handshake, HandshakeKind, TicketOutcome, TicketType, TouristKind, CHAIR_CAPACITY,
};
