//! Shared region, chair dispatch, emergency coordination and the
//! simulated clock of a chairlift resort.
//!
//! [`Resort::start`] builds a [`Substrate`] through the
//! [`ResourceManager`] and starts three actors on named threads:
//!
//! - the [`TimeService`], sole writer of the simulated clock;
//! - the lower platform worker, a [`ChairDispatcher`] batching boarding
//!   requests into chairs;
//! - the [`UpperWorker`], which receives arrivals and returns chairs to
//!   the in-flight pool.
//!
//! Both platform workers run an [`EmergencyCoordinator`]. Tourists are
//! clients: a [`Rider`] drives one tourist through the resort using only
//! pool and mailbox operations.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod clock;
pub mod config;
pub mod danger;
pub mod dispatch;
pub mod emergency;
pub mod manager;
pub mod platform;
pub mod region;
pub mod resort;
pub mod rider;

use std::error::Error;
use std::fmt;

use chairlift_core::{MailboxError, PoolError};

pub use clock::{ClockControl, ClockState, TimeService};
pub use config::{ConfigError, ResortConfig, SimParams};
pub use danger::DangerCheck;
pub use dispatch::{Admission, BatchEntry, ChairDispatcher, PendingBatch};
pub use emergency::{EmergencyCoordinator, EmergencyState, Resolution};
pub use manager::{PoolName, ResourceManager, Substrate};
pub use platform::{UpperWorker, WorkerReport};
pub use region::{EntryRecord, SharedRegion, StatsSnapshot};
pub use resort::{Resort, ShutdownReport, ShutdownState};
pub use rider::{RideRecord, Rider, RiderProfile};

/// Cooperative cancellation: the substrate is shutting down.
///
/// Every actor loop propagates this with `?` as soon as a blocking call
/// reports a shutdown-class failure, and exits without further IPC.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stopped;

impl fmt::Display for Stopped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "substrate is shutting down")
    }
}

impl Error for Stopped {}

impl From<PoolError> for Stopped {
    fn from(_: PoolError) -> Self {
        Stopped
    }
}

impl From<MailboxError> for Stopped {
    fn from(_: MailboxError) -> Self {
        Stopped
    }
}

/// Why a client operation on the substrate did not complete.
///
/// Shutdown ends a ride normally; a refused request is a caller error
/// that must not be mistaken for one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RideError {
    /// The substrate is shutting down.
    Stopped,
    /// A pool refused the request outright, e.g. more slots than it holds.
    Refused(PoolError),
}

impl fmt::Display for RideError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => Stopped.fmt(f),
            Self::Refused(e) => write!(f, "request refused: {e}"),
        }
    }
}

impl Error for RideError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Stopped => None,
            Self::Refused(e) => Some(e),
        }
    }
}

impl From<Stopped> for RideError {
    fn from(_: Stopped) -> Self {
        Self::Stopped
    }
}

impl From<PoolError> for RideError {
    fn from(e: PoolError) -> Self {
        match e {
            PoolError::Closed | PoolError::Interrupted => Self::Stopped,
            other => Self::Refused(other),
        }
    }
}

impl From<MailboxError> for RideError {
    fn from(_: MailboxError) -> Self {
        Self::Stopped
    }
}
