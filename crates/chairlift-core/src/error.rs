//! Error types for the chairlift simulation.
//!
//! Organized by subsystem: resource pools, mailboxes, shared-region
//! bookkeeping, and substrate startup. Each enum separates transient
//! failures (`Interrupted`) from shutdown-class failures (`Closed`) so
//! actor loops can tell "try again" from "stop now".

use std::error::Error;
use std::fmt;

use crate::id::ResortKey;

/// Errors from resource pool operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PoolError {
    /// A blocking `acquire` was woken by an interruption before the units
    /// became available. Callers treat it as cooperative cancellation.
    Interrupted,
    /// The pool was destroyed before or during the call.
    Closed,
    /// A non-blocking acquire could not be satisfied immediately.
    WouldBlock,
    /// A timed acquire expired before the units became available.
    Timeout,
    /// More units were requested than the pool can ever hold.
    ExceedsCapacity {
        /// Units requested.
        requested: u32,
        /// Upper bound of the pool.
        limit: u32,
    },
    /// A release would push the pool above its upper bound.
    Overflow {
        /// Units being released.
        released: u32,
        /// Units available before the release.
        available: u32,
        /// Upper bound of the pool.
        limit: u32,
    },
}

impl PoolError {
    /// Whether this failure means the substrate is going away.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Self::Closed | Self::Interrupted)
    }
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupted => write!(f, "wait interrupted"),
            Self::Closed => write!(f, "pool destroyed"),
            Self::WouldBlock => write!(f, "acquire would block"),
            Self::Timeout => write!(f, "acquire timed out"),
            Self::ExceedsCapacity { requested, limit } => {
                write!(f, "requested {requested} units from a pool limited to {limit}")
            }
            Self::Overflow {
                released,
                available,
                limit,
            } => write!(
                f,
                "releasing {released} units onto {available} would exceed limit {limit}"
            ),
        }
    }
}

impl Error for PoolError {}

/// Errors from mailbox operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MailboxError {
    /// The mailbox was torn down before or during the call.
    Closed,
    /// A blocking receive was woken by an out-of-band notification.
    Interrupted,
    /// A timed receive expired with no matching message.
    Timeout,
    /// A non-blocking receive found no matching message.
    Empty,
}

impl MailboxError {
    /// Whether this failure means the substrate is going away.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl fmt::Display for MailboxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "mailbox closed"),
            Self::Interrupted => write!(f, "receive interrupted"),
            Self::Timeout => write!(f, "receive timed out"),
            Self::Empty => write!(f, "no matching message"),
        }
    }
}

impl Error for MailboxError {}

/// Errors from shared-region bookkeeping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegionError {
    /// The bounded entry log has no room for another record.
    EntryLogFull {
        /// Capacity of the log.
        capacity: usize,
    },
    /// A record for this tourist already exists.
    DuplicateEntry {
        /// The tourist id that was recorded twice.
        tourist_id: u32,
    },
}

impl fmt::Display for RegionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EntryLogFull { capacity } => {
                write!(f, "entry log is full ({capacity} records)")
            }
            Self::DuplicateEntry { tourist_id } => {
                write!(f, "tourist {tourist_id} already has an entry record")
            }
        }
    }
}

impl Error for RegionError {}

/// Fatal errors while building or attaching to a substrate.
///
/// These abort orchestration before any actor starts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StartupError {
    /// A live substrate is already registered under this key.
    AlreadyExists {
        /// The conflicting key.
        key: ResortKey,
    },
    /// No live substrate is registered under this key.
    NotFound {
        /// The key that was looked up.
        key: ResortKey,
    },
    /// The configuration cannot produce a usable substrate.
    Config {
        /// Description of the problem.
        reason: String,
    },
    /// An actor thread could not be spawned.
    ThreadSpawnFailed {
        /// Which actor failed to start.
        actor: String,
    },
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyExists { key } => write!(f, "substrate '{key}' already exists"),
            Self::NotFound { key } => write!(f, "substrate '{key}' not found"),
            Self::Config { reason } => write!(f, "invalid configuration: {reason}"),
            Self::ThreadSpawnFailed { actor } => write!(f, "failed to spawn {actor} thread"),
        }
    }
}

impl Error for StartupError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_classification() {
        assert!(PoolError::Closed.is_shutdown());
        assert!(PoolError::Interrupted.is_shutdown());
        assert!(!PoolError::WouldBlock.is_shutdown());
        assert!(MailboxError::Closed.is_shutdown());
        assert!(!MailboxError::Interrupted.is_shutdown());
        assert!(!MailboxError::Timeout.is_shutdown());
    }

    #[test]
    fn display_mentions_key() {
        let err = StartupError::AlreadyExists {
            key: ResortKey::from("resort-a"),
        };
        assert_eq!(err.to_string(), "substrate 'resort-a' already exists");
    }

    #[test]
    fn overflow_display_is_readable() {
        let err = PoolError::Overflow {
            released: 2,
            available: 3,
            limit: 4,
        };
        assert_eq!(
            err.to_string(),
            "releasing 2 units onto 3 would exceed limit 4"
        );
    }
}
