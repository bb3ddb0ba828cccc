//! Chairlift: the concurrency substrate of a simulated ski-resort lift.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all chairlift sub-crates. For most users, adding `chairlift` as a
//! single dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use chairlift::prelude::*;
//!
//! let config = ResortConfig {
//!     danger_probability: 0.0,
//!     chair_travel_time_sim: 1.0,
//!     batch_timeout_ms: 20,
//!     poll_ms: 2,
//!     ..ResortConfig::default()
//! };
//! let mut resort = Resort::start(config).unwrap();
//!
//! // A lone walker rides twice; nobody shares the chair.
//! let mut rider = resort.rider(RiderProfile::walker(0));
//! let rides = rider.run(2).unwrap();
//! assert_eq!(rides.len(), 2);
//! assert!(rides.iter().all(|r| r.occupant_count == 1));
//!
//! let report = resort.shutdown();
//! assert_eq!(report.chairs_stranded, 0);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `chairlift-core` | IDs, tags, error taxonomy, message schemas |
//! | [`sync`] | `chairlift-sync` | Resource pools, mailboxes, interrupt lines |
//! | [`engine`] | `chairlift-engine` | Shared region, actors, orchestrator, config |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, IDs and errors (`chairlift-core`).
///
/// Contains [`types::Tag`] and the other strongly-typed ids, the
/// [`types::PoolError`] / [`types::MailboxError`] taxonomy, and every
/// message exchanged through mailboxes.
pub use chairlift_core as types;

/// Synchronization primitives (`chairlift-sync`).
///
/// [`sync::ResourcePool`] for counted capacity, [`sync::Mailbox`] for
/// tagged messages, [`sync::InterruptLine`] for out-of-band notification.
pub use chairlift_sync as sync;

/// Resort engine (`chairlift-engine`).
///
/// [`engine::Resort`] starts and stops the actors; [`engine::Substrate`]
/// is the shared state clients operate on.
pub use chairlift_engine as engine;

/// Common imports for typical chairlift usage.
///
/// ```rust
/// use chairlift::prelude::*;
/// ```
///
/// This imports the orchestrator and its configuration, the rider client,
/// the primitives, and the ids and errors they traffic in.
pub mod prelude {
    // Ids and messages
    pub use chairlift_core::{
        ArrivalNotification, BoardingConfirmation, BoardingRequest, ChairId, IncidentId,
        ResortKey, Tag, TouristId, TouristKind, WorkerRole, CHAIR_CAPACITY,
    };

    // Errors
    pub use chairlift_core::{MailboxError, PoolError, StartupError};
    pub use chairlift_engine::{ConfigError, RideError, Stopped};

    // Primitives
    pub use chairlift_sync::{InterruptKind, Mailbox, ResourcePool, Selector};

    // Engine
    pub use chairlift_engine::{
        PoolName, RideRecord, Rider, RiderProfile, Resort, ResortConfig, ResourceManager,
        ShutdownReport, StatsSnapshot, Substrate,
    };
}
