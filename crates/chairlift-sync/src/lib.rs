//! Synchronization primitives for chairlift actors.
//!
//! Three building blocks, all safe to share behind `Arc` between threads:
//!
//! - [`ResourcePool`]: a named counting semaphore with atomic multi-unit
//!   acquire/release, interruption, and destroy-wakes-all teardown.
//! - [`Mailbox`]: a tagged, priority-capable message channel.
//! - [`InterruptLine`]: per-actor pending flags filled by a handler table.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod interrupt;
pub mod mailbox;
pub mod pool;

pub use interrupt::{InterruptKind, InterruptLine, InterruptTable, Interruptible, PendingFlags};
pub use mailbox::{Envelope, Mailbox, Selector};
pub use pool::{Permit, ResourcePool};
