//! Out-of-band notifications between actors.
//!
//! An [`InterruptLine`] belongs to one actor. Other actors
//! [`deliver`](InterruptLine::deliver) an [`InterruptKind`] to it; the
//! line looks the kind up in its [`InterruptTable`] and runs the handler,
//! which does nothing beyond a single atomic write into [`PendingFlags`].
//! The line then interrupts every primitive the owner may be parked on so
//! the owner returns to its loop and checks the pending flags there.
//!
//! Notifications are never lost: a flag stays raised until the owner
//! [`take`](InterruptLine::take)s it, even if the owner was busy in an
//! unrelated wait when it arrived.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::trace;

use crate::mailbox::Mailbox;
use crate::pool::ResourcePool;

/// Kinds of out-of-band notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InterruptKind {
    /// The peer platform worker halted the lift.
    EmergencyStop,
    /// The orchestrator wants the actor to stop.
    Shutdown,
}

impl InterruptKind {
    /// Every kind, in flag-index order.
    pub const ALL: [InterruptKind; 2] = [InterruptKind::EmergencyStop, InterruptKind::Shutdown];

    fn index(self) -> usize {
        match self {
            Self::EmergencyStop => 0,
            Self::Shutdown => 1,
        }
    }
}

/// One atomic flag per [`InterruptKind`].
#[derive(Debug, Default)]
pub struct PendingFlags {
    flags: [AtomicBool; 2],
}

impl PendingFlags {
    /// Record `kind` as pending.
    pub fn raise(&self, kind: InterruptKind) {
        self.flags[kind.index()].store(true, Ordering::Release);
    }

    /// Consume `kind`, returning whether it was pending.
    pub fn take(&self, kind: InterruptKind) -> bool {
        self.flags[kind.index()].swap(false, Ordering::AcqRel)
    }

    /// Whether `kind` is pending, without consuming it.
    pub fn is_raised(&self, kind: InterruptKind) -> bool {
        self.flags[kind.index()].load(Ordering::Acquire)
    }
}

/// Handler run on delivery. Must stay a single atomic write.
pub type Handler = Box<dyn Fn(&PendingFlags) + Send + Sync>;

/// Maps each notification kind an actor role accepts to its handler.
///
/// Kinds without an entry are ignored on delivery.
#[derive(Default)]
pub struct InterruptTable {
    handlers: Vec<(InterruptKind, Handler)>,
}

impl InterruptTable {
    /// An empty table that ignores everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// A table whose handler for each of `kinds` raises that kind's flag.
    pub fn recording(kinds: &[InterruptKind]) -> Self {
        kinds.iter().fold(Self::new(), |table, &kind| {
            table.on(kind, move |pending| pending.raise(kind))
        })
    }

    /// Install (or replace) the handler for `kind`.
    pub fn on<F>(mut self, kind: InterruptKind, handler: F) -> Self
    where
        F: Fn(&PendingFlags) + Send + Sync + 'static,
    {
        self.handlers.retain(|(k, _)| *k != kind);
        self.handlers.push((kind, Box::new(handler)));
        self
    }

    /// Whether `kind` has a handler.
    pub fn handles(&self, kind: InterruptKind) -> bool {
        self.handler(kind).is_some()
    }

    fn handler(&self, kind: InterruptKind) -> Option<&Handler> {
        self.handlers
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, h)| h)
    }
}

impl std::fmt::Debug for InterruptTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.handlers.iter().map(|(k, _)| k))
            .finish()
    }
}

/// Something an actor can be parked on that supports being woken early.
pub trait Interruptible: Send + Sync {
    /// Wake every waiter without granting it anything.
    fn interrupt(&self);
}

impl Interruptible for ResourcePool {
    fn interrupt(&self) {
        ResourcePool::interrupt(self);
    }
}

impl<T: Send> Interruptible for Mailbox<T> {
    fn interrupt(&self) {
        Mailbox::interrupt(self);
    }
}

/// The notification endpoint of one actor.
pub struct InterruptLine {
    owner: &'static str,
    pending: PendingFlags,
    table: InterruptTable,
    wake: Vec<Arc<dyn Interruptible>>,
}

impl InterruptLine {
    /// Create a line for `owner` that wakes `wake` on every handled delivery.
    pub fn new(
        owner: &'static str,
        table: InterruptTable,
        wake: Vec<Arc<dyn Interruptible>>,
    ) -> Self {
        Self {
            owner,
            pending: PendingFlags::default(),
            table,
            wake,
        }
    }

    /// Deliver `kind` to the owner.
    ///
    /// Returns `false` if the owner's table ignores this kind.
    pub fn deliver(&self, kind: InterruptKind) -> bool {
        let Some(handler) = self.table.handler(kind) else {
            return false;
        };
        handler(&self.pending);
        for target in &self.wake {
            target.interrupt();
        }
        trace!(owner = self.owner, ?kind, "interrupt delivered");
        true
    }

    /// Consume a pending `kind`.
    pub fn take(&self, kind: InterruptKind) -> bool {
        self.pending.take(kind)
    }

    /// Whether `kind` is pending, without consuming it.
    pub fn is_pending(&self, kind: InterruptKind) -> bool {
        self.pending.is_raised(kind)
    }

    /// Name of the owning actor.
    pub fn owner(&self) -> &'static str {
        self.owner
    }
}

impl std::fmt::Debug for InterruptLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterruptLine")
            .field("owner", &self.owner)
            .field("table", &self.table)
            .field(
                "emergency_pending",
                &self.pending.is_raised(InterruptKind::EmergencyStop),
            )
            .field(
                "shutdown_pending",
                &self.pending.is_raised(InterruptKind::Shutdown),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::Selector;
    use chairlift_core::{MailboxError, Tag};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn pending_flag_survives_until_taken() {
        let line = InterruptLine::new(
            "lower",
            InterruptTable::recording(&[InterruptKind::EmergencyStop]),
            Vec::new(),
        );
        assert!(line.deliver(InterruptKind::EmergencyStop));
        assert!(line.deliver(InterruptKind::EmergencyStop));
        assert!(line.is_pending(InterruptKind::EmergencyStop));
        assert!(line.take(InterruptKind::EmergencyStop));
        assert!(!line.take(InterruptKind::EmergencyStop), "flag is one-shot");
    }

    #[test]
    fn unhandled_kind_is_ignored() {
        let line = InterruptLine::new(
            "upper",
            InterruptTable::recording(&[InterruptKind::Shutdown]),
            Vec::new(),
        );
        assert!(!line.deliver(InterruptKind::EmergencyStop));
        assert!(!line.is_pending(InterruptKind::EmergencyStop));
    }

    #[test]
    fn custom_handler_replaces_default() {
        let table = InterruptTable::recording(&[InterruptKind::EmergencyStop])
            .on(InterruptKind::EmergencyStop, |p| p.raise(InterruptKind::Shutdown));
        let line = InterruptLine::new("lower", table, Vec::new());
        line.deliver(InterruptKind::EmergencyStop);
        assert!(line.is_pending(InterruptKind::Shutdown));
        assert!(!line.is_pending(InterruptKind::EmergencyStop));
    }

    #[test]
    fn delivery_wakes_parked_owner() {
        let inbox: Arc<Mailbox<()>> = Arc::new(Mailbox::new("boarding"));
        let line = Arc::new(InterruptLine::new(
            "lower",
            InterruptTable::recording(&InterruptKind::ALL),
            vec![inbox.clone() as Arc<dyn Interruptible>],
        ));
        let owner = {
            let inbox = Arc::clone(&inbox);
            let line = Arc::clone(&line);
            thread::spawn(move || loop {
                if line.take(InterruptKind::EmergencyStop) {
                    return true;
                }
                match inbox.receive(Selector::Exact(Tag(1))) {
                    Err(MailboxError::Interrupted) => continue,
                    _ => return false,
                }
            })
        };
        thread::sleep(Duration::from_millis(20));
        line.deliver(InterruptKind::EmergencyStop);
        assert!(owner.join().unwrap());
    }
}
