//! Tagged, priority-ordered mailboxes.
//!
//! A [`Mailbox`] stores [`Envelope`]s keyed by [`Tag`]. The tag is both
//! the routing key and the priority: a receiver asks for one exact tag,
//! for the numerically lowest tag currently queued, or for the oldest
//! message regardless of tag.
//!
//! # Ordering
//!
//! - `Selector::Exact(t)`: FIFO among messages tagged `t`.
//! - `Selector::Lowest`: smallest tag first, FIFO within that tag.
//! - `Selector::Any`: global insertion order.
//!
//! Sends never block. Teardown via [`close`](Mailbox::close) wakes every
//! blocked receiver with [`MailboxError::Closed`] and discards whatever
//! is still queued.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chairlift_core::{MailboxError, Tag};
use tracing::trace;

/// Which queued message a receive should take.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Selector {
    /// The oldest message with exactly this tag.
    Exact(Tag),
    /// The oldest message with the smallest tag currently queued.
    Lowest,
    /// The oldest message of any tag.
    Any,
}

/// A message together with the tag it was sent under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope<T> {
    /// Routing key / priority the message was sent with.
    pub tag: Tag,
    /// The message.
    pub payload: T,
}

struct Queued<T> {
    seq: u64,
    payload: T,
}

struct MailboxState<T> {
    /// Invariant: no empty deques are kept.
    queues: BTreeMap<Tag, VecDeque<Queued<T>>>,
    next_seq: u64,
    len: usize,
    closed: bool,
    interrupts: u64,
}

impl<T> MailboxState<T> {
    fn take(&mut self, selector: Selector) -> Option<Envelope<T>> {
        let tag = match selector {
            Selector::Exact(tag) => tag,
            Selector::Lowest => *self.queues.keys().next()?,
            Selector::Any => self
                .queues
                .iter()
                .filter_map(|(tag, q)| q.front().map(|m| (m.seq, *tag)))
                .min()?
                .1,
        };
        let queue = self.queues.get_mut(&tag)?;
        let msg = queue.pop_front()?;
        if queue.is_empty() {
            self.queues.remove(&tag);
        }
        self.len -= 1;
        Some(Envelope {
            tag,
            payload: msg.payload,
        })
    }
}

/// A multi-producer, multi-consumer tagged mailbox.
pub struct Mailbox<T> {
    name: &'static str,
    state: Mutex<MailboxState<T>>,
    arrived: Condvar,
}

impl<T> Mailbox<T> {
    /// Create an empty, open mailbox.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Mutex::new(MailboxState {
                queues: BTreeMap::new(),
                next_seq: 0,
                len: 0,
                closed: false,
                interrupts: 0,
            }),
            arrived: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MailboxState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue `payload` under `tag`. Never blocks.
    ///
    /// Fails with [`MailboxError::Closed`] once the mailbox is torn down;
    /// callers treat that as shutdown, not as something to retry.
    pub fn send(&self, tag: Tag, payload: T) -> Result<(), MailboxError> {
        let mut state = self.lock();
        if state.closed {
            return Err(MailboxError::Closed);
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        state
            .queues
            .entry(tag)
            .or_default()
            .push_back(Queued { seq, payload });
        state.len += 1;
        drop(state);
        self.arrived.notify_all();
        Ok(())
    }

    /// Block until a message matching `selector` exists, then remove it.
    ///
    /// Returns [`MailboxError::Interrupted`] if [`interrupt`](Self::interrupt)
    /// fires while waiting.
    pub fn receive(&self, selector: Selector) -> Result<Envelope<T>, MailboxError> {
        self.wait_for(selector, None)
    }

    /// Like [`receive`](Self::receive), giving up with
    /// [`MailboxError::Timeout`] after `timeout`.
    pub fn receive_timeout(
        &self,
        selector: Selector,
        timeout: Duration,
    ) -> Result<Envelope<T>, MailboxError> {
        self.wait_for(selector, Some(Instant::now() + timeout))
    }

    /// Remove a matching message if one is queued right now.
    pub fn try_receive(&self, selector: Selector) -> Result<Envelope<T>, MailboxError> {
        let mut state = self.lock();
        if state.closed {
            return Err(MailboxError::Closed);
        }
        state.take(selector).ok_or(MailboxError::Empty)
    }

    /// Wake every blocked receiver with [`MailboxError::Interrupted`].
    pub fn interrupt(&self) {
        let mut state = self.lock();
        state.interrupts = state.interrupts.wrapping_add(1);
        drop(state);
        self.arrived.notify_all();
    }

    /// Tear the mailbox down, waking every receiver with
    /// [`MailboxError::Closed`] and dropping queued messages.
    ///
    /// Returns `true` for the call that actually closed it.
    pub fn close(&self) -> bool {
        let mut state = self.lock();
        if state.closed {
            return false;
        }
        state.closed = true;
        let discarded = state.len;
        state.queues.clear();
        state.len = 0;
        drop(state);
        self.arrived.notify_all();
        trace!(mailbox = self.name, discarded, "mailbox closed");
        true
    }

    /// Number of queued messages across all tags.
    pub fn len(&self) -> usize {
        self.lock().len
    }

    /// Whether no messages are queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Name given at creation.
    pub fn name(&self) -> &'static str {
        self.name
    }

    fn wait_for(
        &self,
        selector: Selector,
        deadline: Option<Instant>,
    ) -> Result<Envelope<T>, MailboxError> {
        let mut state = self.lock();
        let seen = state.interrupts;
        loop {
            if state.closed {
                return Err(MailboxError::Closed);
            }
            if let Some(envelope) = state.take(selector) {
                return Ok(envelope);
            }
            if state.interrupts != seen {
                return Err(MailboxError::Interrupted);
            }
            state = match deadline {
                None => self
                    .arrived
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(MailboxError::Timeout);
                    }
                    self.arrived
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }
}

impl<T> std::fmt::Debug for Mailbox<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("Mailbox")
            .field("name", &self.name)
            .field("len", &state.len)
            .field("closed", &state.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn exact_tag_is_fifo_within_tag() {
        let mb = Mailbox::new("confirm");
        mb.send(Tag(7), "a").unwrap();
        mb.send(Tag(8), "x").unwrap();
        mb.send(Tag(7), "b").unwrap();
        assert_eq!(mb.receive(Selector::Exact(Tag(7))).unwrap().payload, "a");
        assert_eq!(mb.receive(Selector::Exact(Tag(7))).unwrap().payload, "b");
        assert_eq!(
            mb.try_receive(Selector::Exact(Tag(7))),
            Err(MailboxError::Empty)
        );
        assert_eq!(mb.len(), 1);
    }

    #[test]
    fn lowest_tag_cuts_ahead() {
        let mb = Mailbox::new("boarding");
        mb.send(Tag::STANDARD, 1).unwrap();
        mb.send(Tag::STANDARD, 2).unwrap();
        mb.send(Tag::EXPEDITED, 3).unwrap();
        mb.send(Tag::REQUEUED, 4).unwrap();
        let order: Vec<_> = (0..4)
            .map(|_| mb.receive(Selector::Lowest).unwrap().payload)
            .collect();
        assert_eq!(order, vec![4, 3, 1, 2]);
        assert!(mb.is_empty());
    }

    #[test]
    fn any_is_global_insertion_order() {
        let mb = Mailbox::new("arrivals");
        mb.send(Tag(3), 'a').unwrap();
        mb.send(Tag(1), 'b').unwrap();
        mb.send(Tag(2), 'c').unwrap();
        let order: Vec<_> = (0..3)
            .map(|_| mb.receive(Selector::Any).unwrap().payload)
            .collect();
        assert_eq!(order, vec!['a', 'b', 'c']);
    }

    #[test]
    fn blocked_receiver_gets_later_send() {
        let mb = Arc::new(Mailbox::new("confirm"));
        let rx = {
            let mb = Arc::clone(&mb);
            thread::spawn(move || mb.receive(Selector::Exact(Tag(42))))
        };
        thread::sleep(Duration::from_millis(20));
        mb.send(Tag(41), 0u8).unwrap();
        mb.send(Tag(42), 1u8).unwrap();
        let env = rx.join().unwrap().unwrap();
        assert_eq!(env.tag, Tag(42));
        assert_eq!(env.payload, 1);
        assert_eq!(mb.len(), 1, "non-matching message stays queued");
    }

    #[test]
    fn close_wakes_all_receivers_and_rejects_sends() {
        let mb: Arc<Mailbox<u32>> = Arc::new(Mailbox::new("handshake"));
        let receivers: Vec<_> = (0..3)
            .map(|i| {
                let mb = Arc::clone(&mb);
                thread::spawn(move || mb.receive(Selector::Exact(Tag(i))))
            })
            .collect();
        thread::sleep(Duration::from_millis(20));
        assert!(mb.close());
        for r in receivers {
            assert_eq!(r.join().unwrap(), Err(MailboxError::Closed));
        }
        assert_eq!(mb.send(Tag(0), 1), Err(MailboxError::Closed));
        assert!(!mb.close());
    }

    #[test]
    fn close_discards_queued_messages() {
        let mb = Mailbox::new("boarding");
        mb.send(Tag(1), ()).unwrap();
        mb.close();
        assert_eq!(mb.len(), 0);
        assert_eq!(mb.try_receive(Selector::Any), Err(MailboxError::Closed));
    }

    #[test]
    fn interrupt_wakes_blocked_receiver() {
        let mb: Arc<Mailbox<()>> = Arc::new(Mailbox::new("handshake"));
        let rx = {
            let mb = Arc::clone(&mb);
            thread::spawn(move || mb.receive(Selector::Lowest))
        };
        thread::sleep(Duration::from_millis(20));
        mb.interrupt();
        assert_eq!(rx.join().unwrap(), Err(MailboxError::Interrupted));
        assert!(!mb.is_closed());
    }

    #[test]
    fn receive_timeout_expires_without_match() {
        let mb = Mailbox::new("boarding");
        mb.send(Tag(9), ()).unwrap();
        assert_eq!(
            mb.receive_timeout(Selector::Exact(Tag(1)), Duration::from_millis(20)),
            Err(MailboxError::Timeout)
        );
    }

    // ── proptest ───────────────────────────────────────────────

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn lowest_drains_in_tag_then_fifo_order(
                tags in prop::collection::vec(1u64..6, 0..64),
            ) {
                let mb = Mailbox::new("prop");
                for (i, t) in tags.iter().enumerate() {
                    mb.send(Tag(*t), i).unwrap();
                }
                let mut drained = Vec::new();
                while let Ok(env) = mb.try_receive(Selector::Lowest) {
                    drained.push((env.tag, env.payload));
                }
                prop_assert_eq!(drained.len(), tags.len());
                for window in drained.windows(2) {
                    prop_assert!(window[0] <= window[1], "order violated: {:?}", window);
                }
            }
        }
    }
}
