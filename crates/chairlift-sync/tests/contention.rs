//! Multi-threaded contention on pools, mailboxes and interrupt lines.
//!
//! Each test drives one primitive from many threads at once and checks
//! the property a chairlift actor relies on:
//!
//! - multi-unit acquires never overcommit a bounded pool;
//! - a per-tag stream from one producer stays FIFO while other producers
//!   interleave on other tags;
//! - closing a primitive frees every thread blocked on it;
//! - a delivery to a busy owner is still pending when it looks.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use chairlift_core::{MailboxError, PoolError, Tag};
use chairlift_sync::{
    InterruptKind, InterruptLine, InterruptTable, Interruptible, Mailbox, ResourcePool, Selector,
};

const THREADS: u32 = 8;
const ROUNDS: u32 = 200;

#[test]
fn multi_unit_acquires_never_overcommit() {
    let pool = Arc::new(ResourcePool::bounded("station", 10));
    let held = Arc::new(AtomicU32::new(0));
    let peak = Arc::new(AtomicU32::new(0));

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let pool = Arc::clone(&pool);
            let held = Arc::clone(&held);
            let peak = Arc::clone(&peak);
            // Party sizes 1..=4, like a tourist with kids or a bike.
            let units = i % 4 + 1;
            thread::spawn(move || {
                for _ in 0..ROUNDS {
                    pool.acquire(units).unwrap();
                    let now = held.fetch_add(units, Ordering::SeqCst) + units;
                    peak.fetch_max(now, Ordering::SeqCst);
                    held.fetch_sub(units, Ordering::SeqCst);
                    pool.release(units).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert!(peak.load(Ordering::SeqCst) <= 10);
    assert_eq!(pool.value(), 10, "every unit returned");
}

#[test]
fn per_tag_streams_stay_fifo_under_interleaving() {
    let mailbox = Arc::new(Mailbox::<u32>::new("arrivals"));
    let start = Arc::new(Barrier::new(THREADS as usize));

    let producers: Vec<_> = (0..THREADS)
        .map(|t| {
            let mailbox = Arc::clone(&mailbox);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                for seq in 0..ROUNDS {
                    mailbox.send(Tag(u64::from(t) + 1), seq).unwrap();
                }
            })
        })
        .collect();
    for p in producers {
        p.join().unwrap();
    }

    assert_eq!(mailbox.len(), (THREADS * ROUNDS) as usize);
    for t in 0..THREADS {
        let tag = Tag(u64::from(t) + 1);
        for expected in 0..ROUNDS {
            let envelope = mailbox.try_receive(Selector::Exact(tag)).unwrap();
            assert_eq!(envelope.payload, expected, "tag {tag:?} out of order");
        }
    }
    assert!(mailbox.is_empty());
}

#[test]
fn lowest_drains_in_tag_order_across_producers() {
    let mailbox = Arc::new(Mailbox::<u64>::new("boarding"));
    let producers: Vec<_> = (0..THREADS)
        .map(|t| {
            let mailbox = Arc::clone(&mailbox);
            thread::spawn(move || {
                for _ in 0..ROUNDS {
                    let tag = u64::from(t % 3) + 1;
                    mailbox.send(Tag(tag), tag).unwrap();
                }
            })
        })
        .collect();
    for p in producers {
        p.join().unwrap();
    }

    let mut last = 0;
    while let Ok(envelope) = mailbox.try_receive(Selector::Lowest) {
        assert!(envelope.payload >= last, "lowest went backwards");
        last = envelope.payload;
    }
}

#[test]
fn close_frees_every_blocked_thread() {
    let pool = Arc::new(ResourcePool::wakeup("emergency-clear"));
    let mailbox = Arc::new(Mailbox::<()>::new("confirmations"));

    let pool_waiters: Vec<_> = (0..THREADS)
        .map(|_| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || pool.acquire_interruptible(1))
        })
        .collect();
    let mailbox_waiters: Vec<_> = (0..THREADS)
        .map(|_| {
            let mailbox = Arc::clone(&mailbox);
            thread::spawn(move || mailbox.receive(Selector::Any).map(|_| ()))
        })
        .collect();

    thread::sleep(Duration::from_millis(30));
    assert!(pool.close());
    assert!(mailbox.close());

    for h in pool_waiters {
        assert_eq!(h.join().unwrap(), Err(PoolError::Closed));
    }
    for h in mailbox_waiters {
        assert_eq!(h.join().unwrap(), Err(MailboxError::Closed));
    }
}

#[test]
fn delivery_to_busy_owner_stays_pending() {
    let inbox = Arc::new(Mailbox::<u32>::new("inbox"));
    let line = InterruptLine::new(
        "worker",
        InterruptTable::recording(&InterruptKind::ALL),
        vec![Arc::clone(&inbox) as Arc<dyn Interruptible>],
    );

    // Nobody is parked; the wake is lost but the flag is not.
    assert!(line.deliver(InterruptKind::EmergencyStop));
    inbox.send(Tag(1), 7).unwrap();
    assert_eq!(inbox.receive(Selector::Any).unwrap().payload, 7);

    assert!(line.is_pending(InterruptKind::EmergencyStop));
    assert!(line.take(InterruptKind::EmergencyStop));
    assert!(!line.take(InterruptKind::EmergencyStop));
    assert!(!line.is_pending(InterruptKind::Shutdown));
}
