//! Named counting resource pools with atomic multi-unit acquire/release.
//!
//! [`ResourcePool`] is a counting semaphore guarded by one `Mutex` and one
//! `Condvar`. An acquire of `n` units either takes all `n` at once or
//! takes nothing, so a tourist and their companions always board or wait
//! together.
//!
//! # Wakeups
//!
//! Waiters are not served FIFO: every release wakes all waiters and the
//! first one to re-check a satisfiable count wins. Two extra wake sources
//! exist besides releases:
//!
//! - [`interrupt`](ResourcePool::interrupt) bumps an interruption
//!   generation. [`acquire`](ResourcePool::acquire) surfaces it as
//!   [`PoolError::Interrupted`]; [`acquire_interruptible`](ResourcePool::acquire_interruptible)
//!   swallows it and keeps waiting.
//! - [`close`](ResourcePool::close) marks the pool destroyed. Every blocked
//!   or future call fails with [`PoolError::Closed`].

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chairlift_core::PoolError;
use tracing::trace;

struct PoolState {
    available: u32,
    closed: bool,
    /// Interruption generation. A waiter that observes a change since it
    /// started waiting was interrupted.
    interrupts: u64,
}

/// A named non-negative counter with blocking multi-unit acquire.
///
/// `limit` is the upper bound releases may never exceed. Bounded pools
/// (station capacity, gates, chairs in flight) start full with
/// `limit == capacity`; wakeup pools (emergency clear, pause clear) start
/// empty with an effectively unbounded limit.
pub struct ResourcePool {
    name: &'static str,
    limit: u32,
    state: Mutex<PoolState>,
    changed: Condvar,
}

// Compile-time assertion: ResourcePool must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<ResourcePool>();
};

impl ResourcePool {
    /// A pool that starts full with `capacity` units.
    pub fn bounded(name: &'static str, capacity: u32) -> Self {
        Self::with_initial(name, capacity, capacity)
    }

    /// A wakeup pool: starts at zero, released in bulk by whoever clears
    /// the condition the waiters are blocked on.
    pub fn wakeup(name: &'static str) -> Self {
        Self::with_initial(name, 0, u32::MAX)
    }

    /// A pool starting at `initial` units that may never exceed `limit`.
    ///
    /// # Panics
    ///
    /// Panics if `initial > limit`.
    pub fn with_initial(name: &'static str, initial: u32, limit: u32) -> Self {
        assert!(
            initial <= limit,
            "pool '{name}' initial value {initial} exceeds limit {limit}"
        );
        Self {
            name,
            limit,
            state: Mutex::new(PoolState {
                available: initial,
                closed: false,
                interrupts: 0,
            }),
            changed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until `n` units are available, then take exactly `n`.
    ///
    /// Fails with [`PoolError::Interrupted`] if [`interrupt`](Self::interrupt)
    /// fires while waiting, and with [`PoolError::Closed`] if the pool is
    /// destroyed. Both mean "stop", never "retry".
    pub fn acquire(&self, n: u32) -> Result<(), PoolError> {
        self.wait_for(n, None, true)
    }

    /// Like [`acquire`](Self::acquire), but interruptions are retried
    /// internally. Only destruction surfaces as a failure.
    pub fn acquire_interruptible(&self, n: u32) -> Result<(), PoolError> {
        self.wait_for(n, None, false)
    }

    /// Like [`acquire_interruptible`](Self::acquire_interruptible), giving
    /// up with [`PoolError::Timeout`] after `timeout`.
    pub fn acquire_timeout(&self, n: u32, timeout: Duration) -> Result<(), PoolError> {
        self.wait_for(n, Some(Instant::now() + timeout), false)
    }

    /// Take `n` units if they are available right now.
    ///
    /// Returns [`PoolError::WouldBlock`] instead of waiting. With a
    /// capacity-1 pool this is a non-blocking mutex `try_lock`.
    pub fn try_acquire(&self, n: u32) -> Result<(), PoolError> {
        if n > self.limit {
            return Err(PoolError::ExceedsCapacity {
                requested: n,
                limit: self.limit,
            });
        }
        let mut state = self.lock();
        if state.closed {
            return Err(PoolError::Closed);
        }
        if state.available < n {
            return Err(PoolError::WouldBlock);
        }
        state.available -= n;
        Ok(())
    }

    /// Acquire `n` units and return a guard that releases them on drop.
    pub fn permit(&self, n: u32) -> Result<Permit<'_>, PoolError> {
        self.acquire_interruptible(n)?;
        Ok(Permit { pool: self, units: n })
    }

    /// Return `n` units and wake every waiter.
    ///
    /// Fails only if the pool was destroyed or the release would exceed
    /// the pool's limit (a bookkeeping bug in the caller).
    pub fn release(&self, n: u32) -> Result<(), PoolError> {
        if n == 0 {
            return Ok(());
        }
        let mut state = self.lock();
        if state.closed {
            return Err(PoolError::Closed);
        }
        match state.available.checked_add(n) {
            Some(next) if next <= self.limit => state.available = next,
            _ => {
                return Err(PoolError::Overflow {
                    released: n,
                    available: state.available,
                    limit: self.limit,
                })
            }
        }
        drop(state);
        self.changed.notify_all();
        Ok(())
    }

    /// Racy snapshot of the available count. Diagnostics only.
    pub fn value(&self) -> u32 {
        self.lock().available
    }

    /// Upper bound of the pool.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Name given at creation.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Wake every blocked waiter with an interruption.
    ///
    /// Waiters in [`acquire`](Self::acquire) return
    /// [`PoolError::Interrupted`]; all other waits re-check and resume.
    pub fn interrupt(&self) {
        let mut state = self.lock();
        state.interrupts = state.interrupts.wrapping_add(1);
        drop(state);
        self.changed.notify_all();
    }

    /// Destroy the pool, failing every blocked and future call.
    ///
    /// Returns `true` for the call that actually closed the pool.
    pub fn close(&self) -> bool {
        let mut state = self.lock();
        if state.closed {
            return false;
        }
        state.closed = true;
        let stranded = state.available;
        drop(state);
        self.changed.notify_all();
        trace!(pool = self.name, available = stranded, "pool closed");
        true
    }

    fn wait_for(
        &self,
        n: u32,
        deadline: Option<Instant>,
        surface_interrupts: bool,
    ) -> Result<(), PoolError> {
        if n > self.limit {
            return Err(PoolError::ExceedsCapacity {
                requested: n,
                limit: self.limit,
            });
        }
        let mut state = self.lock();
        let seen = state.interrupts;
        loop {
            if state.closed {
                return Err(PoolError::Closed);
            }
            if state.available >= n {
                state.available -= n;
                return Ok(());
            }
            if surface_interrupts && state.interrupts != seen {
                return Err(PoolError::Interrupted);
            }
            state = match deadline {
                None => self
                    .changed
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(PoolError::Timeout);
                    }
                    self.changed
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }
}

impl std::fmt::Debug for ResourcePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("ResourcePool")
            .field("name", &self.name)
            .field("available", &state.available)
            .field("limit", &self.limit)
            .field("closed", &state.closed)
            .finish()
    }
}

/// Units held from a [`ResourcePool`], returned when dropped.
#[must_use = "dropping a permit releases its units immediately"]
pub struct Permit<'a> {
    pool: &'a ResourcePool,
    units: u32,
}

impl Permit<'_> {
    /// Units held by this permit.
    pub fn units(&self) -> u32 {
        self.units
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        // A destroyed pool has nothing left to return units to.
        let _ = self.pool.release(self.units);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn acquire_takes_all_units_or_none() {
        let pool = ResourcePool::bounded("station", 4);
        pool.acquire(3).unwrap();
        assert_eq!(pool.try_acquire(2), Err(PoolError::WouldBlock));
        assert_eq!(pool.value(), 1, "failed try must not take a partial amount");
        pool.acquire(1).unwrap();
        assert_eq!(pool.value(), 0);
    }

    #[test]
    fn acquire_more_than_limit_fails_fast() {
        let pool = ResourcePool::bounded("chair", 4);
        assert_eq!(
            pool.acquire(5),
            Err(PoolError::ExceedsCapacity {
                requested: 5,
                limit: 4
            })
        );
    }

    #[test]
    fn release_above_limit_is_rejected() {
        let pool = ResourcePool::bounded("gates", 2);
        assert!(matches!(pool.release(1), Err(PoolError::Overflow { .. })));
        assert_eq!(pool.value(), 2);
    }

    #[test]
    fn blocked_acquire_wakes_on_release() {
        let pool = Arc::new(ResourcePool::bounded("lift", 1));
        pool.acquire(1).unwrap();
        let waiter = {
            let pool = Arc::clone(&pool);
            thread::spawn(move || pool.acquire(1))
        };
        thread::sleep(Duration::from_millis(20));
        pool.release(1).unwrap();
        assert_eq!(waiter.join().unwrap(), Ok(()));
        assert_eq!(pool.value(), 0);
    }

    #[test]
    fn close_unblocks_every_waiter() {
        let pool = Arc::new(ResourcePool::wakeup("clear"));
        let waiters: Vec<_> = (0..4)
            .map(|i| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    if i % 2 == 0 {
                        pool.acquire(1)
                    } else {
                        pool.acquire_interruptible(1)
                    }
                })
            })
            .collect();
        thread::sleep(Duration::from_millis(20));
        assert!(pool.close());
        assert!(!pool.close(), "second close is a no-op");
        for w in waiters {
            assert_eq!(w.join().unwrap(), Err(PoolError::Closed));
        }
        assert_eq!(pool.release(1), Err(PoolError::Closed));
        assert_eq!(pool.try_acquire(0), Err(PoolError::Closed));
    }

    #[test]
    fn interrupt_surfaces_only_in_plain_acquire() {
        let pool = Arc::new(ResourcePool::wakeup("clear"));
        let plain = {
            let pool = Arc::clone(&pool);
            thread::spawn(move || pool.acquire(1))
        };
        let resilient = {
            let pool = Arc::clone(&pool);
            thread::spawn(move || pool.acquire_interruptible(1))
        };
        thread::sleep(Duration::from_millis(20));
        pool.interrupt();
        assert_eq!(plain.join().unwrap(), Err(PoolError::Interrupted));

        // The interruptible waiter is still parked; a release satisfies it.
        thread::sleep(Duration::from_millis(20));
        pool.release(1).unwrap();
        assert_eq!(resilient.join().unwrap(), Ok(()));
    }

    #[test]
    fn acquire_timeout_expires() {
        let pool = ResourcePool::wakeup("pause");
        let start = Instant::now();
        assert_eq!(
            pool.acquire_timeout(1, Duration::from_millis(30)),
            Err(PoolError::Timeout)
        );
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn permit_releases_on_drop() {
        let pool = ResourcePool::bounded("gate", 1);
        {
            let permit = pool.permit(1).unwrap();
            assert_eq!(permit.units(), 1);
            assert_eq!(pool.value(), 0);
        }
        assert_eq!(pool.value(), 1);
    }

    #[test]
    fn bulk_release_wakes_exactly_that_many() {
        let pool = Arc::new(ResourcePool::wakeup("clear"));
        let woken = Arc::new(AtomicU32::new(0));
        let waiters: Vec<_> = (0..5)
            .map(|_| {
                let pool = Arc::clone(&pool);
                let woken = Arc::clone(&woken);
                thread::spawn(move || {
                    let r = pool.acquire_interruptible(1);
                    if r.is_ok() {
                        woken.fetch_add(1, Ordering::SeqCst);
                    }
                    r
                })
            })
            .collect();
        thread::sleep(Duration::from_millis(30));
        pool.release(3).unwrap();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(woken.load(Ordering::SeqCst), 3);

        pool.close();
        let results: Vec<_> = waiters.into_iter().map(|w| w.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 3);
        assert_eq!(
            results
                .iter()
                .filter(|r| **r == Err(PoolError::Closed))
                .count(),
            2
        );
    }

    #[test]
    fn concurrent_holders_never_exceed_capacity() {
        let pool = Arc::new(ResourcePool::bounded("station", 4));
        let held = Arc::new(AtomicU32::new(0));
        let peak = Arc::new(AtomicU32::new(0));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let pool = Arc::clone(&pool);
                let held = Arc::clone(&held);
                let peak = Arc::clone(&peak);
                thread::spawn(move || {
                    let n = 1 + (i % 3);
                    for _ in 0..50 {
                        pool.acquire(n).unwrap();
                        let now = held.fetch_add(n, Ordering::SeqCst) + n;
                        peak.fetch_max(now, Ordering::SeqCst);
                        thread::yield_now();
                        held.fetch_sub(n, Ordering::SeqCst);
                        pool.release(n).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 4);
        assert_eq!(pool.value(), 4);
    }

    // ── proptest ───────────────────────────────────────────────

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Clone, Debug)]
        enum Op {
            TryAcquire(u32),
            Release(u32),
        }

        fn arb_op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0u32..6).prop_map(Op::TryAcquire),
                (0u32..6).prop_map(Op::Release),
            ]
        }

        proptest! {
            #[test]
            fn value_stays_within_bounds(
                capacity in 1u32..8,
                ops in prop::collection::vec(arb_op(), 0..64),
            ) {
                let pool = ResourcePool::bounded("prop", capacity);
                let mut model = capacity;
                for op in ops {
                    match op {
                        Op::TryAcquire(n) => {
                            let ok = pool.try_acquire(n).is_ok();
                            prop_assert_eq!(ok, n <= model);
                            if ok {
                                model -= n;
                            }
                        }
                        Op::Release(n) => {
                            let ok = pool.release(n).is_ok();
                            prop_assert_eq!(ok, model + n <= capacity);
                            if ok {
                                model += n;
                            }
                        }
                    }
                    prop_assert_eq!(pool.value(), model);
                    prop_assert!(pool.value() <= capacity);
                }
            }
        }
    }
}
