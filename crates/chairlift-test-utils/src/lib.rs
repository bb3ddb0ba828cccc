//! Test fixtures for chairlift development.
//!
//! Provides fast resort configurations, a test-friendly tracing
//! subscriber, scripted riders (see [`fixtures`]) and a deadline-bounded
//! polling helper for multi-threaded assertions.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::thread;
use std::time::{Duration, Instant};

use chairlift_engine::ResortConfig;
use tracing_subscriber::EnvFilter;

pub use fixtures::{spawn_riders, RiderHandle};

/// A quiet resort that runs a 600-minute day in 60 real seconds with
/// short tick, poll and batch intervals. Danger checks are disabled.
pub fn fast_config() -> ResortConfig {
    ResortConfig {
        danger_probability: 0.0,
        chair_travel_time_sim: 1.0,
        clock_tick_ms: 2,
        poll_ms: 2,
        batch_timeout_ms: 25,
        ..ResortConfig::default()
    }
}

/// Install a test-writer subscriber honoring `RUST_LOG`. Safe to call
/// from every test; only the first call installs anything.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Poll `cond` every millisecond until it holds.
///
/// # Panics
///
/// Panics with `what` if `cond` is still false after `timeout`.
pub fn wait_until(timeout: Duration, what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + timeout;
    while !cond() {
        if Instant::now() > deadline {
            panic!("timed out after {timeout:?} waiting for {what}");
        }
        thread::sleep(Duration::from_millis(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_config_is_valid() {
        fast_config().validate().unwrap();
    }

    #[test]
    fn wait_until_returns_once_true() {
        let mut n = 0;
        wait_until(Duration::from_secs(1), "counter", || {
            n += 1;
            n > 3
        });
        assert_eq!(n, 4);
    }
}
