//! Benchmark profiles and utilities for the chairlift substrate.
//!
//! Provides pre-built inputs for benchmarking:
//!
//! - [`reference_profile`]: a default-sized resort with danger disabled
//! - [`boarding_stream`]: a deterministic mix of boarding requests via seed

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use chairlift_core::{BoardingRequest, Tag, TouristId, TouristKind, CHAIR_CAPACITY};
use chairlift_engine::ResortConfig;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Build a reference benchmark profile: default capacities, short
/// batch timeout, no danger checks so runs are comparable.
pub fn reference_profile(seed: u64) -> ResortConfig {
    ResortConfig {
        danger_probability: 0.0,
        chair_travel_time_sim: 1.0,
        batch_timeout_ms: 5,
        clock_tick_ms: 2,
        poll_ms: 2,
        seed,
        ..ResortConfig::default()
    }
}

/// Generate `n` boarding requests with their priority tags.
///
/// Roughly one in eight is expedited; party sizes follow the walker /
/// cyclist and kid mix, capped at one chair.
pub fn boarding_stream(n: u32, seed: u64) -> Vec<(Tag, BoardingRequest)> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let kind = if rng.random_bool(0.25) {
                TouristKind::Cyclist
            } else {
                TouristKind::Walker
            };
            let kid_count = rng.random_range(0..=2u8);
            let slots_needed = kind
                .base_slots()
                .saturating_add(kid_count)
                .min(CHAIR_CAPACITY);
            let tag = if rng.random_ratio(1, 8) {
                Tag::EXPEDITED
            } else {
                Tag::STANDARD
            };
            let request = BoardingRequest {
                tourist_id: TouristId(i),
                kind,
                slots_needed,
                kid_count,
            };
            (tag, request)
        })
        .collect()
}
