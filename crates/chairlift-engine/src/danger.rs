//! Probabilistic danger detection with a simulated-time cooldown.
//!
//! Each platform worker owns one [`DangerCheck`]. The RNG is a ChaCha8
//! stream seeded from `seed XOR role`, so a given seed replays the same
//! sequence of trips per worker.

use chairlift_core::WorkerRole;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::SimParams;

/// One worker's danger trigger.
#[derive(Clone, Debug)]
pub struct DangerCheck {
    rng: ChaCha8Rng,
    probability: f64,
    cooldown_minutes: f64,
    last_incident_end: Option<f64>,
}

impl DangerCheck {
    /// Trigger for `role`, seeded from `seed`.
    pub fn new(seed: u64, role: WorkerRole, params: &SimParams) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed ^ role.tag().0),
            probability: params.danger_probability,
            cooldown_minutes: params.danger_cooldown_sim,
            last_incident_end: None,
        }
    }

    /// Whether the cooldown since the last incident has elapsed.
    pub fn is_armed(&self, now_minutes: f64) -> bool {
        self.last_incident_end
            .is_none_or(|end| now_minutes - end >= self.cooldown_minutes)
    }

    /// Roll once at simulated time `now_minutes`.
    ///
    /// Never trips while cooling down or when the probability is zero; a
    /// probability of 100 trips on every armed roll.
    pub fn roll(&mut self, now_minutes: f64) -> bool {
        if self.probability <= 0.0 || !self.is_armed(now_minutes) {
            return false;
        }
        self.rng.random::<f64>() * 100.0 < self.probability
    }

    /// Start the cooldown from `now_minutes`.
    pub fn incident_ended(&mut self, now_minutes: f64) {
        self.last_incident_end = Some(now_minutes);
    }
}
