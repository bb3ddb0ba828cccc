//! Scripted riders.
//!
//! [`spawn_riders`] starts one named thread per [`RiderProfile`], each
//! taking a fixed number of rides through a live resort.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use chairlift_engine::{RideError, RideRecord, Rider, RiderProfile, Substrate};

/// A rider thread and the profile it runs.
pub struct RiderHandle {
    pub profile: RiderProfile,
    pub handle: JoinHandle<Result<Vec<RideRecord>, RideError>>,
}

impl RiderHandle {
    /// Join the rider thread.
    ///
    /// # Panics
    ///
    /// Panics if the rider thread panicked.
    pub fn join(self) -> Result<Vec<RideRecord>, RideError> {
        self.handle.join().expect("rider thread panicked")
    }
}

/// Spawn one thread per profile, each taking `rides` rides.
pub fn spawn_riders(
    substrate: &Arc<Substrate>,
    profiles: impl IntoIterator<Item = RiderProfile>,
    rides: u32,
) -> Vec<RiderHandle> {
    profiles
        .into_iter()
        .map(|profile| {
            let mut rider = Rider::new(Arc::clone(substrate), profile);
            let handle = thread::Builder::new()
                .name(format!("rider-{}", profile.tourist_id))
                .spawn(move || rider.run(rides))
                .expect("spawn rider thread");
            RiderHandle { profile, handle }
        })
        .collect()
}
