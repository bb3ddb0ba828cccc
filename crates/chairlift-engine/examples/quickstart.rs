//! Chairlift quickstart: one simulated morning on a busy lift.
//!
//! Demonstrates:
//!   1. Building a `ResortConfig` and starting a `Resort`
//!   2. Driving tourists through it with `Rider` clients on their own threads
//!   3. Suspending and resuming the simulation mid-run
//!   4. Orderly shutdown and the `ShutdownReport`
//!
//! Run with:
//!   RUST_LOG=chairlift_engine=debug cargo run --example quickstart

use std::thread;
use std::time::Duration;

use chairlift_core::{TouristId, TouristKind};
use chairlift_engine::{Resort, ResortConfig, RiderProfile};
use tracing_subscriber::EnvFilter;

// ─── Scenario parameters ────────────────────────────────────────

const TOURISTS: u32 = 24;
const RIDES_EACH: u32 = 3;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 08:00 to 12:00 in 20 real seconds: 12 simulated minutes per second.
    let config = ResortConfig {
        sim_start_minutes: 480.0,
        sim_end_minutes: 720.0,
        real_duration_secs: 20.0,
        chair_travel_time_sim: 4.0,
        danger_probability: 0.2,
        danger_duration_sim: 3.0,
        ..ResortConfig::default()
    };
    let mut resort = Resort::start(config)?;

    let riders: Vec<_> = (0..TOURISTS)
        .map(|i| {
            let profile = RiderProfile {
                tourist_id: TouristId(i),
                kind: if i % 4 == 0 {
                    TouristKind::Cyclist
                } else {
                    TouristKind::Walker
                },
                kid_count: (i % 3) as u8,
                expedited: i % 7 == 0,
            };
            let mut rider = resort.rider(profile);
            thread::spawn(move || rider.run(RIDES_EACH))
        })
        .collect();

    thread::sleep(Duration::from_secs(2));
    resort.suspend();
    println!("suspended at {:.1} sim minutes", resort.substrate().region().now_minutes());
    thread::sleep(Duration::from_secs(1));
    resort.resume();

    let mut rides = 0;
    for handle in riders {
        if let Ok(Ok(done)) = handle.join() {
            rides += done.len();
        }
    }

    let report = resort.shutdown();
    println!("rides completed:   {rides}");
    println!("chairs dispatched: {}", report.stats.chairs_dispatched);
    println!(
        "incidents:         {} lower, {} upper",
        report.stats.incidents_lower, report.stats.incidents_upper
    );
    println!("chairs stranded:   {}", report.chairs_stranded);
    println!("shutdown took:     {} ms", report.total_ms);
    Ok(())
}
