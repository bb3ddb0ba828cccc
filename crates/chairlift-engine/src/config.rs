//! Resort configuration, validation, and derived clock parameters.
//!
//! [`ResortConfig`] is the builder-input for [`Resort::start`](crate::Resort::start).
//! [`validate()`](ResortConfig::validate) checks structural invariants at
//! startup; [`SimParams`] holds the write-once values every actor reads.

use std::error::Error;
use std::fmt;

use chairlift_core::{ResortKey, CHAIR_CAPACITY};

/// Real-time run length substituted when the configured one is unusable.
pub const DEFAULT_REAL_DURATION_SECS: f64 = 60.0;

// ── ResortConfig ───────────────────────────────────────────────────

/// Everything needed to build a resort substrate and start its actors.
///
/// Times ending in `_minutes` or `_sim` are simulated minutes.
#[derive(Clone, Debug)]
pub struct ResortConfig {
    /// Registry key of the substrate. Default: a process-unique key.
    pub resort_key: ResortKey,
    /// Maximum slots waiting at the lower station. Default: 40.
    pub station_capacity: u32,
    /// Opening time. Default: 480 (08:00).
    pub sim_start_minutes: f64,
    /// Closing time. Default: 1080 (18:00).
    pub sim_end_minutes: f64,
    /// Real seconds the whole day should take. Values `<= 0` fall back to
    /// [`DEFAULT_REAL_DURATION_SECS`]. Default: 60.
    pub real_duration_secs: f64,
    /// Ride time from lower to upper platform. Default: 8.
    pub chair_travel_time_sim: f64,
    /// Chance (percent) that one danger check trips. Default: 1.
    pub danger_probability: f64,
    /// How long an emergency stop must last before resuming. Default: 5.
    pub danger_duration_sim: f64,
    /// Minimum gap between the end of one incident and the next danger
    /// check. Default: 60.
    pub danger_cooldown_sim: f64,
    /// Chairs allowed on the cable at once. Default: 36.
    pub max_chairs_in_flight: u32,
    /// Total chairs; ids cycle over `0..fleet_size`. Default: 72.
    pub fleet_size: u32,
    /// Gates into the resort. Default: 4.
    pub entry_gates: u32,
    /// Gates onto the lower platform. Default: 3.
    pub platform_gates: u32,
    /// Gates leaving the upper platform. Default: 2.
    pub exit_gates: u32,
    /// Real milliseconds a partially filled chair waits for company.
    /// Default: 200.
    pub batch_timeout_ms: u64,
    /// Real milliseconds between clock publications. Default: 10.
    pub clock_tick_ms: u64,
    /// Real milliseconds between pending-flag checks in wait loops.
    /// Default: 20.
    pub poll_ms: u64,
    /// Capacity of the entry log. Default: 4096.
    pub max_tourists: usize,
    /// Seed for the danger checks. Default: 0.
    pub seed: u64,
}

impl Default for ResortConfig {
    fn default() -> Self {
        Self {
            resort_key: ResortKey::unique(),
            station_capacity: 40,
            sim_start_minutes: 480.0,
            sim_end_minutes: 1080.0,
            real_duration_secs: DEFAULT_REAL_DURATION_SECS,
            chair_travel_time_sim: 8.0,
            danger_probability: 1.0,
            danger_duration_sim: 5.0,
            danger_cooldown_sim: 60.0,
            max_chairs_in_flight: 36,
            fleet_size: 72,
            entry_gates: 4,
            platform_gates: 3,
            exit_gates: 2,
            batch_timeout_ms: 200,
            clock_tick_ms: 10,
            poll_ms: 20,
            max_tourists: 4096,
            seed: 0,
        }
    }
}

impl ResortConfig {
    /// Check structural invariants.
    ///
    /// An unusable `real_duration_secs` is not an error; it is replaced
    /// when [`SimParams`] are derived.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let capacities = [
            ("station_capacity", self.station_capacity),
            ("max_chairs_in_flight", self.max_chairs_in_flight),
            ("fleet_size", self.fleet_size),
            ("entry_gates", self.entry_gates),
            ("platform_gates", self.platform_gates),
            ("exit_gates", self.exit_gates),
        ];
        for (what, value) in capacities {
            if value == 0 {
                return Err(ConfigError::ZeroCapacity { what });
            }
        }
        if self.station_capacity < u32::from(CHAIR_CAPACITY) {
            return Err(ConfigError::StationTooSmall {
                station_capacity: self.station_capacity,
            });
        }
        if self.max_tourists == 0 {
            return Err(ConfigError::ZeroCapacity {
                what: "max_tourists",
            });
        }
        if self.fleet_size < self.max_chairs_in_flight {
            return Err(ConfigError::FleetTooSmall {
                fleet_size: self.fleet_size,
                max_chairs_in_flight: self.max_chairs_in_flight,
            });
        }
        if !self.sim_start_minutes.is_finite()
            || !self.sim_end_minutes.is_finite()
            || self.sim_end_minutes <= self.sim_start_minutes
        {
            return Err(ConfigError::InvalidWindow {
                start: self.sim_start_minutes,
                end: self.sim_end_minutes,
            });
        }
        if !(0.0..=100.0).contains(&self.danger_probability) {
            return Err(ConfigError::InvalidProbability {
                value: self.danger_probability,
            });
        }
        let durations = [
            ("chair_travel_time_sim", self.chair_travel_time_sim),
            ("danger_duration_sim", self.danger_duration_sim),
            ("danger_cooldown_sim", self.danger_cooldown_sim),
        ];
        for (what, value) in durations {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidDuration { what, value });
            }
        }
        let intervals = [
            ("batch_timeout_ms", self.batch_timeout_ms),
            ("clock_tick_ms", self.clock_tick_ms),
            ("poll_ms", self.poll_ms),
        ];
        for (what, value) in intervals {
            if value == 0 {
                return Err(ConfigError::ZeroInterval { what });
            }
        }
        Ok(())
    }

    /// Derive the write-once clock and danger parameters.
    pub fn sim_params(&self) -> SimParams {
        SimParams {
            time_acceleration: time_acceleration(
                self.sim_start_minutes,
                self.sim_end_minutes,
                self.real_duration_secs,
            ),
            sim_start_minutes: self.sim_start_minutes,
            sim_end_minutes: self.sim_end_minutes,
            chair_travel_time_sim: self.chair_travel_time_sim,
            danger_probability: self.danger_probability,
            danger_duration_sim: self.danger_duration_sim,
            danger_cooldown_sim: self.danger_cooldown_sim,
        }
    }
}

/// Simulated minutes per real second.
///
/// A non-positive or non-finite `real_duration_secs` is replaced by
/// [`DEFAULT_REAL_DURATION_SECS`].
pub fn time_acceleration(start_minutes: f64, end_minutes: f64, real_duration_secs: f64) -> f64 {
    let duration = if real_duration_secs.is_finite() && real_duration_secs > 0.0 {
        real_duration_secs
    } else {
        DEFAULT_REAL_DURATION_SECS
    };
    (end_minutes - start_minutes) / duration
}

// ── SimParams ──────────────────────────────────────────────────────

/// Write-once parameters published in the shared region at startup.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimParams {
    /// Simulated minutes per real second.
    pub time_acceleration: f64,
    /// Opening time in simulated minutes.
    pub sim_start_minutes: f64,
    /// Closing time in simulated minutes.
    pub sim_end_minutes: f64,
    /// Ride duration in simulated minutes.
    pub chair_travel_time_sim: f64,
    /// Danger check trip chance, percent.
    pub danger_probability: f64,
    /// Minimum incident duration in simulated minutes.
    pub danger_duration_sim: f64,
    /// Minimum gap between incidents in simulated minutes.
    pub danger_cooldown_sim: f64,
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected by [`ResortConfig::validate()`].
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// A capacity or count is zero.
    ZeroCapacity {
        /// Name of the offending knob.
        what: &'static str,
    },
    /// The waiting area cannot hold a party that fills a whole chair.
    StationTooSmall {
        /// Configured station capacity.
        station_capacity: u32,
    },
    /// More chairs may fly than exist.
    FleetTooSmall {
        /// Configured fleet size.
        fleet_size: u32,
        /// Configured in-flight limit.
        max_chairs_in_flight: u32,
    },
    /// The simulated day is empty, inverted, or not finite.
    InvalidWindow {
        /// Configured opening time.
        start: f64,
        /// Configured closing time.
        end: f64,
    },
    /// Danger probability outside `[0, 100]`.
    InvalidProbability {
        /// The invalid value.
        value: f64,
    },
    /// A simulated duration is negative or not finite.
    InvalidDuration {
        /// Name of the offending knob.
        what: &'static str,
        /// The invalid value.
        value: f64,
    },
    /// A real-time interval is zero.
    ZeroInterval {
        /// Name of the offending knob.
        what: &'static str,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroCapacity { what } => write!(f, "{what} must be at least 1"),
            Self::StationTooSmall { station_capacity } => write!(
                f,
                "station_capacity {station_capacity} cannot hold a full chair of {CHAIR_CAPACITY}"
            ),
            Self::FleetTooSmall {
                fleet_size,
                max_chairs_in_flight,
            } => write!(
                f,
                "fleet_size {fleet_size} is smaller than max_chairs_in_flight {max_chairs_in_flight}"
            ),
            Self::InvalidWindow { start, end } => {
                write!(f, "simulated day [{start}, {end}) is empty or not finite")
            }
            Self::InvalidProbability { value } => {
                write!(f, "danger_probability must be within [0, 100], got {value}")
            }
            Self::InvalidDuration { what, value } => {
                write!(f, "{what} must be finite and non-negative, got {value}")
            }
            Self::ZeroInterval { what } => write!(f, "{what} must be at least 1ms"),
        }
    }
}

impl Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        ResortConfig::default().validate().unwrap();
    }

    #[test]
    fn zero_station_capacity_rejected() {
        let config = ResortConfig {
            station_capacity: 0,
            ..ResortConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroCapacity {
                what: "station_capacity"
            })
        );
    }

    #[test]
    fn station_must_hold_a_full_chair() {
        let config = ResortConfig {
            station_capacity: 2,
            ..ResortConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::StationTooSmall {
                station_capacity: 2
            })
        );
        let exact = ResortConfig {
            station_capacity: u32::from(CHAIR_CAPACITY),
            ..ResortConfig::default()
        };
        exact.validate().unwrap();
    }

    #[test]
    fn inverted_day_rejected() {
        let config = ResortConfig {
            sim_start_minutes: 600.0,
            sim_end_minutes: 600.0,
            ..ResortConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidWindow { .. })
        ));
    }

    #[test]
    fn fleet_must_cover_in_flight() {
        let config = ResortConfig {
            fleet_size: 4,
            max_chairs_in_flight: 8,
            ..ResortConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::FleetTooSmall { .. })
        ));
    }

    #[test]
    fn probability_bounds() {
        for bad in [-0.1, 100.1, f64::NAN] {
            let config = ResortConfig {
                danger_probability: bad,
                ..ResortConfig::default()
            };
            assert!(config.validate().is_err(), "{bad} accepted");
        }
        let edge = ResortConfig {
            danger_probability: 100.0,
            ..ResortConfig::default()
        };
        edge.validate().unwrap();
    }

    #[test]
    fn acceleration_from_window_and_duration() {
        // 600 simulated minutes over 60 real seconds.
        assert!((time_acceleration(480.0, 1080.0, 60.0) - 10.0).abs() < 1e-12);
        assert!((time_acceleration(0.0, 2.0, 60.0) - (2.0 / 60.0)).abs() < 1e-12);
    }

    #[test]
    fn invalid_duration_falls_back_to_default() {
        for bad in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            let accel = time_acceleration(0.0, 120.0, bad);
            assert!((accel - 2.0).abs() < 1e-12, "{bad} gave {accel}");
        }
        let config = ResortConfig {
            real_duration_secs: 0.0,
            ..ResortConfig::default()
        };
        config.validate().unwrap();
        assert!((config.sim_params().time_acceleration - 10.0).abs() < 1e-12);
    }
}
