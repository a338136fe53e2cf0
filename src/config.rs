use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::floor::Floor;

/// The configuration snapshot a `Bank` (and, transitively, every
/// `Elevator` it constructs) is built from. Consumed once at
/// construction; nothing here is mutated afterward. Loading this from
/// environment variables or a config file is an external collaborator's
/// job, not this crate's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub travel_time_per_floor_ms: u64,
    pub door_open_time_ms: u64,
    pub estimation_limit_ms: i64,
    pub use_free_first: bool,
    pub min_floor: Floor,
    pub max_floor: Floor,
    pub nr_of_elevators: u32,
    pub initial_floor: Floor,
    pub log_level: LogLevel,
}

impl Config {
    /// Checks the cross-field invariants the table in the external
    /// interfaces section implies but individual fields can't enforce:
    /// bounds are ordered, there is at least one elevator, and the
    /// initial floor actually falls within them.
    pub fn validate(&self) -> Result<(), Error> {
        if self.min_floor > self.max_floor {
            return Err(Error::domain(format!(
                "min_floor {} is above max_floor {}",
                self.min_floor, self.max_floor
            )));
        }
        if self.nr_of_elevators == 0 {
            return Err(Error::domain("nr_of_elevators must be at least 1"));
        }
        if self.initial_floor < self.min_floor || self.initial_floor > self.max_floor {
            return Err(Error::domain(format!(
                "initial_floor {} is outside [{}, {}]",
                self.initial_floor, self.min_floor, self.max_floor
            )));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            travel_time_per_floor_ms: 2_000,
            door_open_time_ms: 5_000,
            estimation_limit_ms: 60_000,
            use_free_first: true,
            min_floor: 0,
            max_floor: 10,
            nr_of_elevators: 3,
            initial_floor: 0,
            log_level: LogLevel::Info,
        }
    }
}

/// Mirrors `log::LevelFilter` but derives `Serialize`/`Deserialize`
/// directly, so a `Config` can round-trip through `serde` without a
/// newtype wrapper at every call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(LogLevel::Off),
            "error" => Ok(LogLevel::Error),
            "warn" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(Error::domain(format!("unrecognized log level '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_initial_floor_outside_bounds() {
        let config = Config { initial_floor: 99, ..Config::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_inverted_bounds() {
        let config = Config { min_floor: 10, max_floor: 0, ..Config::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_elevators() {
        let config = Config { nr_of_elevators: 0, ..Config::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn log_level_round_trips_through_its_string_form() {
        assert_eq!("debug".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert!("nonsense".parse::<LogLevel>().is_err());
    }
}
