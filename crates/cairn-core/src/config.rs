//! Configuration for scheduling and delivery.
//!
//! `TransmissionConfig` is parsed per request from a free-form key/value
//! map; `DeliveryConfig` is the static per-node delivery tuning, loaded by
//! whatever configuration layer hosts this subsystem.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How eligible peers are spread over time when transmitting one report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Every eligible peer transmits with zero delay. Shape `[N]`.
    AllAtOnce,
    /// Peers transmit in strict sequence, one per delta-stage interval.
    /// Shape `N × [1]`.
    OneAtATime,
}

impl Schedule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Schedule::AllAtOnce => "allAtOnce",
            Schedule::OneAtATime => "oneAtATime",
        }
    }
}

impl FromStr for Schedule {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allAtOnce" => Ok(Schedule::AllAtOnce),
            "oneAtATime" => Ok(Schedule::OneAtATime),
            other => Err(ScheduleError::UnknownSchedule(other.to_string())),
        }
    }
}

/// Errors from schedule configuration and delay computation.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("unknown schedule type {0:?}")]
    UnknownSchedule(String),
    #[error("failed to parse deltaStage {value:?} as duration: {source}")]
    BadDeltaStage {
        value: String,
        source: humantime::DurationError,
    },
    #[error("transmission id must not be empty")]
    EmptyTransmissionId,
}

/// Per-request transmission schedule. Immutable once parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransmissionConfig {
    pub schedule: Schedule,
    pub delta_stage: Duration,
}

impl TransmissionConfig {
    /// Recognized keys in the request's free-form configuration map.
    pub const KEY_SCHEDULE: &'static str = "schedule";
    pub const KEY_DELTA_STAGE: &'static str = "deltaStage";

    /// Extract the schedule from a request's configuration map.
    ///
    /// Both keys absent (or empty) means the default `{allAtOnce, 0}`.
    /// Otherwise `deltaStage` must parse as a duration ("250ms", "1s", …)
    /// and the schedule name must be recognized.
    pub fn extract(values: &HashMap<String, String>) -> Result<Self, ScheduleError> {
        let schedule = values
            .get(Self::KEY_SCHEDULE)
            .map(String::as_str)
            .unwrap_or("");
        let delta_stage = values
            .get(Self::KEY_DELTA_STAGE)
            .map(String::as_str)
            .unwrap_or("");

        if schedule.is_empty() && delta_stage.is_empty() {
            return Ok(TransmissionConfig {
                schedule: Schedule::AllAtOnce,
                delta_stage: Duration::ZERO,
            });
        }

        let delta_stage =
            humantime::parse_duration(delta_stage).map_err(|source| ScheduleError::BadDeltaStage {
                value: delta_stage.to_string(),
                source,
            })?;

        Ok(TransmissionConfig {
            schedule: schedule.parse()?,
            delta_stage,
        })
    }
}

/// Static delivery tuning for one node, shared by every destination server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Maximum records the durable queue holds per server. Also sizes the
    /// delete-request channel.
    pub transmit_queue_max_size: u32,
    /// Base per-attempt transmit timeout; each attempt is jittered around
    /// this value.
    #[serde(with = "humantime_serde")]
    pub transmit_timeout: Duration,
    /// Log packed payloads at debug level on every delivered attempt.
    pub verbose_logging: bool,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            transmit_queue_max_size: 10_000,
            transmit_timeout: Duration::from_secs(5),
            verbose_logging: false,
        }
    }
}
