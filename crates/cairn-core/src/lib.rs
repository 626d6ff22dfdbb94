//! cairn-core — shared types, schedule computation, and configuration.
//! All other Cairn crates depend on this one.

pub mod config;
pub mod schedule;
pub mod transmission;

pub use config::{DeliveryConfig, Schedule, ScheduleError, TransmissionConfig};
pub use schedule::{delays_for_config, delays_for_request, permutation, schedule_seed};
pub use transmission::{AttributedSignature, PeerId, ReportFormat, Transmission};
