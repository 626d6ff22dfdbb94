//! cairn-delivery — per-destination durable delivery pipeline.
//!
//! One [`Server`] per destination URL owns that destination's durable
//! queue, network client, and persistence handle, and runs two concurrent
//! worker loops: the transmit loop (pop, pack, send, classify) and the
//! delete loop (purge delivered records from storage). Delivery semantics
//! are at-least-once transmission plus idempotent server-side
//! deduplication; failures on one destination never affect another.

pub mod backoff;
pub mod client;
pub mod counters;
pub mod health;
pub mod packer;
pub mod queue;
pub mod response;
pub mod server;
pub mod store;

pub use client::{TransmitClient, TransmitRequest, TransmitResponse, TransportError};
pub use counters::Counters;
pub use health::{copy_health, healthy, HealthReport};
pub use packer::{JsonReportPacker, PackError, ReportPacker};
pub use queue::TransmitQueue;
pub use response::{TransmitStatus, DUPLICATE_REPORT};
pub use server::Server;
pub use store::{DeliveryStore, StoreError};
