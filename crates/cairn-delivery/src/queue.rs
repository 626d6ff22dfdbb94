//! Durable transmit queue boundary.
//!
//! The queue's storage engine and its priority/ordering policy are owned
//! elsewhere; the transmit loop only pops, pushes back on transport
//! failure, and folds the queue's health into the server's report.

use async_trait::async_trait;
use cairn_core::Transmission;

use crate::health::HealthReport;

#[async_trait]
pub trait TransmitQueue: Send + Sync {
    /// Wait for the next record. `None` means the queue was closed and the
    /// consumer should exit.
    async fn blocking_pop(&self) -> Option<Transmission>;

    /// Return a record to the queue after a transport failure.
    /// `false` means the queue is closed and the record was not accepted.
    fn push(&self, t: Transmission) -> bool;

    fn health_report(&self) -> HealthReport;
}
