//! Network transmission client boundary.
//!
//! Connection setup, TLS, and wire framing live behind this trait.
//! The delivery server only needs to send one packed request and read
//! back the destination's decision.

use async_trait::async_trait;
use thiserror::Error;

use crate::health::HealthReport;

/// One packed report ready for the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransmitRequest {
    pub payload: Vec<u8>,
    pub report_format: u32,
}

/// The destination server's reply. An empty `error` means the report was
/// accepted; otherwise `code` identifies the server's decision.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransmitResponse {
    pub code: i32,
    pub error: String,
}

/// Network-level failure: no confirmed server decision was received, so
/// the attempt is locally retryable.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("transmit attempt timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connection(String),
}

#[async_trait]
pub trait TransmitClient: Send + Sync {
    async fn transmit(&self, req: &TransmitRequest) -> Result<TransmitResponse, TransportError>;

    fn health_report(&self) -> HealthReport;
}
