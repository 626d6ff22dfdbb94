//! Persistence boundary for delivered-record cleanup.

use async_trait::async_trait;
use thiserror::Error;

/// Storage-layer failure during deletion. Retried by the delete loop with
/// backoff; never fatal to the process.
#[derive(Debug, Clone, Error)]
#[error("storage failure: {0}")]
pub struct StoreError(pub String);

#[async_trait]
pub trait DeliveryStore: Send + Sync {
    /// Remove delivered records by content hash. Idempotent: deleting an
    /// already-absent hash is success.
    async fn delete(&self, hashes: &[[u8; 32]]) -> Result<(), StoreError>;

    /// Identifier of the oracle network this store serves; used as a
    /// log and metric label.
    fn don_id(&self) -> u32;
}
