//! Delivery server — one per destination URL.
//!
//! Owns the destination's durable queue, network client, and persistence
//! handle, and runs two independently cancellable worker loops:
//!
//!   Transmit Loop: pop → pack → send (jittered timeout) → classify →
//!                  request deletion, or push back and back off on a
//!                  transport failure.
//!   Delete Loop:   consume confirmed hashes from a bounded channel and
//!                  purge them from storage, backing off on storage error.
//!
//! The loops share only the queue and the delete channel. The delete
//! hand-off is a non-blocking try-send: under sustained overload deletion
//! requests are dropped (and logged loudly) rather than coupling transmit
//! throughput to deletion throughput. A delivered-but-undeleted record is
//! a safe state.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use cairn_core::{DeliveryConfig, ReportFormat, Transmission};

use crate::backoff::{with_jitter, Backoff};
use crate::client::{TransmitClient, TransmitRequest, TransmitResponse, TransportError};
use crate::counters::Counters;
use crate::health::{copy_health, HealthReport};
use crate::packer::{PackError, ReportPacker};
use crate::queue::TransmitQueue;
use crate::response::TransmitStatus;
use crate::store::DeliveryStore;

// Transmit retries favor latency; storage faults clear slowly.
const TRANSMIT_BACKOFF_MIN: Duration = Duration::from_millis(5);
const TRANSMIT_BACKOFF_MAX: Duration = Duration::from_secs(1);
const DELETE_BACKOFF_MIN: Duration = Duration::from_secs(1);
const DELETE_BACKOFF_MAX: Duration = Duration::from_secs(120);

/// Per-attempt failure inside the transmit loop.
#[derive(Debug)]
enum TransmitError {
    /// No packer for the record's format or serialization failed.
    /// Terminal for the record; never retried.
    Encode(PackError),
    /// No confirmed server decision; locally retryable.
    Transport(TransportError),
}

pub struct Server {
    url: String,
    don_id: u32,
    verbose: bool,
    transmit_timeout: Duration,

    client: Arc<dyn TransmitClient>,
    store: Arc<dyn DeliveryStore>,
    queue: Arc<dyn TransmitQueue>,

    json_packer: Arc<dyn ReportPacker>,
    premium_legacy_packer: Arc<dyn ReportPacker>,

    delete_tx: mpsc::Sender<[u8; 32]>,
    counters: Arc<Counters>,
}

impl Server {
    /// Build a server for one destination. Returns the server and the
    /// receiving end of its delete channel, which the caller hands to
    /// [`run_delete_loop`](Self::run_delete_loop) (or [`spawn`](Self::spawn)).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cfg: &DeliveryConfig,
        url: impl Into<String>,
        client: Arc<dyn TransmitClient>,
        store: Arc<dyn DeliveryStore>,
        queue: Arc<dyn TransmitQueue>,
        json_packer: Arc<dyn ReportPacker>,
        premium_legacy_packer: Arc<dyn ReportPacker>,
    ) -> (Arc<Self>, mpsc::Receiver<[u8; 32]>) {
        // Delete channel capacity matches the queue bound: the channel can
        // absorb a deletion request for every record the queue can hold.
        let (delete_tx, delete_rx) = mpsc::channel(cfg.transmit_queue_max_size.max(1) as usize);
        let don_id = store.don_id();

        let server = Arc::new(Self {
            url: url.into(),
            don_id,
            verbose: cfg.verbose_logging,
            transmit_timeout: cfg.transmit_timeout,
            client,
            store,
            queue,
            json_packer,
            premium_legacy_packer,
            delete_tx,
            counters: Arc::new(Counters::new()),
        });
        (server, delete_rx)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn counters(&self) -> Arc<Counters> {
        self.counters.clone()
    }

    /// Union of the client's and the queue's health. Any error entry marks
    /// this server unhealthy; storage health surfaces through the delete
    /// loop's error counter rather than a component entry.
    pub fn health_report(&self) -> HealthReport {
        let mut report = HealthReport::new();
        copy_health(&mut report, self.client.health_report());
        copy_health(&mut report, self.queue.health_report());
        report
    }

    /// Start both worker loops on the runtime, wired to a shared shutdown
    /// channel. Returns their join handles.
    pub fn spawn(
        self: &Arc<Self>,
        delete_rx: mpsc::Receiver<[u8; 32]>,
        shutdown: &broadcast::Sender<()>,
    ) -> (
        JoinHandle<anyhow::Result<()>>,
        JoinHandle<anyhow::Result<()>>,
    ) {
        let transmit = tokio::spawn(self.clone().run_transmit_loop(shutdown.subscribe()));
        let delete = tokio::spawn(self.clone().run_delete_loop(delete_rx, shutdown.subscribe()));
        (transmit, delete)
    }

    // ── Transmit loop ─────────────────────────────────────────────────────

    pub async fn run_transmit_loop(
        self: Arc<Self>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> anyhow::Result<()> {
        let mut boff = Backoff::new(TRANSMIT_BACKOFF_MIN, TRANSMIT_BACKOFF_MAX);

        loop {
            let t = tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!(url = %self.url, "transmit loop shutting down");
                    return Ok(());
                }
                popped = self.queue.blocking_pop() => match popped {
                    Some(t) => t,
                    None => {
                        tracing::info!(url = %self.url, "transmit queue closed, transmit loop exiting");
                        return Ok(());
                    }
                },
            };

            self.counters.transmit_busy_add(1);
            let attempt = tokio::select! {
                _ = shutdown.recv() => {
                    // Abandon the in-flight attempt; the record is still
                    // durably queued.
                    self.counters.transmit_busy_add(-1);
                    tracing::info!(url = %self.url, "transmit loop shutting down mid-attempt");
                    return Ok(());
                }
                res = tokio::time::timeout(with_jitter(self.transmit_timeout), self.transmit(&t)) => {
                    match res {
                        Ok(inner) => inner,
                        Err(_elapsed) => Err(TransmitError::Transport(TransportError::Timeout)),
                    }
                }
            };
            self.counters.transmit_busy_add(-1);

            match attempt {
                Ok((req, res)) => {
                    boff.reset();
                    self.handle_reply(&t, &req, &res);
                    self.request_delete(&t);
                }
                Err(TransmitError::Encode(e)) => {
                    // The record can never be packed; retrying cannot help.
                    self.counters.inc_encode_error();
                    tracing::error!(
                        url = %self.url,
                        don_id = self.don_id,
                        transmission = %short_hash(&t.hash()),
                        seq_nr = t.seq_nr,
                        error = %e,
                        "failed to encode report, releasing record"
                    );
                    self.request_delete(&t);
                }
                Err(TransmitError::Transport(e)) => {
                    self.counters.inc_connection_error();
                    tracing::error!(
                        url = %self.url,
                        don_id = self.don_id,
                        transmission = %short_hash(&t.hash()),
                        seq_nr = t.seq_nr,
                        report_format = t.report_format.wire_value(),
                        error = %e,
                        "transmit report failed"
                    );
                    if !self.queue.push(t) {
                        self.counters.inc_queue_push_error();
                        tracing::error!(
                            url = %self.url,
                            "failed to push report back onto transmit queue; queue is closed"
                        );
                        return Ok(());
                    }
                    tokio::select! {
                        _ = tokio::time::sleep(boff.next()) => {}
                        _ = shutdown.recv() => {
                            tracing::info!(url = %self.url, "transmit loop shutting down");
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    /// Pack the record with the format's packer and send it. Any error
    /// here is either terminal (encode) or retryable (transport).
    async fn transmit(
        &self,
        t: &Transmission,
    ) -> Result<(TransmitRequest, TransmitResponse), TransmitError> {
        let packer = match t.report_format {
            ReportFormat::Json => &self.json_packer,
            ReportFormat::EvmPremiumLegacy => &self.premium_legacy_packer,
            ReportFormat::Unknown(v) => {
                return Err(TransmitError::Encode(PackError::UnsupportedFormat(v)))
            }
        };
        let payload = packer
            .pack(&t.config_digest, t.seq_nr, &t.report, &t.sigs)
            .map_err(TransmitError::Encode)?;

        let req = TransmitRequest {
            payload,
            report_format: t.report_format.wire_value(),
        };
        let res = self
            .client
            .transmit(&req)
            .await
            .map_err(TransmitError::Transport)?;
        Ok((req, res))
    }

    fn handle_reply(&self, t: &Transmission, req: &TransmitRequest, res: &TransmitResponse) {
        match TransmitStatus::classify(res) {
            TransmitStatus::Success => {
                self.counters.inc_success();
                if self.verbose {
                    tracing::debug!(
                        url = %self.url,
                        transmission = %short_hash(&t.hash()),
                        seq_nr = t.seq_nr,
                        payload = %hex::encode(&req.payload),
                        "transmit report success"
                    );
                } else {
                    tracing::debug!(
                        url = %self.url,
                        transmission = %short_hash(&t.hash()),
                        seq_nr = t.seq_nr,
                        "transmit report success"
                    );
                }
            }
            TransmitStatus::Duplicate => {
                self.counters.inc_success();
                self.counters.inc_duplicate();
                tracing::debug!(
                    url = %self.url,
                    transmission = %short_hash(&t.hash()),
                    seq_nr = t.seq_nr,
                    "transmit report success; duplicate report"
                );
            }
            TransmitStatus::ServerError { code } => {
                // The destination durably recorded its decision; local
                // retry cannot change it.
                self.counters.inc_server_error(code);
                tracing::error!(
                    url = %self.url,
                    don_id = self.don_id,
                    transmission = %short_hash(&t.hash()),
                    seq_nr = t.seq_nr,
                    code,
                    error = %res.error,
                    "transmit report failed; server returned error"
                );
            }
        }
    }

    /// Hand the record's hash to the delete loop without blocking. A full
    /// channel drops the request: the record stays in the backing store as
    /// cleanliness debt rather than stalling the transmit path.
    fn request_delete(&self, t: &Transmission) {
        let hash = t.hash();
        match self.delete_tx.try_send(hash) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::error!(
                    url = %self.url,
                    transmission = %hex::encode(hash),
                    "delete queue is full; dropping deletion request, record remains in storage"
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(
                    url = %self.url,
                    transmission = %short_hash(&hash),
                    "delete loop gone, dropping deletion request"
                );
            }
        }
    }

    // ── Delete loop ───────────────────────────────────────────────────────

    pub async fn run_delete_loop(
        self: Arc<Self>,
        mut delete_rx: mpsc::Receiver<[u8; 32]>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> anyhow::Result<()> {
        let mut boff = Backoff::new(DELETE_BACKOFF_MIN, DELETE_BACKOFF_MAX);

        loop {
            let hash = tokio::select! {
                _ = shutdown.recv() => {
                    // Remaining queued deletions are abandoned; delivered-
                    // but-undeleted records are safe.
                    tracing::info!(url = %self.url, "delete loop shutting down");
                    return Ok(());
                }
                received = delete_rx.recv() => match received {
                    Some(hash) => hash,
                    None => {
                        tracing::info!(url = %self.url, "delete channel closed, delete loop exiting");
                        return Ok(());
                    }
                },
            };

            self.counters.delete_busy_add(1);
            loop {
                match self.store.delete(&[hash]).await {
                    Ok(()) => {
                        boff.reset();
                        break;
                    }
                    Err(e) => {
                        self.counters.inc_queue_delete_error();
                        tracing::error!(
                            url = %self.url,
                            don_id = self.don_id,
                            transmission = %short_hash(&hash),
                            error = %e,
                            "failed to delete transmission record"
                        );
                        tokio::select! {
                            _ = tokio::time::sleep(boff.next()) => {}
                            _ = shutdown.recv() => {
                                self.counters.delete_busy_add(-1);
                                tracing::info!(url = %self.url, "delete loop shutting down");
                                return Ok(());
                            }
                        }
                    }
                }
            }
            self.counters.delete_busy_add(-1);
        }
    }
}

fn short_hash(hash: &[u8; 32]) -> String {
    hex::encode(&hash[..8])
}
