//! Per-server delivery counters.
//!
//! Owned by each [`Server`](crate::Server) instance and shared by its two
//! loops — no global registries. Counters are advisory observability and
//! never gate correctness; the busy gauges track in-flight work per loop.
//! The insert-error counter belongs to the external persistence
//! collaborator, which records failed queue inserts here so one instance
//! carries the whole per-destination picture.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use dashmap::DashMap;

#[derive(Debug, Default)]
pub struct Counters {
    transmit_success: AtomicU64,
    transmit_duplicate: AtomicU64,
    transmit_connection_error: AtomicU64,
    transmit_encode_error: AtomicU64,
    queue_push_error: AtomicU64,
    queue_insert_error: AtomicU64,
    queue_delete_error: AtomicU64,
    server_error_by_code: DashMap<i32, u64>,
    transmit_busy: AtomicI64,
    delete_busy: AtomicI64,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_success(&self) {
        self.transmit_success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_duplicate(&self) {
        self.transmit_duplicate.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_connection_error(&self) {
        self.transmit_connection_error.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_encode_error(&self) {
        self.transmit_encode_error.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_queue_push_error(&self) {
        self.queue_push_error.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_queue_insert_error(&self) {
        self.queue_insert_error.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_queue_delete_error(&self) {
        self.queue_delete_error.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_server_error(&self, code: i32) {
        *self.server_error_by_code.entry(code).or_insert(0) += 1;
    }

    pub fn success(&self) -> u64 {
        self.transmit_success.load(Ordering::Relaxed)
    }

    pub fn duplicate(&self) -> u64 {
        self.transmit_duplicate.load(Ordering::Relaxed)
    }

    pub fn connection_error(&self) -> u64 {
        self.transmit_connection_error.load(Ordering::Relaxed)
    }

    pub fn encode_error(&self) -> u64 {
        self.transmit_encode_error.load(Ordering::Relaxed)
    }

    pub fn queue_push_error(&self) -> u64 {
        self.queue_push_error.load(Ordering::Relaxed)
    }

    pub fn queue_insert_error(&self) -> u64 {
        self.queue_insert_error.load(Ordering::Relaxed)
    }

    pub fn queue_delete_error(&self) -> u64 {
        self.queue_delete_error.load(Ordering::Relaxed)
    }

    pub fn server_error(&self, code: i32) -> u64 {
        self.server_error_by_code
            .get(&code)
            .map(|v| *v)
            .unwrap_or(0)
    }

    /// Snapshot of the per-code server error tally, sorted by code.
    pub fn server_errors(&self) -> Vec<(i32, u64)> {
        let mut all: Vec<(i32, u64)> = self
            .server_error_by_code
            .iter()
            .map(|e| (*e.key(), *e.value()))
            .collect();
        all.sort_by_key(|(code, _)| *code);
        all
    }

    // ── Busy gauges ───────────────────────────────────────────────────────

    pub(crate) fn transmit_busy_add(&self, delta: i64) {
        self.transmit_busy.fetch_add(delta, Ordering::Relaxed);
    }

    pub(crate) fn delete_busy_add(&self, delta: i64) {
        self.delete_busy.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn transmit_busy(&self) -> i64 {
        self.transmit_busy.load(Ordering::Relaxed)
    }

    pub fn delete_busy(&self) -> i64 {
        self.delete_busy.load(Ordering::Relaxed)
    }
}
