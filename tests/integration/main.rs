//! Cairn integration test harness.
//!
//! Tests here exercise whole subsystems end to end: the deterministic
//! scheduler driven from raw request values, and complete delivery
//! servers running both worker loops against in-process mock
//! collaborators.
//!
//! Delivery tests run under a paused tokio clock so backoff and timeout
//! waits complete instantly. Each test builds its own server; nothing is
//! shared between tests.

mod delivery;
mod scheduling;
