//! Destination reply classification.
//!
//! A reply lands in exactly one of three cases. Success and Duplicate both
//! count as delivered; a ServerError means the destination durably
//! recorded its decision, so local retry cannot help and the record is
//! still released for deletion.

use crate::client::TransmitResponse;

/// Reply code meaning the destination already holds this report.
pub const DUPLICATE_REPORT: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmitStatus {
    /// Report accepted.
    Success,
    /// Report already received; counted as success, tallied separately.
    Duplicate,
    /// Destination explicitly rejected; metered by code, not retried.
    ServerError { code: i32 },
}

impl TransmitStatus {
    pub fn classify(res: &TransmitResponse) -> Self {
        if res.error.is_empty() {
            TransmitStatus::Success
        } else if res.code == DUPLICATE_REPORT {
            TransmitStatus::Duplicate
        } else {
            TransmitStatus::ServerError { code: res.code }
        }
    }

    /// True when the destination holds the report (first copy or not).
    pub fn delivered(&self) -> bool {
        matches!(self, TransmitStatus::Success | TransmitStatus::Duplicate)
    }
}
