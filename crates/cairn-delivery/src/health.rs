//! Component health reporting.
//!
//! A health report maps component names to `None` (healthy) or
//! `Some(error)`. Collaborators each produce their own report; a server
//! aggregates them by union, and a consumer treats any `Some` entry as
//! unhealthy.

use std::collections::BTreeMap;

pub type HealthReport = BTreeMap<String, Option<String>>;

/// Merge `src` into `dst`. Later sources win on name collisions.
pub fn copy_health(dst: &mut HealthReport, src: HealthReport) {
    dst.extend(src);
}

/// True when every component in the report is healthy.
pub fn healthy(report: &HealthReport) -> bool {
    report.values().all(Option::is_none)
}
