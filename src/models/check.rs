// src/models/check.rs

//! Per-page signals and per-cycle statistics.

use chrono::{DateTime, Utc};

/// Availability signal derived from one fetched page.
///
/// The fingerprint covers the purchase-relevant section text, so an
/// identical section always yields an identical fingerprint and any
/// character-level change to it yields a different one. This makes the
/// watcher a content-change detector rather than a pure
/// availability-change detector, which is intentional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signal {
    /// Whether the page currently indicates the product is purchasable.
    pub available: bool,

    /// Hex-encoded SHA-256 digest of the normalized section text.
    pub fingerprint: String,
}

/// Statistics for one pass over the watchlist.
#[derive(Debug, Clone)]
pub struct CycleStats {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Number of targets evaluated.
    pub checked: usize,
    /// Targets whose page classified as available.
    pub available: usize,
    /// Targets whose fingerprint differed from the stored record.
    pub changed: usize,
    /// Notifications dispatched.
    pub notified: usize,
    /// Targets skipped because the fetch failed.
    pub failed: usize,
}

impl CycleStats {
    /// Start a new stats record at the current time.
    pub fn begin() -> Self {
        let now = Utc::now();
        Self {
            start_time: now,
            end_time: now,
            checked: 0,
            available: 0,
            changed: 0,
            notified: 0,
            failed: 0,
        }
    }

    /// Close the stats record.
    pub fn finish(&mut self) {
        self.end_time = Utc::now();
    }
}
