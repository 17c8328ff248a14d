//! Counters and timing for scans and the live observer.
//!
//! Everything here is lock-free so the key-down path can record without
//! blocking, and clones share the same counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Tracks timing information for a single scan.
#[derive(Debug)]
pub struct ScanMetrics {
    /// Unique identifier for the scan.
    pub scan_id: String,
    start_time: Instant,
}

impl ScanMetrics {
    /// Creates a new tracker with a freshly generated scan ID.
    pub fn new() -> Self {
        Self {
            scan_id: Uuid::new_v4().to_string(),
            start_time: Instant::now(),
        }
    }

    /// Returns elapsed time since construction in milliseconds.
    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }
}

impl Default for ScanMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Aggregated scan counts for one catalog builder.
#[derive(Clone, Debug, Default)]
pub struct CatalogMetrics {
    completed_scans: Arc<AtomicU64>,
    rejected_scans: Arc<AtomicU64>,
    total_scan_time_ms: Arc<AtomicU64>,
}

impl CatalogMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a finished scan and its duration.
    pub fn record_completed(&self, duration_ms: u64) {
        self.completed_scans.fetch_add(1, Ordering::Relaxed);
        self.total_scan_time_ms
            .fetch_add(duration_ms, Ordering::Relaxed);
    }

    /// Records a scan request dropped because another scan was running.
    pub fn record_rejected(&self) {
        self.rejected_scans.fetch_add(1, Ordering::Relaxed);
    }

    pub fn completed_scans(&self) -> u64 {
        self.completed_scans.load(Ordering::Relaxed)
    }

    pub fn rejected_scans(&self) -> u64 {
        self.rejected_scans.load(Ordering::Relaxed)
    }

    /// Returns the average scan duration (ms) over completed scans.
    pub fn avg_scan_time_ms(&self) -> f32 {
        let total = self.completed_scans();
        if total == 0 {
            return 0.0;
        }
        let total_time = self.total_scan_time_ms.load(Ordering::Relaxed);
        total_time as f32 / total as f32
    }
}

/// Key-down counts for the live observer.
#[derive(Clone, Debug, Default)]
pub struct ObserverMetrics {
    key_downs: Arc<AtomicU64>,
    undelivered: Arc<AtomicU64>,
}

impl ObserverMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called from the tap callback for every key-down.
    pub fn record_key_down(&self) {
        self.key_downs.fetch_add(1, Ordering::Relaxed);
    }

    /// Called when an observation could not be handed to the publisher.
    pub fn record_undelivered(&self) {
        self.undelivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn key_downs(&self) -> u64 {
        self.key_downs.load(Ordering::Relaxed)
    }

    pub fn undelivered(&self) -> u64 {
        self.undelivered.load(Ordering::Relaxed)
    }
}
