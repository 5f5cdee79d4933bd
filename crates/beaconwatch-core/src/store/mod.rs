//! Storage abstraction for Beaconwatch.
//!
//! Two traits split the engine's state along its independent
//! lifecycles: [`FingerprintStore`] owns the training map (a fingerprint
//! reset never touches presence data), and [`PresenceStore`] owns the
//! reference entities, the append-only detection log, and the live
//! presence snapshot.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//! The concurrency contract both implementations honor:
//!
//! - `reset` is all-or-nothing: a concurrent reader sees the full
//!   pre-reset set or an empty set, never something in between.
//! - `record_detection` appends to the log and applies the
//!   "newer `observed_at` wins" check behind one serialization point,
//!   so two concurrent events for the same employee cannot race.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::models::{DetectionEvent, Employee, FingerprintSample, Location, RssiVector};

/// A presence row decorated with employee reference data, ready for the
/// current-presence view.
#[derive(Debug, Clone, Serialize)]
pub struct PresenceView {
    pub employee_id: String,
    pub employee: String,
    pub department: String,
    pub location: String,
    pub detected_at: Option<i64>,
}

/// A detection log row joined with employee and location reference
/// data, ordered `observed_at` descending by convention.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub employee_name: String,
    pub department: String,
    pub location: String,
    pub rssi: i32,
    pub observed_at: i64,
}

/// Filters for the history view; `None` matches everything.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub employee: Option<String>,
    pub department: Option<String>,
    pub location: Option<String>,
}

/// The fingerprint training map.
///
/// Samples are keyed by nothing stronger than insertion order;
/// duplicates at the same spot accumulate.
#[async_trait]
pub trait FingerprintStore: Send + Sync {
    /// Dimensionality every stored vector must have (the configured
    /// gateway count).
    fn dims(&self) -> usize;

    /// Validate and store one training sample. The sample is visible to
    /// concurrent predictions as soon as this returns.
    async fn add_sample(
        &self,
        spot_name: &str,
        location_name: &str,
        rssi: RssiVector,
    ) -> Result<FingerprintSample>;

    /// All samples in insertion order.
    async fn list_samples(&self) -> Result<Vec<FingerprintSample>>;

    /// Atomically clear the map; returns the number of removed samples.
    /// Idempotent, and never touches the detection log.
    async fn reset(&self) -> Result<u64>;
}

/// Reference data, the detection log, and the presence snapshot.
#[async_trait]
pub trait PresenceStore: Send + Sync {
    async fn add_employee(
        &self,
        name: &str,
        badge_id: &str,
        mac_address: &str,
        department: &str,
    ) -> Result<Employee>;

    async fn list_employees(&self) -> Result<Vec<Employee>>;

    /// Look up the employee wearing the beacon with this MAC address.
    async fn employee_by_mac(&self, mac_address: &str) -> Result<Option<Employee>>;

    async fn add_location(&self, name: &str, description: &str) -> Result<Location>;

    async fn list_locations(&self) -> Result<Vec<Location>>;

    /// Append the event to the immutable log and, when its
    /// `observed_at` is at least as recent as the employee's current
    /// `detected_at`, update the presence snapshot — atomically.
    /// Returns whether the snapshot changed. Rejects events for
    /// employees not in the reference data.
    async fn record_detection(&self, event: &DetectionEvent) -> Result<bool>;

    /// One row per known employee, never-detected ones included with
    /// `location = "Unknown"` and no timestamp.
    async fn current_presence(&self) -> Result<Vec<PresenceView>>;

    /// History view, newest first.
    async fn detection_log(&self, filter: &LogFilter) -> Result<Vec<LogEntry>>;

    /// The raw append-only log, oldest first — the source of truth for
    /// the analytics aggregations.
    async fn events(&self) -> Result<Vec<DetectionEvent>>;
}
