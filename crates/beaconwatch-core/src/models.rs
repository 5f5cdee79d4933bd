//! Core data models used throughout Beaconwatch.
//!
//! These types represent the fingerprint samples, detection events, and
//! presence records that flow through the localization and aggregation
//! pipeline, plus the reference entities (employees, locations,
//! gateways) the core reads to decorate its output.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Location name reported for an employee that has never been detected.
pub const UNKNOWN_LOCATION: &str = "Unknown";

/// Ordered per-gateway signal strengths (dBm, more negative = weaker).
///
/// Used both as a stored fingerprint's feature vector and as a live
/// query vector. Dimensionality always matches the number of configured
/// gateways; [`RssiVector::ensure_dims`] enforces that contract at the
/// store boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RssiVector(pub Vec<i32>);

impl RssiVector {
    pub fn new(readings: Vec<i32>) -> Self {
        RssiVector(readings)
    }

    pub fn dims(&self) -> usize {
        self.0.len()
    }

    /// Euclidean distance to another vector of the same dimensionality.
    pub fn distance(&self, other: &RssiVector) -> f64 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| {
                let d = (a - b) as f64;
                d * d
            })
            .sum::<f64>()
            .sqrt()
    }

    pub fn ensure_dims(&self, expected: usize) -> Result<(), EngineError> {
        if self.dims() != expected {
            return Err(EngineError::validation(format!(
                "RSSI vector has {} readings, expected {} (one per gateway)",
                self.dims(),
                expected
            )));
        }
        Ok(())
    }
}

/// A labeled training sample: RSSI readings captured while standing at
/// a named spot inside a named location. Immutable once written; many
/// samples may share a `location_name`, and duplicates at the same spot
/// accumulate to improve future predictions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingerprintSample {
    pub id: String,
    pub spot_name: String,
    pub location_name: String,
    pub rssi: RssiVector,
    /// Unix timestamp; breaks distance ties (earlier-trained wins).
    pub created_at: i64,
}

/// Validate training input before it reaches a store.
///
/// Fails on empty names or an RSSI vector whose dimensionality does not
/// match the configured gateway count. Both store implementations call
/// this from `add_sample`.
pub fn validate_sample(
    spot_name: &str,
    location_name: &str,
    rssi: &RssiVector,
    dims: usize,
) -> Result<(), EngineError> {
    if spot_name.trim().is_empty() {
        return Err(EngineError::validation("spot_name must not be empty"));
    }
    if location_name.trim().is_empty() {
        return Err(EngineError::validation("location_name must not be empty"));
    }
    rssi.ensure_dims(dims)
}

/// One observation of a beacon by a gateway, after resolution. The unit
/// of the append-only detection log: every accepted observation is
/// retained, including late ones that never touch the live snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionEvent {
    pub employee_id: String,
    pub gateway_id: i64,
    pub rssi: i32,
    /// Location the resolution policy assigned to this observation.
    pub location: String,
    /// Unix timestamp at which the gateway observed the beacon.
    pub observed_at: i64,
}

/// Current best-known position for one employee. At most one record per
/// employee exists; it always reflects the most recent observation and
/// is never regressed by out-of-order events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceRecord {
    pub employee_id: String,
    pub location: String,
    /// `None` until the first detection arrives.
    pub detected_at: Option<i64>,
}

impl PresenceRecord {
    /// Initial state for an employee that has never been detected.
    pub fn unknown(employee_id: impl Into<String>) -> Self {
        PresenceRecord {
            employee_id: employee_id.into(),
            location: UNKNOWN_LOCATION.to_string(),
            detected_at: None,
        }
    }
}

/// Reference entity owned by the management layer; the core only reads
/// it to map beacon MACs to people and to decorate presence output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    pub id: String,
    pub name: String,
    /// Human-facing badge number, distinct from the row id.
    pub badge_id: String,
    /// MAC address of the employee's BLE beacon.
    pub mac_address: String,
    pub department: String,
}

/// Reference entity: a named area of the building.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub name: String,
    pub description: String,
}

/// A fixed BLE gateway, supplied by configuration. Each gateway sits in
/// a known location; that mapping is the direct resolution policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gateway {
    pub id: i64,
    pub name: String,
    pub location: String,
}
