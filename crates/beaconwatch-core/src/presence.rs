//! Presence derivation rules and log aggregations.
//!
//! The aggregator's two decisions live here as pure functions so they
//! can be tested without a store: whether a detection event may update
//! the live snapshot ([`should_update`]), and whether a record counts
//! as online at a given instant ([`is_online`]). Staleness is computed
//! lazily at query time — there is no background sweep or TTL machinery.
//!
//! The analytics counts are recomputed on demand from the detection
//! log; they are derived views and are never cached.

use std::collections::HashMap;

use serde::Serialize;

use crate::models::DetectionEvent;

/// Default freshness window: an employee is online when last seen less
/// than five minutes ago. Overridable through application config.
pub const DEFAULT_FRESHNESS_WINDOW_SECS: i64 = 300;

/// Monotonic-update predicate for the presence snapshot.
///
/// A new observation wins when it is at least as recent as the current
/// one (equality is idempotent re-application). Out-of-order events
/// return `false` and must not touch the record — they still belong in
/// the detection log.
pub fn should_update(current_detected_at: Option<i64>, observed_at: i64) -> bool {
    match current_detected_at {
        None => true,
        Some(current) => observed_at >= current,
    }
}

/// Freshness rule: online iff seen strictly less than `window_secs` ago.
///
/// Exactly at the window boundary is offline, matching the reference
/// view's `diff < 5 minutes` check. A record with no detection yet is
/// always offline.
pub fn is_online(now: i64, detected_at: Option<i64>, window_secs: i64) -> bool {
    match detected_at {
        None => false,
        Some(at) => now - at < window_secs,
    }
}

/// One bucket of the on-demand log aggregations.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CountBucket {
    pub name: String,
    pub count: u64,
}

/// Detections per resolved location, descending by count then name.
pub fn location_counts(log: &[DetectionEvent]) -> Vec<CountBucket> {
    count_by(log, |e| e.location.clone())
}

/// Detections per employee id, descending by count then name. The
/// caller joins employee names in from reference data.
pub fn employee_counts(log: &[DetectionEvent]) -> Vec<CountBucket> {
    count_by(log, |e| e.employee_id.clone())
}

fn count_by(log: &[DetectionEvent], key: impl Fn(&DetectionEvent) -> String) -> Vec<CountBucket> {
    let mut counts: HashMap<String, u64> = HashMap::new();
    for event in log {
        *counts.entry(key(event)).or_insert(0) += 1;
    }
    let mut buckets: Vec<CountBucket> = counts
        .into_iter()
        .map(|(name, count)| CountBucket { name, count })
        .collect();
    buckets.sort_by(|a, b| b.count.cmp(&a.count).then(a.name.cmp(&b.name)));
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(employee: &str, location: &str, observed_at: i64) -> DetectionEvent {
        DetectionEvent {
            employee_id: employee.to_string(),
            gateway_id: 1,
            rssi: -70,
            location: location.to_string(),
            observed_at,
        }
    }

    #[test]
    fn test_first_event_always_updates() {
        assert!(should_update(None, 0));
        assert!(should_update(None, 1_700_000_000));
    }

    #[test]
    fn test_newer_event_updates() {
        assert!(should_update(Some(100), 101));
    }

    #[test]
    fn test_equal_timestamp_is_idempotent() {
        assert!(should_update(Some(100), 100));
    }

    #[test]
    fn test_late_event_never_regresses() {
        assert!(!should_update(Some(100), 99));
    }

    #[test]
    fn test_online_just_inside_window() {
        let now = 1_700_000_000;
        assert!(is_online(now, Some(now - 299), 300));
    }

    #[test]
    fn test_offline_exactly_at_window() {
        // The boundary is exclusive: exactly five minutes ago is offline.
        let now = 1_700_000_000;
        assert!(!is_online(now, Some(now - 300), 300));
    }

    #[test]
    fn test_offline_just_outside_window() {
        let now = 1_700_000_000;
        assert!(!is_online(now, Some(now - 301), 300));
    }

    #[test]
    fn test_never_detected_is_offline() {
        assert!(!is_online(1_700_000_000, None, 300));
    }

    #[test]
    fn test_location_counts() {
        let log = vec![
            event("e1", "Workshop", 1),
            event("e2", "Workshop", 2),
            event("e1", "Meeting Room", 3),
        ];
        let counts = location_counts(&log);
        assert_eq!(
            counts,
            vec![
                CountBucket {
                    name: "Workshop".to_string(),
                    count: 2
                },
                CountBucket {
                    name: "Meeting Room".to_string(),
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn test_employee_counts_tie_sorted_by_name() {
        let log = vec![event("zed", "Workshop", 1), event("amy", "Workshop", 2)];
        let counts = employee_counts(&log);
        assert_eq!(counts[0].name, "amy");
        assert_eq!(counts[1].name, "zed");
    }

    #[test]
    fn test_counts_empty_log() {
        assert!(location_counts(&[]).is_empty());
        assert!(employee_counts(&[]).is_empty());
    }
}
