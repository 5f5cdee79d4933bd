//! Detection ingest pipeline.
//!
//! Takes a raw gateway report `(mac_address, gateway_id, rssi)`,
//! resolves the MAC to an employee and the reading to a location, and
//! hands the event to the store, which appends it to the log and
//! applies the monotonic presence update in one transaction. Once a
//! report is accepted here it runs to completion; rejected reports
//! (unknown beacon or gateway) are logged and leave state untouched.

use std::sync::Mutex;

use anyhow::Result;
use chrono::Utc;

use beaconwatch_core::error::EngineError;
use beaconwatch_core::models::{DetectionEvent, Employee};
use beaconwatch_core::resolve::{Reading, Resolution, Resolver};
use beaconwatch_core::store::{FingerprintStore, PresenceStore};

/// A raw report from a gateway, as received at the boundary.
#[derive(Debug, Clone)]
pub struct GatewayReport {
    pub mac_address: String,
    pub gateway_id: i64,
    pub rssi: i32,
    /// Unix timestamp; the ingest time is used when absent.
    pub observed_at: Option<i64>,
}

/// Outcome of one accepted report.
#[derive(Debug)]
pub struct IngestOutcome {
    pub employee: Employee,
    pub resolution: Resolution,
    pub event: DetectionEvent,
    /// Whether the live snapshot changed (false for late events).
    pub snapshot_updated: bool,
}

/// Process one gateway report end to end.
///
/// The resolver mutex is the serialization point for the correlation
/// buffer; it is never held across an await.
pub async fn ingest_detection<S>(
    store: &S,
    resolver: &Mutex<Resolver>,
    report: GatewayReport,
) -> Result<IngestOutcome>
where
    S: FingerprintStore + PresenceStore,
{
    let Some(employee) = store.employee_by_mac(&report.mac_address).await? else {
        tracing::warn!(
            mac = %report.mac_address,
            gateway = report.gateway_id,
            "detection rejected: unregistered beacon"
        );
        return Err(EngineError::unknown("beacon", report.mac_address.clone()).into());
    };

    let observed_at = report.observed_at.unwrap_or_else(|| Utc::now().timestamp());
    let samples = store.list_samples().await?;

    let resolution = {
        let mut resolver = resolver.lock().unwrap();
        let reading = Reading {
            gateway_id: report.gateway_id,
            rssi: report.rssi,
            observed_at,
        };
        match resolver.resolve(&employee.id, reading, &samples) {
            Ok(resolution) => resolution,
            Err(err) => {
                tracing::warn!(
                    employee = %employee.name,
                    gateway = report.gateway_id,
                    error = %err,
                    "detection rejected"
                );
                return Err(err.into());
            }
        }
    };

    let event = DetectionEvent {
        employee_id: employee.id.clone(),
        gateway_id: report.gateway_id,
        rssi: report.rssi,
        location: resolution.location.clone(),
        observed_at,
    };

    let snapshot_updated = store.record_detection(&event).await?;

    tracing::info!(
        employee = %employee.name,
        gateway = report.gateway_id,
        rssi = report.rssi,
        location = %resolution.location,
        policy = ?resolution.policy,
        snapshot_updated,
        "detection ingested"
    );

    Ok(IngestOutcome {
        employee,
        resolution,
        event,
        snapshot_updated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use beaconwatch_core::models::Gateway;
    use beaconwatch_core::resolve::Policy;
    use beaconwatch_core::store::memory::InMemoryStore;
    use std::sync::Arc;

    fn resolver() -> Mutex<Resolver> {
        Mutex::new(Resolver::new(
            vec![
                Gateway {
                    id: 1,
                    name: "Workshop Gateway".to_string(),
                    location: "Workshop First Floor".to_string(),
                },
                Gateway {
                    id: 2,
                    name: "Meeting Room Gateway".to_string(),
                    location: "Meeting Room Second Floor".to_string(),
                },
            ],
            3,
            3,
        ))
    }

    fn report(mac: &str, gateway_id: i64, rssi: i32, observed_at: i64) -> GatewayReport {
        GatewayReport {
            mac_address: mac.to_string(),
            gateway_id,
            rssi,
            observed_at: Some(observed_at),
        }
    }

    #[tokio::test]
    async fn test_unknown_beacon_rejected() {
        let store = InMemoryStore::new(2);
        let resolver = resolver();
        let err = ingest_detection(&store, &resolver, report("de:ad:be:ef:00:00", 1, -70, 1000))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::UnknownEntity { .. })
        ));
        assert!(store.events().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_gateway_rejected_before_logging() {
        let store = InMemoryStore::new(2);
        store
            .add_employee("Ada", "E-1", "aa:bb:cc:dd:ee:01", "R&D")
            .await
            .unwrap();
        let resolver = resolver();
        let err = ingest_detection(&store, &resolver, report("aa:bb:cc:dd:ee:01", 9, -70, 1000))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::UnknownEntity { .. })
        ));
        assert!(store.events().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_single_report_updates_snapshot_via_direct_mapping() {
        let store = InMemoryStore::new(2);
        store
            .add_employee("Ada", "E-1", "aa:bb:cc:dd:ee:01", "R&D")
            .await
            .unwrap();
        let resolver = resolver();
        let outcome =
            ingest_detection(&store, &resolver, report("aa:bb:cc:dd:ee:01", 1, -70, 1000))
                .await
                .unwrap();
        assert_eq!(outcome.resolution.policy, Policy::DirectGateway);
        assert!(outcome.snapshot_updated);

        let presence = store.current_presence().await.unwrap();
        assert_eq!(presence[0].location, "Workshop First Floor");
        assert_eq!(presence[0].detected_at, Some(1000));
    }

    #[tokio::test]
    async fn test_correlated_reports_resolve_through_fingerprints() {
        let store = InMemoryStore::new(2);
        store
            .add_employee("Ada", "E-1", "aa:bb:cc:dd:ee:01", "R&D")
            .await
            .unwrap();
        store
            .add_sample(
                "Near Window",
                "Workshop First Floor",
                beaconwatch_core::models::RssiVector::new(vec![-70, -95]),
            )
            .await
            .unwrap();
        store
            .add_sample(
                "By Door",
                "Meeting Room Second Floor",
                beaconwatch_core::models::RssiVector::new(vec![-92, -68]),
            )
            .await
            .unwrap();

        let resolver = resolver();
        ingest_detection(&store, &resolver, report("aa:bb:cc:dd:ee:01", 1, -72, 1000))
            .await
            .unwrap();
        let outcome =
            ingest_detection(&store, &resolver, report("aa:bb:cc:dd:ee:01", 2, -94, 1001))
                .await
                .unwrap();
        assert_eq!(outcome.resolution.policy, Policy::Fingerprint);
        assert_eq!(outcome.resolution.location, "Workshop First Floor");
    }

    /// Collects formatted log output for assertions.
    #[derive(Clone, Default)]
    struct LogSink(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogSink {
        type Writer = LogSink;

        fn make_writer(&'a self) -> LogSink {
            self.clone()
        }
    }

    #[tokio::test]
    async fn test_rejected_report_emits_warning() {
        let sink = LogSink::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(sink.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let store = InMemoryStore::new(2);
        let resolver = resolver();
        ingest_detection(&store, &resolver, report("de:ad:be:ef:00:00", 1, -70, 1000))
            .await
            .unwrap_err();

        let output = String::from_utf8(sink.0.lock().unwrap().clone()).unwrap();
        assert!(
            output.contains("detection rejected"),
            "expected a warning for the rejected report, got: {}",
            output
        );
        assert!(output.contains("de:ad:be:ef:00:00"));
    }

    #[tokio::test]
    async fn test_unknown_gateway_rejection_emits_warning() {
        let sink = LogSink::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(sink.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let store = InMemoryStore::new(2);
        store
            .add_employee("Ada", "E-1", "aa:bb:cc:dd:ee:01", "R&D")
            .await
            .unwrap();
        let resolver = resolver();
        ingest_detection(&store, &resolver, report("aa:bb:cc:dd:ee:01", 9, -70, 1000))
            .await
            .unwrap_err();

        let output = String::from_utf8(sink.0.lock().unwrap().clone()).unwrap();
        assert!(
            output.contains("detection rejected") && output.contains("unknown gateway"),
            "expected a warning naming the unknown gateway, got: {}",
            output
        );
    }

    #[tokio::test]
    async fn test_late_report_logged_without_snapshot_update() {
        let store = InMemoryStore::new(2);
        store
            .add_employee("Ada", "E-1", "aa:bb:cc:dd:ee:01", "R&D")
            .await
            .unwrap();
        let resolver = resolver();
        ingest_detection(&store, &resolver, report("aa:bb:cc:dd:ee:01", 1, -70, 2000))
            .await
            .unwrap();
        let outcome =
            ingest_detection(&store, &resolver, report("aa:bb:cc:dd:ee:01", 2, -70, 1000))
                .await
                .unwrap();
        assert!(!outcome.snapshot_updated);
        assert_eq!(store.events().await.unwrap().len(), 2);

        let presence = store.current_presence().await.unwrap();
        assert_eq!(presence[0].location, "Workshop First Floor");
        assert_eq!(presence[0].detected_at, Some(2000));
    }
}
