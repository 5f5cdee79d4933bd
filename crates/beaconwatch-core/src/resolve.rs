//! Detection resolution: from raw gateway readings to a location.
//!
//! Two policies coexist, per deployment reality:
//!
//! - **Direct gateway mapping** — the observing gateway's configured
//!   location is the answer. Used when only one gateway has reported
//!   recently for an employee.
//! - **Fingerprint k-NN** — when every configured gateway has a reading
//!   for the employee inside the correlation window, the combined RSSI
//!   vector goes through the trained fingerprint map.
//!
//! The resolver keeps only the most recent reading per (employee,
//! gateway); it is plain mutable state, and the application serializes
//! access to it (one mutex, or one task). The aggregator downstream is
//! agnostic to which policy produced the location.

use std::collections::HashMap;

use crate::error::EngineError;
use crate::models::{FingerprintSample, Gateway, RssiVector};
use crate::predict;

/// A raw per-gateway observation before resolution.
#[derive(Debug, Clone, Copy)]
pub struct Reading {
    pub gateway_id: i64,
    pub rssi: i32,
    pub observed_at: i64,
}

/// Which policy produced a resolved location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    DirectGateway,
    Fingerprint,
}

/// A resolved location plus the policy that produced it.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub location: String,
    pub policy: Policy,
}

/// Correlation-window resolver over the configured gateway set.
pub struct Resolver {
    gateways: Vec<Gateway>,
    window_secs: i64,
    k: usize,
    /// Most recent reading per employee per gateway.
    recent: HashMap<String, HashMap<i64, Reading>>,
}

impl Resolver {
    pub fn new(gateways: Vec<Gateway>, window_secs: i64, k: usize) -> Self {
        Resolver {
            gateways,
            window_secs,
            k,
            recent: HashMap::new(),
        }
    }

    pub fn gateway(&self, id: i64) -> Option<&Gateway> {
        self.gateways.iter().find(|g| g.id == id)
    }

    /// Resolve one reading to a location.
    ///
    /// Records the reading, then checks whether every configured
    /// gateway has a reading for this employee within the correlation
    /// window of `reading.observed_at`. If so, the combined vector (in
    /// gateway configuration order) is classified against `samples`;
    /// an empty fingerprint map falls back to direct mapping rather
    /// than failing ingest. Unknown gateway ids are rejected.
    pub fn resolve(
        &mut self,
        employee_id: &str,
        reading: Reading,
        samples: &[FingerprintSample],
    ) -> Result<Resolution, EngineError> {
        let direct_location = self
            .gateway(reading.gateway_id)
            .map(|g| g.location.clone())
            .ok_or_else(|| EngineError::unknown("gateway", reading.gateway_id.to_string()))?;

        let per_gateway = self.recent.entry(employee_id.to_string()).or_default();
        per_gateway.insert(reading.gateway_id, reading);

        let mut readings = Vec::with_capacity(self.gateways.len());
        for gw in &self.gateways {
            match per_gateway.get(&gw.id) {
                Some(r) if (reading.observed_at - r.observed_at).abs() <= self.window_secs => {
                    readings.push(r.rssi)
                }
                _ => break,
            }
        }

        if readings.len() == self.gateways.len() {
            let query = RssiVector::new(readings);
            match predict::predict(samples, &query, self.k) {
                Ok(p) => {
                    return Ok(Resolution {
                        location: p.predicted_location,
                        policy: Policy::Fingerprint,
                    })
                }
                Err(EngineError::InsufficientData) => {}
                Err(e) => return Err(e),
            }
        }

        Ok(Resolution {
            location: direct_location,
            policy: Policy::DirectGateway,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateways() -> Vec<Gateway> {
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
        ]
    }

    fn sample(spot: &str, location: &str, rssi: Vec<i32>, created_at: i64) -> FingerprintSample {
        FingerprintSample {
            id: format!("fp-{}", spot),
            spot_name: spot.to_string(),
            location_name: location.to_string(),
            rssi: RssiVector::new(rssi),
            created_at,
        }
    }

    #[test]
    fn test_unknown_gateway_rejected() {
        let mut resolver = Resolver::new(gateways(), 3, 3);
        let err = resolver.resolve(
            "e1",
            Reading {
                gateway_id: 99,
                rssi: -70,
                observed_at: 1000,
            },
            &[],
        );
        assert!(matches!(err, Err(EngineError::UnknownEntity { .. })));
    }

    #[test]
    fn test_single_gateway_maps_directly() {
        let mut resolver = Resolver::new(gateways(), 3, 3);
        let r = resolver
            .resolve(
                "e1",
                Reading {
                    gateway_id: 2,
                    rssi: -68,
                    observed_at: 1000,
                },
                &[],
            )
            .unwrap();
        assert_eq!(r.policy, Policy::DirectGateway);
        assert_eq!(r.location, "Meeting Room Second Floor");
    }

    #[test]
    fn test_correlated_readings_use_fingerprints() {
        let samples = vec![
            sample("Near Window", "Workshop First Floor", vec![-70, -95], 1),
            sample("By Door", "Meeting Room Second Floor", vec![-92, -68], 2),
        ];
        let mut resolver = Resolver::new(gateways(), 3, 3);
        resolver
            .resolve(
                "e1",
                Reading {
                    gateway_id: 1,
                    rssi: -72,
                    observed_at: 1000,
                },
                &samples,
            )
            .unwrap();
        let r = resolver
            .resolve(
                "e1",
                Reading {
                    gateway_id: 2,
                    rssi: -94,
                    observed_at: 1001,
                },
                &samples,
            )
            .unwrap();
        assert_eq!(r.policy, Policy::Fingerprint);
        assert_eq!(r.location, "Workshop First Floor");
    }

    #[test]
    fn test_stale_reading_outside_window_maps_directly() {
        let samples = vec![sample("Near Window", "Workshop First Floor", vec![-70, -95], 1)];
        let mut resolver = Resolver::new(gateways(), 3, 3);
        resolver
            .resolve(
                "e1",
                Reading {
                    gateway_id: 1,
                    rssi: -72,
                    observed_at: 1000,
                },
                &samples,
            )
            .unwrap();
        // Ten seconds later, well past the 3 s window.
        let r = resolver
            .resolve(
                "e1",
                Reading {
                    gateway_id: 2,
                    rssi: -94,
                    observed_at: 1010,
                },
                &samples,
            )
            .unwrap();
        assert_eq!(r.policy, Policy::DirectGateway);
        assert_eq!(r.location, "Meeting Room Second Floor");
    }

    #[test]
    fn test_empty_fingerprint_map_falls_back_to_direct() {
        let mut resolver = Resolver::new(gateways(), 3, 3);
        resolver
            .resolve(
                "e1",
                Reading {
                    gateway_id: 1,
                    rssi: -72,
                    observed_at: 1000,
                },
                &[],
            )
            .unwrap();
        let r = resolver
            .resolve(
                "e1",
                Reading {
                    gateway_id: 2,
                    rssi: -94,
                    observed_at: 1001,
                },
                &[],
            )
            .unwrap();
        assert_eq!(r.policy, Policy::DirectGateway);
    }

    #[test]
    fn test_employees_buffer_independently() {
        let samples = vec![
            sample("Near Window", "Workshop First Floor", vec![-70, -95], 1),
            sample("By Door", "Meeting Room Second Floor", vec![-92, -68], 2),
        ];
        let mut resolver = Resolver::new(gateways(), 3, 3);
        resolver
            .resolve(
                "e1",
                Reading {
                    gateway_id: 1,
                    rssi: -72,
                    observed_at: 1000,
                },
                &samples,
            )
            .unwrap();
        // A different employee's gateway-2 reading must not correlate
        // with e1's gateway-1 reading.
        let r = resolver
            .resolve(
                "e2",
                Reading {
                    gateway_id: 2,
                    rssi: -94,
                    observed_at: 1001,
                },
                &samples,
            )
            .unwrap();
        assert_eq!(r.policy, Policy::DirectGateway);
    }
}
