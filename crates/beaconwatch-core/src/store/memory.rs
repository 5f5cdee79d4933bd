//! In-memory store implementation for tests and embedded use.
//!
//! Uses `Vec` and `HashMap` behind `std::sync::RwLock`. The single
//! write lock per state block is the serialization discipline: `reset`
//! swaps the whole fingerprint vector under the write lock, and
//! `record_detection` appends to the log and checks-then-updates the
//! presence map under one write lock, so readers never observe a torn
//! state and same-employee events cannot race.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::{
    validate_sample, DetectionEvent, Employee, FingerprintSample, Location, PresenceRecord,
    RssiVector,
};
use crate::presence::should_update;

use super::{FingerprintStore, LogEntry, LogFilter, PresenceStore, PresenceView};

/// Detection log and presence snapshot, guarded together so an append
/// plus conditional update is one atomic step.
#[derive(Default)]
struct PresenceState {
    log: Vec<DetectionEvent>,
    presence: HashMap<String, PresenceRecord>,
}

/// In-memory store for tests and embedded deployments.
pub struct InMemoryStore {
    dims: usize,
    fingerprints: RwLock<Vec<FingerprintSample>>,
    employees: RwLock<Vec<Employee>>,
    locations: RwLock<Vec<Location>>,
    state: RwLock<PresenceState>,
}

impl InMemoryStore {
    pub fn new(dims: usize) -> Self {
        InMemoryStore {
            dims,
            fingerprints: RwLock::new(Vec::new()),
            employees: RwLock::new(Vec::new()),
            locations: RwLock::new(Vec::new()),
            state: RwLock::new(PresenceState::default()),
        }
    }
}

#[async_trait]
impl FingerprintStore for InMemoryStore {
    fn dims(&self) -> usize {
        self.dims
    }

    async fn add_sample(
        &self,
        spot_name: &str,
        location_name: &str,
        rssi: RssiVector,
    ) -> Result<FingerprintSample> {
        validate_sample(spot_name, location_name, &rssi, self.dims)?;
        let sample = FingerprintSample {
            id: Uuid::new_v4().to_string(),
            spot_name: spot_name.trim().to_string(),
            location_name: location_name.trim().to_string(),
            rssi,
            created_at: chrono::Utc::now().timestamp(),
        };
        self.fingerprints.write().unwrap().push(sample.clone());
        Ok(sample)
    }

    async fn list_samples(&self) -> Result<Vec<FingerprintSample>> {
        Ok(self.fingerprints.read().unwrap().clone())
    }

    async fn reset(&self) -> Result<u64> {
        let mut samples = self.fingerprints.write().unwrap();
        let removed = samples.len() as u64;
        samples.clear();
        Ok(removed)
    }
}

#[async_trait]
impl PresenceStore for InMemoryStore {
    async fn add_employee(
        &self,
        name: &str,
        badge_id: &str,
        mac_address: &str,
        department: &str,
    ) -> Result<Employee> {
        if name.trim().is_empty() {
            return Err(EngineError::validation("employee name must not be empty").into());
        }
        if mac_address.trim().is_empty() {
            return Err(EngineError::validation("mac_address must not be empty").into());
        }
        let mut employees = self.employees.write().unwrap();
        if employees
            .iter()
            .any(|e| e.mac_address.eq_ignore_ascii_case(mac_address.trim()))
        {
            return Err(EngineError::validation(format!(
                "mac_address already registered: {}",
                mac_address.trim()
            ))
            .into());
        }
        let employee = Employee {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            badge_id: badge_id.trim().to_string(),
            mac_address: mac_address.trim().to_lowercase(),
            department: department.trim().to_string(),
        };
        employees.push(employee.clone());
        Ok(employee)
    }

    async fn list_employees(&self) -> Result<Vec<Employee>> {
        Ok(self.employees.read().unwrap().clone())
    }

    async fn employee_by_mac(&self, mac_address: &str) -> Result<Option<Employee>> {
        Ok(self
            .employees
            .read()
            .unwrap()
            .iter()
            .find(|e| e.mac_address.eq_ignore_ascii_case(mac_address.trim()))
            .cloned())
    }

    async fn add_location(&self, name: &str, description: &str) -> Result<Location> {
        if name.trim().is_empty() {
            return Err(EngineError::validation("location name must not be empty").into());
        }
        let mut locations = self.locations.write().unwrap();
        if locations.iter().any(|l| l.name == name.trim()) {
            return Err(EngineError::validation(format!(
                "location already exists: {}",
                name.trim()
            ))
            .into());
        }
        let location = Location {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            description: description.trim().to_string(),
        };
        locations.push(location.clone());
        Ok(location)
    }

    async fn list_locations(&self) -> Result<Vec<Location>> {
        Ok(self.locations.read().unwrap().clone())
    }

    async fn record_detection(&self, event: &DetectionEvent) -> Result<bool> {
        let known = self
            .employees
            .read()
            .unwrap()
            .iter()
            .any(|e| e.id == event.employee_id);
        if !known {
            return Err(EngineError::unknown("employee", event.employee_id.clone()).into());
        }

        let mut state = self.state.write().unwrap();
        state.log.push(event.clone());

        let record = state
            .presence
            .entry(event.employee_id.clone())
            .or_insert_with(|| PresenceRecord::unknown(event.employee_id.clone()));
        if should_update(record.detected_at, event.observed_at) {
            record.location = event.location.clone();
            record.detected_at = Some(event.observed_at);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn current_presence(&self) -> Result<Vec<PresenceView>> {
        let employees = self.employees.read().unwrap();
        let state = self.state.read().unwrap();
        Ok(employees
            .iter()
            .map(|e| {
                let record = state.presence.get(&e.id);
                PresenceView {
                    employee_id: e.id.clone(),
                    employee: e.name.clone(),
                    department: e.department.clone(),
                    location: record
                        .map(|r| r.location.clone())
                        .unwrap_or_else(|| crate::models::UNKNOWN_LOCATION.to_string()),
                    detected_at: record.and_then(|r| r.detected_at),
                }
            })
            .collect())
    }

    async fn detection_log(&self, filter: &LogFilter) -> Result<Vec<LogEntry>> {
        let employees = self.employees.read().unwrap();
        let by_id: HashMap<&str, &Employee> =
            employees.iter().map(|e| (e.id.as_str(), e)).collect();
        let state = self.state.read().unwrap();

        let mut entries: Vec<LogEntry> = state
            .log
            .iter()
            .filter_map(|event| {
                let employee = by_id.get(event.employee_id.as_str())?;
                Some(LogEntry {
                    employee_name: employee.name.clone(),
                    department: employee.department.clone(),
                    location: event.location.clone(),
                    rssi: event.rssi,
                    observed_at: event.observed_at,
                })
            })
            .filter(|entry| {
                filter
                    .employee
                    .as_deref()
                    .map_or(true, |e| entry.employee_name == e)
                    && filter
                        .department
                        .as_deref()
                        .map_or(true, |d| entry.department == d)
                    && filter
                        .location
                        .as_deref()
                        .map_or(true, |l| entry.location == l)
            })
            .collect();
        entries.sort_by(|a, b| b.observed_at.cmp(&a.observed_at));
        Ok(entries)
    }

    async fn events(&self) -> Result<Vec<DetectionEvent>> {
        Ok(self.state.read().unwrap().log.clone())
    }
}
