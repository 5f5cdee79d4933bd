//! SQLite-backed implementation of the Beaconwatch store traits.
//!
//! Maps each [`FingerprintStore`] and [`PresenceStore`] operation to
//! SQL against the schema created by `migrate`. The detection
//! transaction is the per-employee serialization point: the log append
//! and the conditional presence upsert commit together or not at all.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use beaconwatch_core::error::EngineError;
use beaconwatch_core::models::{
    validate_sample, DetectionEvent, Employee, FingerprintSample, Location, RssiVector,
    UNKNOWN_LOCATION,
};
use beaconwatch_core::presence::should_update;
use beaconwatch_core::store::{
    FingerprintStore, LogEntry, LogFilter, PresenceStore, PresenceView,
};

/// SQLite store. Wraps a [`SqlitePool`] plus the configured RSSI
/// dimensionality used to validate incoming samples.
pub struct SqliteStore {
    pool: SqlitePool,
    dims: usize,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, dims: usize) -> Self {
        Self { pool, dims }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn row_to_sample(row: &sqlx::sqlite::SqliteRow) -> Result<FingerprintSample> {
    let rssi_json: String = row.get("rssi_json");
    let readings: Vec<i32> = serde_json::from_str(&rssi_json)?;
    Ok(FingerprintSample {
        id: row.get("id"),
        spot_name: row.get("spot_name"),
        location_name: row.get("location_name"),
        rssi: RssiVector::new(readings),
        created_at: row.get("created_at"),
    })
}

#[async_trait]
impl FingerprintStore for SqliteStore {
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

        sqlx::query(
            "INSERT INTO fingerprints (id, spot_name, location_name, rssi_json, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&sample.id)
        .bind(&sample.spot_name)
        .bind(&sample.location_name)
        .bind(serde_json::to_string(&sample.rssi)?)
        .bind(sample.created_at)
        .execute(&self.pool)
        .await?;

        Ok(sample)
    }

    async fn list_samples(&self) -> Result<Vec<FingerprintSample>> {
        let rows = sqlx::query(
            "SELECT id, spot_name, location_name, rssi_json, created_at FROM fingerprints ORDER BY seq ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_sample).collect()
    }

    async fn reset(&self) -> Result<u64> {
        // Single statement: readers see all rows or none.
        let result = sqlx::query("DELETE FROM fingerprints")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl PresenceStore for SqliteStore {
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

        let employee = Employee {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            badge_id: badge_id.trim().to_string(),
            mac_address: mac_address.trim().to_lowercase(),
            department: department.trim().to_string(),
        };

        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO employees (id, name, badge_id, mac_address, department) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&employee.id)
        .bind(&employee.name)
        .bind(&employee.badge_id)
        .bind(&employee.mac_address)
        .bind(&employee.department)
        .execute(&self.pool)
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(EngineError::validation(format!(
                "mac_address already registered: {}",
                employee.mac_address
            ))
            .into());
        }

        Ok(employee)
    }

    async fn list_employees(&self) -> Result<Vec<Employee>> {
        let rows = sqlx::query(
            "SELECT id, name, badge_id, mac_address, department FROM employees ORDER BY rowid ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| Employee {
                id: row.get("id"),
                name: row.get("name"),
                badge_id: row.get("badge_id"),
                mac_address: row.get("mac_address"),
                department: row.get("department"),
            })
            .collect())
    }

    async fn employee_by_mac(&self, mac_address: &str) -> Result<Option<Employee>> {
        let row = sqlx::query(
            "SELECT id, name, badge_id, mac_address, department FROM employees WHERE mac_address = ?",
        )
        .bind(mac_address.trim().to_lowercase())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Employee {
            id: r.get("id"),
            name: r.get("name"),
            badge_id: r.get("badge_id"),
            mac_address: r.get("mac_address"),
            department: r.get("department"),
        }))
    }

    async fn add_location(&self, name: &str, description: &str) -> Result<Location> {
        if name.trim().is_empty() {
            return Err(EngineError::validation("location name must not be empty").into());
        }

        let location = Location {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            description: description.trim().to_string(),
        };

        let inserted =
            sqlx::query("INSERT OR IGNORE INTO locations (id, name, description) VALUES (?, ?, ?)")
                .bind(&location.id)
                .bind(&location.name)
                .bind(&location.description)
                .execute(&self.pool)
                .await?;

        if inserted.rows_affected() == 0 {
            return Err(EngineError::validation(format!(
                "location already exists: {}",
                location.name
            ))
            .into());
        }

        Ok(location)
    }

    async fn list_locations(&self) -> Result<Vec<Location>> {
        let rows =
            sqlx::query("SELECT id, name, description FROM locations ORDER BY rowid ASC")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .iter()
            .map(|row| Location {
                id: row.get("id"),
                name: row.get("name"),
                description: row.get("description"),
            })
            .collect())
    }

    async fn record_detection(&self, event: &DetectionEvent) -> Result<bool> {
        let known: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM employees WHERE id = ?")
            .bind(&event.employee_id)
            .fetch_one(&self.pool)
            .await?;
        if !known {
            return Err(EngineError::unknown("employee", event.employee_id.clone()).into());
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO detections (employee_id, gateway_id, rssi, location, observed_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&event.employee_id)
        .bind(event.gateway_id)
        .bind(event.rssi)
        .bind(&event.location)
        .bind(event.observed_at)
        .execute(&mut *tx)
        .await?;

        let current: Option<Option<i64>> =
            sqlx::query_scalar("SELECT detected_at FROM presence WHERE employee_id = ?")
                .bind(&event.employee_id)
                .fetch_optional(&mut *tx)
                .await?;

        let updated = should_update(current.flatten(), event.observed_at);
        if updated {
            sqlx::query(
                r#"
                INSERT INTO presence (employee_id, location, detected_at)
                VALUES (?, ?, ?)
                ON CONFLICT(employee_id) DO UPDATE SET
                    location = excluded.location,
                    detected_at = excluded.detected_at
                "#,
            )
            .bind(&event.employee_id)
            .bind(&event.location)
            .bind(event.observed_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(updated)
    }

    async fn current_presence(&self) -> Result<Vec<PresenceView>> {
        let rows = sqlx::query(
            r#"
            SELECT e.id, e.name, e.department, p.location, p.detected_at
            FROM employees e
            LEFT JOIN presence p ON p.employee_id = e.id
            ORDER BY e.rowid ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let location: Option<String> = row.get("location");
                PresenceView {
                    employee_id: row.get("id"),
                    employee: row.get("name"),
                    department: row.get("department"),
                    location: location.unwrap_or_else(|| UNKNOWN_LOCATION.to_string()),
                    detected_at: row.get("detected_at"),
                }
            })
            .collect())
    }

    async fn detection_log(&self, filter: &LogFilter) -> Result<Vec<LogEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT e.name, e.department, d.location, d.rssi, d.observed_at
            FROM detections d
            JOIN employees e ON e.id = d.employee_id
            WHERE (? IS NULL OR e.name = ?)
              AND (? IS NULL OR e.department = ?)
              AND (? IS NULL OR d.location = ?)
            ORDER BY d.observed_at DESC, d.seq DESC
            "#,
        )
        .bind(&filter.employee)
        .bind(&filter.employee)
        .bind(&filter.department)
        .bind(&filter.department)
        .bind(&filter.location)
        .bind(&filter.location)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| LogEntry {
                employee_name: row.get("name"),
                department: row.get("department"),
                location: row.get("location"),
                rssi: row.get("rssi"),
                observed_at: row.get("observed_at"),
            })
            .collect())
    }

    async fn events(&self) -> Result<Vec<DetectionEvent>> {
        let rows = sqlx::query(
            "SELECT employee_id, gateway_id, rssi, location, observed_at FROM detections ORDER BY seq ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| DetectionEvent {
                employee_id: row.get("employee_id"),
                gateway_id: row.get("gateway_id"),
                rssi: row.get("rssi"),
                location: row.get("location"),
                observed_at: row.get("observed_at"),
            })
            .collect())
    }
}
