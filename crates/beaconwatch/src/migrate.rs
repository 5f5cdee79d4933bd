use anyhow::Result;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    // Fingerprint training map. seq preserves insertion order; the
    // RSSI vector is stored as a JSON array so the schema does not
    // change with the gateway count.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS fingerprints (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            spot_name TEXT NOT NULL,
            location_name TEXT NOT NULL,
            rssi_json TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS employees (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            badge_id TEXT NOT NULL,
            mac_address TEXT NOT NULL UNIQUE,
            department TEXT NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS locations (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Append-only detection log, the source of truth for history and
    // analytics views.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS detections (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            employee_id TEXT NOT NULL,
            gateway_id INTEGER NOT NULL,
            rssi INTEGER NOT NULL,
            location TEXT NOT NULL,
            observed_at INTEGER NOT NULL,
            FOREIGN KEY (employee_id) REFERENCES employees(id)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Live snapshot: at most one row per employee.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS presence (
            employee_id TEXT PRIMARY KEY,
            location TEXT NOT NULL,
            detected_at INTEGER,
            FOREIGN KEY (employee_id) REFERENCES employees(id)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_detections_observed_at ON detections(observed_at DESC)",
    )
    .execute(&pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_detections_employee_id ON detections(employee_id)",
    )
    .execute(&pool)
    .await?;

    pool.close().await;
    Ok(())
}
