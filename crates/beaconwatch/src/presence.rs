//! Presence query commands: `bw presence`, `bw logs`, and `bw stats`.

use anyhow::Result;
use std::collections::HashMap;

use beaconwatch_core::presence::{employee_counts, is_online, location_counts};
use beaconwatch_core::store::{LogFilter, PresenceStore};

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

fn format_ts(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

async fn open_store(config: &Config) -> Result<SqliteStore> {
    let pool = db::connect(config).await?;
    Ok(SqliteStore::new(pool, config.dims()))
}

pub async fn run_presence(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    let views = store.current_presence().await?;

    if views.is_empty() {
        println!("No employees registered. Add one with: bw employee add");
        return Ok(());
    }

    let now = chrono::Utc::now().timestamp();
    let window = config.positioning.freshness_window_secs;

    println!(
        "{:<20} {:<16} {:<28} {:<20} {}",
        "EMPLOYEE", "DEPARTMENT", "LOCATION", "DETECTED AT", "STATUS"
    );
    let mut online = 0;
    for v in &views {
        let status = if is_online(now, v.detected_at, window) {
            online += 1;
            "online"
        } else {
            "offline"
        };
        println!(
            "{:<20} {:<16} {:<28} {:<20} {}",
            v.employee,
            v.department,
            v.location,
            v.detected_at.map(format_ts).unwrap_or_else(|| "-".to_string()),
            status
        );
    }
    println!();
    println!("{} employees, {} online", views.len(), online);
    Ok(())
}

pub async fn run_logs(
    config: &Config,
    employee: Option<String>,
    department: Option<String>,
    location: Option<String>,
) -> Result<()> {
    let store = open_store(config).await?;
    let entries = store
        .detection_log(&LogFilter {
            employee,
            department,
            location,
        })
        .await?;

    if entries.is_empty() {
        println!("No detection records found.");
        return Ok(());
    }

    println!(
        "{:<20} {:<16} {:<28} {:>6} {}",
        "EMPLOYEE", "DEPARTMENT", "LOCATION", "RSSI", "DETECTED AT"
    );
    for e in &entries {
        println!(
            "{:<20} {:<16} {:<28} {:>6} {}",
            e.employee_name,
            e.department,
            e.location,
            e.rssi,
            format_ts(e.observed_at)
        );
    }
    println!();
    println!("{} records", entries.len());
    Ok(())
}

pub async fn run_stats(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    let events = store.events().await?;

    if events.is_empty() {
        println!("No detections yet.");
        return Ok(());
    }

    let names: HashMap<String, String> = store
        .list_employees()
        .await?
        .into_iter()
        .map(|e| (e.id, e.name))
        .collect();

    println!("Detections by location:");
    for bucket in location_counts(&events) {
        println!("  {:<28} {}", bucket.name, bucket.count);
    }
    println!();
    println!("Detections by employee:");
    for bucket in employee_counts(&events) {
        let name = names.get(&bucket.name).cloned().unwrap_or(bucket.name);
        println!("  {:<28} {}", name, bucket.count);
    }
    Ok(())
}
