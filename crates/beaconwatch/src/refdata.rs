//! Reference data commands: `bw employee` and `bw location`.
//!
//! The presence engine only reads employees and locations; registering
//! them is a management task, so mutation lives here on the CLI rather
//! than on the HTTP surface.

use anyhow::Result;

use beaconwatch_core::store::PresenceStore;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

async fn open_store(config: &Config) -> Result<SqliteStore> {
    let pool = db::connect(config).await?;
    Ok(SqliteStore::new(pool, config.dims()))
}

pub async fn run_employee_add(
    config: &Config,
    name: &str,
    badge_id: &str,
    mac_address: &str,
    department: &str,
) -> Result<()> {
    let store = open_store(config).await?;
    let employee = store
        .add_employee(name, badge_id, mac_address, department)
        .await?;
    println!(
        "Added employee \"{}\" ({}) with beacon {}",
        employee.name, employee.department, employee.mac_address
    );
    Ok(())
}

pub async fn run_employee_list(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    let employees = store.list_employees().await?;

    if employees.is_empty() {
        println!("No employees registered.");
        return Ok(());
    }

    println!(
        "{:<20} {:<10} {:<20} {}",
        "NAME", "BADGE", "MAC ADDRESS", "DEPARTMENT"
    );
    for e in &employees {
        println!(
            "{:<20} {:<10} {:<20} {}",
            e.name, e.badge_id, e.mac_address, e.department
        );
    }
    Ok(())
}

pub async fn run_location_add(config: &Config, name: &str, description: &str) -> Result<()> {
    let store = open_store(config).await?;
    let location = store.add_location(name, description).await?;
    println!("Added location \"{}\"", location.name);
    Ok(())
}

pub async fn run_location_list(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    let locations = store.list_locations().await?;

    if locations.is_empty() {
        println!("No locations registered.");
        return Ok(());
    }

    println!("{:<28} {}", "NAME", "DESCRIPTION");
    for l in &locations {
        println!("{:<28} {}", l.name, l.description);
    }
    Ok(())
}
