//! Fingerprint training and prediction commands.
//!
//! Used by the `bw train`, `bw predict`, `bw fingerprints`, and
//! `bw reset` CLI commands. All of them delegate to the same store and
//! predictor the HTTP server uses.

use anyhow::Result;

use beaconwatch_core::models::RssiVector;
use beaconwatch_core::predict::predict;
use beaconwatch_core::store::FingerprintStore;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

async fn open_store(config: &Config) -> Result<SqliteStore> {
    let pool = db::connect(config).await?;
    Ok(SqliteStore::new(pool, config.dims()))
}

pub async fn run_train(
    config: &Config,
    spot_name: &str,
    location_name: &str,
    g1: i32,
    g2: i32,
) -> Result<()> {
    let store = open_store(config).await?;
    let sample = store
        .add_sample(spot_name, location_name, RssiVector::new(vec![g1, g2]))
        .await?;
    println!(
        "Trained \"{}\" at \"{}\" ({} dBm, {} dBm)",
        sample.spot_name, sample.location_name, g1, g2
    );
    Ok(())
}

pub async fn run_predict(config: &Config, g1: i32, g2: i32) -> Result<()> {
    let store = open_store(config).await?;
    let samples = store.list_samples().await?;
    let prediction = predict(
        &samples,
        &RssiVector::new(vec![g1, g2]),
        config.positioning.k,
    )?;

    println!("Predicted location: {}", prediction.predicted_location);
    println!("Nearest spot:       {}", prediction.nearest_spot);
    println!();
    println!(
        "{:<24} {:<28} {:>8}",
        "SPOT", "LOCATION", "DISTANCE"
    );
    for n in &prediction.neighbors {
        println!(
            "{:<24} {:<28} {:>8.2}",
            n.spot_name, n.location_name, n.distance
        );
    }
    Ok(())
}

pub async fn run_list(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    let samples = store.list_samples().await?;

    if samples.is_empty() {
        println!("No fingerprint data yet. Train with: bw train --spot <name> --location <name> --g1 <rssi> --g2 <rssi>");
        return Ok(());
    }

    println!(
        "{:<24} {:<28} {:>8} {:>8}",
        "SPOT", "LOCATION", "GW1", "GW2"
    );
    for s in &samples {
        println!(
            "{:<24} {:<28} {:>8} {:>8}",
            s.spot_name, s.location_name, s.rssi.0[0], s.rssi.0[1]
        );
    }
    println!();
    println!("{} samples", samples.len());
    Ok(())
}

pub async fn run_reset(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    let removed = store.reset().await?;
    println!("Removed {} fingerprint samples.", removed);
    Ok(())
}
