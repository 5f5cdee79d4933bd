use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use beaconwatch_core::models::Gateway;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub positioning: PositioningConfig,
    pub gateways: Vec<GatewayConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PositioningConfig {
    /// Neighbor count for the k-NN classifier.
    #[serde(default = "default_k")]
    pub k: usize,
    /// An employee is online when last seen less than this many seconds ago.
    #[serde(default = "default_freshness_window_secs")]
    pub freshness_window_secs: i64,
    /// Readings from different gateways within this span are combined
    /// into one fingerprint query.
    #[serde(default = "default_correlation_window_secs")]
    pub correlation_window_secs: i64,
}

impl Default for PositioningConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            freshness_window_secs: default_freshness_window_secs(),
            correlation_window_secs: default_correlation_window_secs(),
        }
    }
}

fn default_k() -> usize {
    3
}
fn default_freshness_window_secs() -> i64 {
    300
}
fn default_correlation_window_secs() -> i64 {
    3
}

/// One fixed BLE gateway and the location it sits in.
#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    pub id: i64,
    pub name: String,
    pub location: String,
}

impl Config {
    /// Gateways in configuration order; this order defines the RSSI
    /// vector layout everywhere.
    pub fn gateways(&self) -> Vec<Gateway> {
        self.gateways
            .iter()
            .map(|g| Gateway {
                id: g.id,
                name: g.name.clone(),
                location: g.location.clone(),
            })
            .collect()
    }

    /// RSSI vector dimensionality (one reading per configured gateway).
    pub fn dims(&self) -> usize {
        self.gateways.len()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.positioning.k < 1 {
        anyhow::bail!("positioning.k must be >= 1");
    }
    if config.positioning.freshness_window_secs < 1 {
        anyhow::bail!("positioning.freshness_window_secs must be >= 1");
    }
    if config.positioning.correlation_window_secs < 1 {
        anyhow::bail!("positioning.correlation_window_secs must be >= 1");
    }

    // The train/predict wire format names gateway_1_rssi and
    // gateway_2_rssi, so the deployment is pinned to two gateways.
    if config.gateways.len() != 2 {
        anyhow::bail!(
            "exactly 2 gateways must be configured, got {}",
            config.gateways.len()
        );
    }
    for (i, a) in config.gateways.iter().enumerate() {
        if a.name.trim().is_empty() || a.location.trim().is_empty() {
            anyhow::bail!("gateway {} must have a name and a location", a.id);
        }
        if config.gateways[i + 1..].iter().any(|b| b.id == a.id) {
            anyhow::bail!("duplicate gateway id: {}", a.id);
        }
    }

    Ok(config)
}
