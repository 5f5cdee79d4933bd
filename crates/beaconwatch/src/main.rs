//! # Beaconwatch CLI (`bw`)
//!
//! The `bw` binary is the primary interface for Beaconwatch. It
//! provides commands for database initialization, fingerprint training
//! and prediction, presence queries, reference data management, and
//! starting the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! bw --config ./config/bw.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `bw init` | Create the SQLite database and run schema migrations |
//! | `bw train` | Record a labeled RSSI fingerprint |
//! | `bw predict` | Classify a live RSSI vector against the fingerprint map |
//! | `bw fingerprints` | List the training map |
//! | `bw reset` | Clear the fingerprint map |
//! | `bw presence` | Current location and online status per employee |
//! | `bw logs` | Detection history with filters |
//! | `bw stats` | Detection counts per location and employee |
//! | `bw employee add/list` | Manage employee reference data |
//! | `bw location add/list` | Manage location reference data |
//! | `bw serve` | Start the HTTP JSON API |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use beaconwatch::{config, fingerprint, migrate, presence, refdata, server};

/// Beaconwatch — indoor localization and presence tracking from BLE
/// beacon RSSI readings.
///
/// All commands accept a `--config` flag pointing to a TOML
/// configuration file with the database path, server bind address,
/// positioning constants, and the gateway table.
#[derive(Parser)]
#[command(
    name = "bw",
    about = "Beaconwatch — fingerprint localization and presence engine for BLE beacons",
    version,
    long_about = "Beaconwatch locates employees inside a building from BLE beacon RSSI readings \
    captured by fixed gateways: fingerprint training, k-NN location prediction, and a \
    freshness-aware presence snapshot served over a JSON HTTP API."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/bw.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables
    /// (fingerprints, employees, locations, detections, presence).
    /// Idempotent — running it multiple times is safe.
    Init,

    /// Record a labeled RSSI fingerprint.
    ///
    /// Stand at a spot, read the RSSI seen by both gateways, and store
    /// the sample under a spot and location name. Duplicates at the
    /// same spot accumulate and improve future predictions.
    Train {
        /// Spot name (e.g. "Near Window").
        #[arg(long)]
        spot: String,

        /// Location name (e.g. "Workshop First Floor").
        #[arg(long)]
        location: String,

        /// RSSI seen by gateway 1, in dBm (e.g. -70).
        #[arg(long, allow_hyphen_values = true)]
        g1: i32,

        /// RSSI seen by gateway 2, in dBm (e.g. -95).
        #[arg(long, allow_hyphen_values = true)]
        g2: i32,
    },

    /// Classify a live RSSI vector against the fingerprint map.
    Predict {
        /// RSSI seen by gateway 1, in dBm.
        #[arg(long, allow_hyphen_values = true)]
        g1: i32,

        /// RSSI seen by gateway 2, in dBm.
        #[arg(long, allow_hyphen_values = true)]
        g2: i32,
    },

    /// List the fingerprint training map in training order.
    Fingerprints,

    /// Clear the fingerprint map. Idempotent; never touches the
    /// detection log or presence data.
    Reset,

    /// Show current location and online status for every employee.
    Presence,

    /// Show the detection history, newest first.
    Logs {
        /// Only show detections of this employee (by name).
        #[arg(long)]
        employee: Option<String>,

        /// Only show detections of employees in this department.
        #[arg(long)]
        department: Option<String>,

        /// Only show detections resolved to this location.
        #[arg(long)]
        location: Option<String>,
    },

    /// Show detection counts per location and per employee.
    Stats,

    /// Manage employee reference data.
    Employee {
        #[command(subcommand)]
        action: EmployeeAction,
    },

    /// Manage location reference data.
    Location {
        #[command(subcommand)]
        action: LocationAction,
    },

    /// Start the HTTP JSON API.
    ///
    /// Binds to the address configured in `[server].bind` and serves
    /// the fingerprint, detection, and presence endpoints.
    Serve,
}

/// Employee management subcommands.
#[derive(Subcommand)]
enum EmployeeAction {
    /// Register an employee and their beacon.
    Add {
        /// Full name.
        #[arg(long)]
        name: String,

        /// Badge number.
        #[arg(long)]
        badge: String,

        /// MAC address of the employee's BLE beacon.
        #[arg(long)]
        mac: String,

        /// Department name.
        #[arg(long)]
        department: String,
    },
    /// List registered employees.
    List,
}

/// Location management subcommands.
#[derive(Subcommand)]
enum LocationAction {
    /// Register a named location.
    Add {
        /// Location name (e.g. "Workshop First Floor").
        #[arg(long)]
        name: String,

        /// Free-form description.
        #[arg(long, default_value = "")]
        description: String,
    },
    /// List registered locations.
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Train {
            spot,
            location,
            g1,
            g2,
        } => {
            fingerprint::run_train(&cfg, &spot, &location, g1, g2).await?;
        }
        Commands::Predict { g1, g2 } => {
            fingerprint::run_predict(&cfg, g1, g2).await?;
        }
        Commands::Fingerprints => {
            fingerprint::run_list(&cfg).await?;
        }
        Commands::Reset => {
            fingerprint::run_reset(&cfg).await?;
        }
        Commands::Presence => {
            presence::run_presence(&cfg).await?;
        }
        Commands::Logs {
            employee,
            department,
            location,
        } => {
            presence::run_logs(&cfg, employee, department, location).await?;
        }
        Commands::Stats => {
            presence::run_stats(&cfg).await?;
        }
        Commands::Employee { action } => match action {
            EmployeeAction::Add {
                name,
                badge,
                mac,
                department,
            } => {
                refdata::run_employee_add(&cfg, &name, &badge, &mac, &department).await?;
            }
            EmployeeAction::List => {
                refdata::run_employee_list(&cfg).await?;
            }
        },
        Commands::Location { action } => match action {
            LocationAction::Add { name, description } => {
                refdata::run_location_add(&cfg, &name, &description).await?;
            }
            LocationAction::List => {
                refdata::run_location_list(&cfg).await?;
            }
        },
        Commands::Serve => {
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| "beaconwatch=info,bw=info".into()),
                )
                .init();
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
