//! # Beaconwatch Core
//!
//! Shared, runtime-free logic for Beaconwatch: data models, the RSSI
//! fingerprint predictor, presence derivation rules, detection
//! resolution, and the store abstraction.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or other
//! native-only dependencies. Everything here is a pure computation over
//! data handed in by the application crate, which makes the localization
//! and presence rules directly unit-testable.

pub mod error;
pub mod models;
pub mod predict;
pub mod presence;
pub mod resolve;
pub mod store;
