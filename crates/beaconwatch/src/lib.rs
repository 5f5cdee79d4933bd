//! # Beaconwatch
//!
//! An indoor localization and presence engine for BLE beacons. Fixed
//! gateways report beacon RSSI readings; a k-NN classifier over a
//! trained fingerprint map resolves them to named locations; a presence
//! aggregator maintains a freshness-aware live snapshot plus an
//! append-only detection log.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────┐   ┌────────────┐
//! │ Gateways  │──▶│    Ingest    │──▶│   SQLite   │
//! │ (RSSI)    │   │ Resolve+Log  │   │ log+state  │
//! └───────────┘   └──────────────┘   └─────┬──────┘
//!                                          │
//!                      ┌───────────────────┤
//!                      ▼                   ▼
//!                 ┌──────────┐       ┌──────────┐
//!                 │   CLI    │       │   HTTP   │
//!                 │   (bw)   │       │  (JSON)  │
//!                 └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! bw init                                  # create database
//! bw employee add --name Ada --badge E-1 \
//!    --mac aa:bb:cc:dd:ee:01 --department R&D
//! bw train --spot "Near Window" --location "Workshop First Floor" \
//!    --g1 -70 --g2 -95                     # record a fingerprint
//! bw predict --g1 -74 --g2 -93             # classify a live reading
//! bw presence                              # who is where
//! bw serve                                 # start the HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite store implementation |
//! | [`ingest`] | Detection ingest pipeline |
//! | [`fingerprint`] | Training and prediction commands |
//! | [`presence`] | Presence and history commands |
//! | [`refdata`] | Employee and location management |
//! | [`server`] | HTTP JSON API |

pub mod config;
pub mod db;
pub mod fingerprint;
pub mod ingest;
pub mod migrate;
pub mod presence;
pub mod refdata;
pub mod server;
pub mod sqlite_store;
