//! Beaconwatch HTTP API.
//!
//! Exposes the fingerprint trainer, the k-NN predictor, the detection
//! ingest endpoint, and the presence query views as a JSON API for the
//! dashboard and for gateway report forwarders.
//!
//! # Endpoints
//!
//! | Method   | Path                  | Description |
//! |----------|-----------------------|-------------|
//! | `POST`   | `/fingerprint/train`  | Record a labeled RSSI sample |
//! | `GET`    | `/fingerprint`        | List samples in training order |
//! | `POST`   | `/fingerprint/predict`| Classify a live RSSI vector |
//! | `DELETE` | `/fingerprint/reset`  | Clear the fingerprint map |
//! | `POST`   | `/detections`         | Ingest one gateway report |
//! | `GET`    | `/presence/current`   | Live presence, one row per employee |
//! | `GET`    | `/presence/logs`      | Detection history with filters |
//! | `GET`    | `/presence/stats`     | Per-location / per-employee counts |
//! | `GET`    | `/employees`          | Reference data (read-only) |
//! | `GET`    | `/locations`          | Reference data (read-only) |
//! | `GET`    | `/health`             | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "spot_name must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `no_data` (404), `unknown_entity`
//! (404), `internal` (500). Reference-data mutation is not served over
//! HTTP; it belongs to the management layer (see the `bw employee` and
//! `bw location` commands).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the browser
//! dashboard can poll from any host.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tower_http::cors::{Any, CorsLayer};

use beaconwatch_core::error::EngineError;
use beaconwatch_core::models::RssiVector;
use beaconwatch_core::predict::{predict, Prediction};
use beaconwatch_core::presence::{employee_counts, is_online, location_counts, CountBucket};
use beaconwatch_core::resolve::Resolver;
use beaconwatch_core::store::{FingerprintStore, LogFilter, PresenceStore};

use crate::config::Config;
use crate::db;
use crate::ingest::{ingest_detection, GatewayReport};
use crate::sqlite_store::SqliteStore;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    store: Arc<SqliteStore>,
    resolver: Arc<Mutex<Resolver>>,
}

/// Starts the HTTP server.
///
/// Binds to the address configured in `[server].bind` and runs until
/// the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let pool = db::connect(config).await?;
    let store = Arc::new(SqliteStore::new(pool, config.dims()));
    let resolver = Arc::new(Mutex::new(Resolver::new(
        config.gateways(),
        config.positioning.correlation_window_secs,
        config.positioning.k,
    )));

    let state = AppState {
        config: Arc::new(config.clone()),
        store,
        resolver,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/fingerprint/train", post(handle_train))
        .route("/fingerprint", get(handle_list_fingerprints))
        .route("/fingerprint/predict", post(handle_predict))
        .route("/fingerprint/reset", delete(handle_reset))
        .route("/detections", post(handle_detection))
        .route("/presence/current", get(handle_presence_current))
        .route("/presence/logs", get(handle_presence_logs))
        .route("/presence/stats", get(handle_presence_stats))
        .route("/employees", get(handle_employees))
        .route("/locations", get(handle_locations))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    tracing::info!("beaconwatch listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

/// Maps engine errors to status codes by downcasting the typed enum
/// out of `anyhow::Error`; anything else is a 500.
fn classify_engine_error(err: anyhow::Error) -> AppError {
    match err.downcast_ref::<EngineError>() {
        Some(EngineError::Validation(_)) => bad_request(err.to_string()),
        Some(EngineError::InsufficientData) => AppError {
            status: StatusCode::NOT_FOUND,
            code: "no_data".to_string(),
            message: err.to_string(),
        },
        Some(EngineError::UnknownEntity { .. }) => AppError {
            status: StatusCode::NOT_FOUND,
            code: "unknown_entity".to_string(),
            message: err.to_string(),
        },
        None => {
            tracing::error!(error = %err, "internal error");
            AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "internal".to_string(),
                message: err.to_string(),
            }
        }
    }
}

/// Format a Unix timestamp as ISO 8601, the shape the dashboard parses.
fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /fingerprint/train ============

/// Wire shape for training. Fields are optional so a missing field
/// yields a 400 with a message instead of a bare deserialization error.
#[derive(Deserialize)]
struct TrainRequest {
    spot_name: Option<String>,
    location_name: Option<String>,
    gateway_1_rssi: Option<i32>,
    gateway_2_rssi: Option<i32>,
}

#[derive(Serialize)]
struct FingerprintResponse {
    spot_name: String,
    location_name: String,
    gateway_1_rssi: i32,
    gateway_2_rssi: i32,
}

async fn handle_train(
    State(state): State<AppState>,
    Json(req): Json<TrainRequest>,
) -> Result<Json<FingerprintResponse>, AppError> {
    let spot_name = req
        .spot_name
        .ok_or_else(|| bad_request("spot_name is required"))?;
    let location_name = req
        .location_name
        .ok_or_else(|| bad_request("location_name is required"))?;
    let g1 = req
        .gateway_1_rssi
        .ok_or_else(|| bad_request("gateway_1_rssi is required"))?;
    let g2 = req
        .gateway_2_rssi
        .ok_or_else(|| bad_request("gateway_2_rssi is required"))?;

    let sample = state
        .store
        .add_sample(&spot_name, &location_name, RssiVector::new(vec![g1, g2]))
        .await
        .map_err(classify_engine_error)?;

    Ok(Json(FingerprintResponse {
        spot_name: sample.spot_name,
        location_name: sample.location_name,
        gateway_1_rssi: sample.rssi.0[0],
        gateway_2_rssi: sample.rssi.0[1],
    }))
}

// ============ GET /fingerprint ============

async fn handle_list_fingerprints(
    State(state): State<AppState>,
) -> Result<Json<Vec<FingerprintResponse>>, AppError> {
    let samples = state
        .store
        .list_samples()
        .await
        .map_err(classify_engine_error)?;

    Ok(Json(
        samples
            .into_iter()
            .map(|s| FingerprintResponse {
                spot_name: s.spot_name,
                location_name: s.location_name,
                gateway_1_rssi: s.rssi.0[0],
                gateway_2_rssi: s.rssi.0[1],
            })
            .collect(),
    ))
}

// ============ POST /fingerprint/predict ============

#[derive(Deserialize)]
struct PredictRequest {
    gateway_1_rssi: Option<i32>,
    gateway_2_rssi: Option<i32>,
}

async fn handle_predict(
    State(state): State<AppState>,
    Json(req): Json<PredictRequest>,
) -> Result<Json<Prediction>, AppError> {
    let g1 = req
        .gateway_1_rssi
        .ok_or_else(|| bad_request("gateway_1_rssi is required"))?;
    let g2 = req
        .gateway_2_rssi
        .ok_or_else(|| bad_request("gateway_2_rssi is required"))?;

    let samples = state
        .store
        .list_samples()
        .await
        .map_err(classify_engine_error)?;

    let prediction = predict(
        &samples,
        &RssiVector::new(vec![g1, g2]),
        state.config.positioning.k,
    )
    .map_err(|e| classify_engine_error(e.into()))?;

    Ok(Json(prediction))
}

// ============ DELETE /fingerprint/reset ============

#[derive(Serialize)]
struct ResetResponse {
    removed: u64,
}

async fn handle_reset(State(state): State<AppState>) -> Result<Json<ResetResponse>, AppError> {
    let removed = state.store.reset().await.map_err(classify_engine_error)?;
    Ok(Json(ResetResponse { removed }))
}

// ============ POST /detections ============

#[derive(Deserialize)]
struct DetectionRequest {
    mac_address: Option<String>,
    gateway_id: Option<i64>,
    rssi: Option<i32>,
    observed_at: Option<i64>,
}

#[derive(Serialize)]
struct DetectionResponse {
    employee: String,
    location: String,
    snapshot_updated: bool,
}

async fn handle_detection(
    State(state): State<AppState>,
    Json(req): Json<DetectionRequest>,
) -> Result<Json<DetectionResponse>, AppError> {
    let mac_address = req
        .mac_address
        .ok_or_else(|| bad_request("mac_address is required"))?;
    let gateway_id = req
        .gateway_id
        .ok_or_else(|| bad_request("gateway_id is required"))?;
    let rssi = req.rssi.ok_or_else(|| bad_request("rssi is required"))?;

    let outcome = ingest_detection(
        state.store.as_ref(),
        &state.resolver,
        GatewayReport {
            mac_address,
            gateway_id,
            rssi,
            observed_at: req.observed_at,
        },
    )
    .await
    .map_err(classify_engine_error)?;

    Ok(Json(DetectionResponse {
        employee: outcome.employee.name,
        location: outcome.resolution.location,
        snapshot_updated: outcome.snapshot_updated,
    }))
}

// ============ GET /presence/current ============

#[derive(Serialize)]
struct PresenceResponse {
    employee: String,
    department: String,
    location: String,
    detected_at: Option<String>,
    online: bool,
}

async fn handle_presence_current(
    State(state): State<AppState>,
) -> Result<Json<Vec<PresenceResponse>>, AppError> {
    let views = state
        .store
        .current_presence()
        .await
        .map_err(classify_engine_error)?;

    let now = chrono::Utc::now().timestamp();
    let window = state.config.positioning.freshness_window_secs;

    Ok(Json(
        views
            .into_iter()
            .map(|v| PresenceResponse {
                employee: v.employee,
                department: v.department,
                location: v.location,
                online: is_online(now, v.detected_at, window),
                detected_at: v.detected_at.map(format_ts_iso),
            })
            .collect(),
    ))
}

// ============ GET /presence/logs ============

#[derive(Deserialize)]
struct LogsQuery {
    employee: Option<String>,
    department: Option<String>,
    location: Option<String>,
}

#[derive(Serialize)]
struct LogEmployee {
    name: String,
    department: String,
}

#[derive(Serialize)]
struct LogLocation {
    name: String,
}

#[derive(Serialize)]
struct LogResponse {
    employee: LogEmployee,
    location: LogLocation,
    rssi: i32,
    detected_at: String,
}

async fn handle_presence_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Vec<LogResponse>>, AppError> {
    let filter = LogFilter {
        employee: query.employee,
        department: query.department,
        location: query.location,
    };

    let entries = state
        .store
        .detection_log(&filter)
        .await
        .map_err(classify_engine_error)?;

    Ok(Json(
        entries
            .into_iter()
            .map(|e| LogResponse {
                employee: LogEmployee {
                    name: e.employee_name,
                    department: e.department,
                },
                location: LogLocation { name: e.location },
                rssi: e.rssi,
                detected_at: format_ts_iso(e.observed_at),
            })
            .collect(),
    ))
}

// ============ GET /presence/stats ============

#[derive(Serialize)]
struct StatsResponse {
    location_counts: Vec<CountBucket>,
    employee_counts: Vec<CountBucket>,
}

async fn handle_presence_stats(
    State(state): State<AppState>,
) -> Result<Json<StatsResponse>, AppError> {
    let events = state.store.events().await.map_err(classify_engine_error)?;
    let employees = state
        .store
        .list_employees()
        .await
        .map_err(classify_engine_error)?;
    let names: HashMap<String, String> = employees
        .into_iter()
        .map(|e| (e.id, e.name))
        .collect();

    // employee_counts buckets carry employee ids; join names in here.
    let by_employee = employee_counts(&events)
        .into_iter()
        .map(|b| CountBucket {
            name: names.get(&b.name).cloned().unwrap_or(b.name),
            count: b.count,
        })
        .collect();

    Ok(Json(StatsResponse {
        location_counts: location_counts(&events),
        employee_counts: by_employee,
    }))
}

// ============ GET /employees, GET /locations ============

#[derive(Serialize)]
struct EmployeeResponse {
    name: String,
    badge_id: String,
    mac_address: String,
    department: String,
}

async fn handle_employees(
    State(state): State<AppState>,
) -> Result<Json<Vec<EmployeeResponse>>, AppError> {
    let employees = state
        .store
        .list_employees()
        .await
        .map_err(classify_engine_error)?;
    Ok(Json(
        employees
            .into_iter()
            .map(|e| EmployeeResponse {
                name: e.name,
                badge_id: e.badge_id,
                mac_address: e.mac_address,
                department: e.department,
            })
            .collect(),
    ))
}

#[derive(Serialize)]
struct LocationResponse {
    name: String,
    description: String,
}

async fn handle_locations(
    State(state): State<AppState>,
) -> Result<Json<Vec<LocationResponse>>, AppError> {
    let locations = state
        .store
        .list_locations()
        .await
        .map_err(classify_engine_error)?;
    Ok(Json(
        locations
            .into_iter()
            .map(|l| LocationResponse {
                name: l.name,
                description: l.description,
            })
            .collect(),
    ))
}
