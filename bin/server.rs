// Clinic Records - Stats Server
// Health check and clinic statistics over HTTP, with Axum

use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{SecondsFormat, Utc};
use clinic_records::{init_tracing, total_patients, ClinicError, Config, SqliteStore};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
struct AppState {
    store: Arc<Mutex<SqliteStore>>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClinicStatsResponse {
    total_patients: usize,
    timestamp: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Error, Debug)]
enum ApiError {
    #[error("database lock poisoned")]
    Poisoned,

    #[error(transparent)]
    Clinic(#[from] ClinicError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!(error = %self, "request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /health - Liveness check
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        timestamp: now(),
    })
}

/// GET /api/stats/clinic - Number of citizens on file
async fn clinic_stats(State(state): State<AppState>) -> Result<Json<ClinicStatsResponse>, ApiError> {
    let store = state.store.lock().map_err(|_| ApiError::Poisoned)?;
    let total = total_patients(&*store)?;

    Ok(Json(ClinicStatsResponse {
        total_patients: total,
        timestamp: now(),
    }))
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/stats/clinic", get(clinic_stats))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("info");

    println!("🌐 Clinic Records - Stats Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = Config::from_env()?;

    let store = SqliteStore::open(&config.db_path)
        .with_context(|| format!("Failed to open database: {}", config.db_path.display()))?;
    println!("✓ Database opened: {:?}", config.db_path);

    let state = AppState {
        store: Arc::new(Mutex::new(store)),
    };

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!(%addr, "listening");
    println!("\n🚀 Server running on http://localhost:{}", config.port);
    println!("   Health: http://localhost:{}/health", config.port);
    println!("   Stats:  http://localhost:{}/api/stats/clinic", config.port);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app(state))
        .await
        .context("Server stopped unexpectedly")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use clinic_records::{RecordStore, Table};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn state() -> AppState {
        AppState {
            store: Arc::new(Mutex::new(SqliteStore::open_in_memory().unwrap())),
        }
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get_json(app(state()), "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn test_clinic_stats_counts_citizens() {
        let state = state();
        {
            let store = state.store.lock().unwrap();
            let rows = ["Ana Reyes", "Ben Santos"]
                .iter()
                .map(|name| {
                    json!({"name": name, "age": 30, "address": "Rizal St"})
                        .as_object()
                        .cloned()
                        .unwrap()
                })
                .collect();
            store.insert(Table::Citizens, rows).unwrap();
        }

        let (status, body) = get_json(app(state), "/api/stats/clinic").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totalPatients"], 2);
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let response = app(state())
            .oneshot(Request::builder().uri("/api/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
