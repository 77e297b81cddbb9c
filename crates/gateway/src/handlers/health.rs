//! Liveness and readiness checks

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::time::Instant;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct Liveness {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Readiness {
    pub status: &'static str,
    pub database: DatabaseCheck,
    /// `running`, `stopped` or `disabled`
    pub orphan_sweeper: &'static str,
}

#[derive(Debug, Serialize)]
pub struct DatabaseCheck {
    pub reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The process is up and serving
pub async fn health() -> Json<Liveness> {
    Json(Liveness {
        status: "alive",
        version: quire_common::VERSION,
    })
}

/// 200 while the database answers, 503 otherwise
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<Readiness>) {
    let started = Instant::now();
    let database = match state.db.ping().await {
        Ok(()) => DatabaseCheck {
            reachable: true,
            latency_ms: Some(started.elapsed().as_millis() as u64),
            error: None,
        },
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            DatabaseCheck {
                reachable: false,
                latency_ms: None,
                error: Some(e.to_string()),
            }
        }
    };

    let orphan_sweeper = match state.sweeper {
        Some(ref sweeper) if sweeper.is_running() => "running",
        Some(_) => "stopped",
        None => "disabled",
    };

    let (code, status) = if database.reachable {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
    };

    (
        code,
        Json(Readiness {
            status,
            database,
            orphan_sweeper,
        }),
    )
}
