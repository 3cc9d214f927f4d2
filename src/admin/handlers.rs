use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::admin::AdminState;
use crate::health::status::StatusView;

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemStatus {
    pub version: String,
    pub status: String,
    pub remotes: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RemoteStatus {
    pub name: String,
    pub status: StatusView,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    /// ok, blocked, failed or no-target
    pub outcome: String,
    pub http_status: Option<u16>,
    pub error: Option<String>,
    pub status: StatusView,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "operational".to_string(),
        remotes: state.registry.len(),
    })
}

pub async fn list_remotes(State(state): State<AdminState>) -> Json<Vec<RemoteStatus>> {
    let remotes = state
        .registry
        .statuses()
        .into_iter()
        .map(|(name, status)| RemoteStatus {
            name,
            status: status.view(),
        })
        .collect();
    Json(remotes)
}

pub async fn get_remote(
    State(state): State<AdminState>,
    Path(name): Path<String>,
) -> Result<Json<RemoteStatus>, StatusCode> {
    let guard = state.registry.get(&name).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(RemoteStatus {
        name,
        status: guard.current_status().view(),
    }))
}

/// HEAD the remote through its guard and report what happened.
pub async fn check_remote(
    State(state): State<AdminState>,
    Path(name): Path<String>,
) -> Result<Json<CheckResult>, StatusCode> {
    let guard = state.registry.get(&name).ok_or(StatusCode::NOT_FOUND)?;

    let (outcome, http_status, error) = match guard.check().await {
        Some(Ok(status)) => ("ok", Some(status.as_u16()), None),
        Some(Err(e)) if e.is_blocked() => ("blocked", None, Some(e.to_string())),
        Some(Err(e)) => ("failed", None, Some(e.to_string())),
        None => ("no-target", None, None),
    };

    tracing::info!(repository = %name, outcome, "Manual remote check");

    Ok(Json(CheckResult {
        name,
        outcome: outcome.to_string(),
        http_status,
        error,
        status: guard.current_status().view(),
    }))
}
