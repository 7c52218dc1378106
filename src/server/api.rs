//! REST handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::cache::CacheStats;
use crate::models::SourceId;
use crate::sources::SourceInfo;
use crate::utils::parse_iso_date;

use super::AppState;

// ============================================================================
// API Types
// ============================================================================

/// Error body for requests that never reach the poll contract
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: message.into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AvailabilityQuery {
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SourcesResponse {
    pub sources: Vec<SourceInfo>,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub scraping_enabled: bool,
    pub browser_sessions_in_use: usize,
    pub browser_session_capacity: usize,
    pub caches: BTreeMap<SourceId, CacheStats>,
    pub uptime_secs: u64,
}

// ============================================================================
// Routes
// ============================================================================

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/availability/{source}", get(get_availability))
        .route("/api/sources", get(list_sources))
        .route("/api/stats", get(get_stats))
        .with_state(state)
}

fn error(status: StatusCode, message: String) -> Response {
    (status, Json(ErrorResponse::new(message))).into_response()
}

/// Poll one source for one date
async fn get_availability(
    State(state): State<AppState>,
    Path(source): Path<String>,
    Query(query): Query<AvailabilityQuery>,
) -> Response {
    let Some(source_id) = SourceId::parse(&source) else {
        return error(StatusCode::NOT_FOUND, format!("Unknown source: {source}"));
    };

    let date = match query.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        None => None,
        Some(text) => match parse_iso_date(text) {
            Ok(date) => Some(date),
            Err(_) => {
                return error(
                    StatusCode::BAD_REQUEST,
                    format!("Invalid date format: {text}. Expected YYYY-MM-DD"),
                );
            }
        },
    };

    let response = state.service.poll(source_id, date).await;
    tracing::debug!(source = %source_id, date = response.date(), pending = response.is_pending(), "Poll answered");
    (StatusCode::OK, Json(response)).into_response()
}

async fn list_sources(State(state): State<AppState>) -> impl IntoResponse {
    Json(SourcesResponse {
        sources: state.service.sources(),
    })
}

async fn get_stats(State(state): State<AppState>) -> impl IntoResponse {
    let service = &state.service;
    Json(StatsResponse {
        scraping_enabled: service.is_enabled(),
        browser_sessions_in_use: service.limiter().in_use(),
        browser_session_capacity: service.limiter().capacity(),
        caches: service.stats().await,
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}
