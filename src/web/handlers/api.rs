use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;
use tracing::{error, info};

use crate::rag::models::{ConversationTurn, OrchestratedResponse};
use crate::timeline::Parameter;
use crate::web::state::AppState;

type HandlerError = (StatusCode, String);
type BlockingError = Box<dyn Error + Send + Sync>;

// Chat types

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatHistoryResponse {
    pub session_id: String,
    pub history: Vec<ConversationTurn>,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

fn default_history_limit() -> usize {
    10
}

// Data catalogue types

#[derive(Debug, Serialize)]
pub struct DataSummary {
    pub floats: i64,
    pub profiles: i64,
    pub measurements: i64,
    pub summaries: i64,
    pub latest_data: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FloatRecord {
    pub float_id: i64,
    pub wmo_id: String,
    pub last_latitude: Option<f64>,
    pub last_longitude: Option<f64>,
    pub last_position_date: Option<String>,
    pub platform_type: Option<String>,
    pub status: Option<String>,
    pub has_core_data: bool,
    pub has_bgc_data: bool,
}

#[derive(Debug, Serialize)]
pub struct ProfileRecord {
    pub id: i64,
    pub cycle_number: i32,
    pub profile_date: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub data_mode: String,
    pub qc_flag: String,
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    #[serde(default = "default_page_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_page_limit() -> usize {
    10
}

#[derive(Debug, Deserialize)]
pub struct TimelineParams {
    pub start_date: String,
    pub end_date: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_parameter")]
    pub parameter: String,
}

fn default_region() -> String {
    "global".to_string()
}

fn default_parameter() -> String {
    "temperature".to_string()
}

// Service banner

pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "FloatChat API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

pub async fn health(state: State<Arc<AppState>>) -> impl IntoResponse {
    let pool = state.db_pool.clone();
    let db_check: Result<i64, BlockingError> =
        match tokio::task::spawn_blocking(move || -> Result<i64, BlockingError> {
            let conn = pool.get()?;
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM argo_floats", [], |row| row.get(0))?;
            Ok(count)
        })
        .await
        {
            Ok(result) => result,
            Err(join_err) => Err(join_err.into()),
        };

    let rag_status = if state.rag.is_some() {
        "available"
    } else {
        "unavailable"
    };

    match db_check {
        Ok(float_count) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "healthy",
                "database": "connected",
                "rag_system": rag_status,
                "data_points": float_count,
                "timestamp": chrono::Utc::now().to_rfc3339(),
            })),
        ),
        Err(e) => {
            error!("health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "status": "unhealthy",
                    "error": e.to_string(),
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                })),
            )
        }
    }
}

// Chat

/// Main chat endpoint. Pipeline failures never surface as non-200 here:
/// degraded responses carry their error in the body. Only a missing RAG
/// system (startup failure of a required collaborator) is a 503.
pub async fn chat(
    state: State<Arc<AppState>>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<OrchestratedResponse>, HandlerError> {
    let rag = state.rag.as_ref().ok_or((
        StatusCode::SERVICE_UNAVAILABLE,
        "RAG system not available".to_string(),
    ))?;

    info!(
        "processing chat request: {}",
        payload.message.chars().take(100).collect::<String>()
    );

    let response = rag
        .process_query(&payload.message, payload.session_id)
        .await;

    Ok(Json(response))
}

pub async fn chat_history(
    state: State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<ChatHistoryResponse>, HandlerError> {
    let rag = state.rag.as_ref().ok_or((
        StatusCode::SERVICE_UNAVAILABLE,
        "RAG system not available".to_string(),
    ))?;

    let history = rag.conversation_history(&session_id, params.limit).await;

    Ok(Json(ChatHistoryResponse {
        total: history.len(),
        session_id,
        history,
    }))
}

// Data catalogue

pub async fn data_summary(
    state: State<Arc<AppState>>,
) -> Result<Json<DataSummary>, HandlerError> {
    let pool = state.db_pool.clone();

    let summary = tokio::task::spawn_blocking(move || -> Result<DataSummary, BlockingError> {
        let conn = pool.get()?;
        let count = |table: &str| -> Result<i64, BlockingError> {
            let sql = format!("SELECT COUNT(*) FROM {}", table);
            Ok(conn.query_row(&sql, [], |row| row.get(0))?)
        };

        let latest_data: Option<String> = conn.query_row(
            "SELECT CAST(MAX(profile_date) AS VARCHAR) FROM argo_profiles",
            [],
            |row| row.get(0),
        )?;

        Ok(DataSummary {
            floats: count("argo_floats")?,
            profiles: count("argo_profiles")?,
            measurements: count("argo_measurements")?,
            summaries: count("data_summaries")?,
            latest_data,
        })
    })
    .await
    .map_err(internal_error)?
    .map_err(internal_error)?;

    Ok(Json(summary))
}

pub async fn list_floats(
    state: State<Arc<AppState>>,
    Query(params): Query<PageParams>,
) -> Result<Json<serde_json::Value>, HandlerError> {
    let pool = state.db_pool.clone();
    let (limit, offset) = (params.limit, params.offset);

    let floats = tokio::task::spawn_blocking(move || -> Result<Vec<FloatRecord>, BlockingError> {
        let conn = pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT float_id, wmo_id, last_latitude, last_longitude, \
                    CAST(last_position_date AS VARCHAR), platform_type, status, \
                    has_core_data, has_bgc_data \
             FROM argo_floats \
             ORDER BY last_position_date DESC \
             LIMIT ? OFFSET ?",
        )?;

        let rows = stmt.query_map(duckdb::params![limit as i64, offset as i64], |row| {
            Ok(FloatRecord {
                float_id: row.get(0)?,
                wmo_id: row.get(1)?,
                last_latitude: row.get(2)?,
                last_longitude: row.get(3)?,
                last_position_date: row.get(4)?,
                platform_type: row.get(5)?,
                status: row.get(6)?,
                has_core_data: row.get(7)?,
                has_bgc_data: row.get(8)?,
            })
        })?;

        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    })
    .await
    .map_err(internal_error)?
    .map_err(internal_error)?;

    Ok(Json(serde_json::json!({
        "floats": floats,
        "total": floats.len(),
        "limit": limit,
        "offset": offset,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })))
}

pub async fn float_profiles(
    state: State<Arc<AppState>>,
    Path(float_id): Path<i64>,
    Query(params): Query<PageParams>,
) -> Result<Json<serde_json::Value>, HandlerError> {
    let pool = state.db_pool.clone();
    let limit = params.limit;

    let profiles =
        tokio::task::spawn_blocking(move || -> Result<Vec<ProfileRecord>, BlockingError> {
            let conn = pool.get()?;
            let mut stmt = conn.prepare(
                "SELECT id, cycle_number, CAST(profile_date AS VARCHAR), latitude, longitude, \
                        data_mode, qc_flag \
                 FROM argo_profiles \
                 WHERE float_id = ? \
                 ORDER BY profile_date DESC \
                 LIMIT ?",
            )?;

            let rows = stmt.query_map(duckdb::params![float_id, limit as i64], |row| {
                Ok(ProfileRecord {
                    id: row.get(0)?,
                    cycle_number: row.get(1)?,
                    profile_date: row.get(2)?,
                    latitude: row.get(3)?,
                    longitude: row.get(4)?,
                    data_mode: row.get(5)?,
                    qc_flag: row.get(6)?,
                })
            })?;

            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
        .map_err(internal_error)?
        .map_err(internal_error)?;

    Ok(Json(serde_json::json!({
        "float_id": float_id,
        "profiles": profiles,
        "total": profiles.len(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })))
}

// Timeline

pub async fn timeline_data(
    state: State<Arc<AppState>>,
    Query(params): Query<TimelineParams>,
) -> Result<Json<crate::timeline::TimelineData>, HandlerError> {
    let parameter = Parameter::parse(&params.parameter)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    // Every timeline error is a client error (bad dates or parameter).
    let data = state
        .timeline
        .get_timeline_data(&params.start_date, &params.end_date, &params.region, parameter)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    Ok(Json(data))
}

pub async fn timeline_regions() -> impl IntoResponse {
    let regions: Vec<&str> = crate::timeline::TimelineService::regions()
        .iter()
        .map(|(name, _)| *name)
        .collect();
    Json(serde_json::json!({ "regions": regions }))
}

pub async fn timeline_parameters() -> impl IntoResponse {
    Json(serde_json::json!({ "parameters": ["temperature", "salinity"] }))
}

fn internal_error<E: std::fmt::Display>(e: E) -> HandlerError {
    error!("request failed: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Internal error: {}", e),
    )
}
