//! REST API server for the banking widget engine
//!
//! Exposes widget queries, widget refresh and usage analytics via HTTP.
//! Free-form caller ids map to stable UUIDs so the same caller always
//! lands on the same data.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use uuid::Uuid;

use crate::analytics::{AnalyticsLog, ToolUsageRecord, UsageStatus};
use crate::models::QueryConfig;
use crate::widgets::{DataMode, Widget, WidgetService};

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct AdHocQueryRequest {
    pub user_id: String,
    pub query_config: QueryConfig,
}

#[derive(Debug, Deserialize)]
pub struct CreateWidgetRequest {
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    #[serde(default = "default_widget_type")]
    pub widget_type: String,
    #[serde(default)]
    pub config: serde_json::Value,
    #[serde(default)]
    pub data_mode: DataMode,
    pub query_config: Option<QueryConfig>,
}

fn default_widget_type() -> String {
    "chart".to_string()
}

#[derive(Debug, Deserialize)]
pub struct UserScopedRequest {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ListWidgetsParams {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct LogUsageRequest {
    pub session_id: String,
    pub user_id: String,
    pub trace_id: Option<String>,
    pub agent_name: String,
    pub task_type: String,
    pub tool_name: Option<String>,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub tokens_used: u64,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SummaryParams {
    pub user_id: Option<String>,
    pub agent: Option<String>,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub widgets: Arc<WidgetService>,
    pub analytics: Arc<AnalyticsLog>,
}

/// =============================
/// Helpers: Caller Id Mapping
/// =============================

fn stable_uuid_from_string(input: &str) -> Uuid {
    use sha2::{Digest, Sha256};

    let hash = Sha256::digest(input.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash[..16]);

    // Set UUID version (4) and variant (RFC4122) bits.
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    Uuid::from_bytes(bytes)
}

/// Accept either a real UUID or any opaque caller string ("user_5").
fn caller_uuid(value: &str) -> Uuid {
    Uuid::parse_str(value).unwrap_or_else(|_| stable_uuid_from_string(value))
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Widget Endpoints
/// =============================

async fn run_query(
    State(state): State<ApiState>,
    Json(req): Json<AdHocQueryRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let user_id = caller_uuid(&req.user_id);

    match state.widgets.engine().execute(&req.query_config, user_id).await {
        Ok(rows) => (StatusCode::OK, Json(ApiResponse::success(rows))),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!("Query failed: {}", e))),
        ),
    }
}

async fn create_widget(
    State(state): State<ApiState>,
    Json(req): Json<CreateWidgetRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let user_id = caller_uuid(&req.user_id);
    info!(title = %req.title, "Creating widget");

    let mut widget = Widget::new(
        user_id,
        &req.title,
        &req.widget_type,
        req.config,
        req.data_mode,
        req.query_config,
    );
    widget.description = req.description;

    match state.widgets.create(widget).await {
        Ok(created) => (StatusCode::CREATED, Json(ApiResponse::success(created))),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(format!("Widget creation failed: {}", e))),
        ),
    }
}

async fn list_widgets(
    State(state): State<ApiState>,
    Query(params): Query<ListWidgetsParams>,
) -> (StatusCode, Json<ApiResponse>) {
    let user_id = caller_uuid(&params.user_id);

    match state.widgets.store().list_for_user(user_id).await {
        Ok(widgets) => (StatusCode::OK, Json(ApiResponse::success(widgets))),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!("Widget listing failed: {}", e))),
        ),
    }
}

async fn refresh_widget(
    State(state): State<ApiState>,
    Path(widget_id): Path<Uuid>,
    Json(req): Json<UserScopedRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let user_id = caller_uuid(&req.user_id);

    match state.widgets.refresh(widget_id, user_id).await {
        Ok(widget) => (StatusCode::OK, Json(ApiResponse::success(widget))),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(format!("Widget refresh failed: {}", e))),
        ),
    }
}

async fn delete_widget(
    State(state): State<ApiState>,
    Path(widget_id): Path<Uuid>,
    Json(req): Json<UserScopedRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let user_id = caller_uuid(&req.user_id);

    match state.widgets.delete(widget_id, user_id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({
                "deleted": widget_id,
            }))),
        ),
        Err(e) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!("Widget deletion failed: {}", e))),
        ),
    }
}

/// =============================
/// Analytics Endpoints
/// =============================

async fn log_usage(
    State(state): State<ApiState>,
    Json(req): Json<LogUsageRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let status = match req.status.as_deref() {
        Some(value) if value.eq_ignore_ascii_case("errored") => UsageStatus::Errored,
        _ => UsageStatus::Healthy,
    };

    let record = ToolUsageRecord {
        usage_id: Uuid::new_v4(),
        session_id: caller_uuid(&req.session_id),
        user_id: caller_uuid(&req.user_id),
        trace_id: req
            .trace_id
            .as_deref()
            .map(caller_uuid)
            .unwrap_or_else(Uuid::new_v4),
        agent_name: req.agent_name,
        task_type: req.task_type,
        tool_name: req.tool_name,
        duration_ms: req.duration_ms,
        tokens_used: req.tokens_used,
        status,
        created_at: chrono::Utc::now(),
    };

    match state.analytics.record(record).await {
        Ok(usage_id) => (
            StatusCode::CREATED,
            Json(ApiResponse::success(serde_json::json!({
                "usage_id": usage_id,
            }))),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!("Usage logging failed: {}", e))),
        ),
    }
}

async fn usage_summary(
    State(state): State<ApiState>,
    Query(params): Query<SummaryParams>,
) -> (StatusCode, Json<ApiResponse>) {
    let user_id = params.user_id.as_deref().map(caller_uuid);

    match state
        .analytics
        .usage_summary(user_id, params.agent.as_deref())
        .await
    {
        Ok(summary) => {
            let total_rows = summary.len();
            (
                StatusCode::OK,
                Json(ApiResponse::success(serde_json::json!({
                    "summary": summary,
                    "total_rows": total_rows,
                }))),
            )
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!("Summary failed: {}", e))),
        ),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(widgets: Arc<WidgetService>, analytics: Arc<AnalyticsLog>) -> Router {
    let state = ApiState { widgets, analytics };

    Router::new()
        .route("/health", get(health))
        .route("/api/widgets/query", post(run_query))
        .route("/api/widgets", post(create_widget).get(list_widgets))
        .route("/api/widgets/:id", delete(delete_widget))
        .route("/api/widgets/:id/refresh", post(refresh_widget))
        .route("/api/analytics/usage", post(log_usage))
        .route("/api/analytics/summary", get(usage_summary))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    widgets: Arc<WidgetService>,
    analytics: Arc<AnalyticsLog>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(widgets, analytics);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
