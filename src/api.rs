//! REST API server for the financial agent service
//!
//! Thin transport layer over AgentService: routing, status mapping and
//! response envelopes only. No decision logic lives here.

use axum::{
    extract::{Path, State},
    http::{HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use crate::config::Settings;
use crate::error::AgentError;
use crate::models::AgentType;
use crate::service::AgentService;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub agent_type: Option<AgentType>,
    #[serde(default)]
    pub conversation_id: Option<Uuid>,
    #[serde(default)]
    pub context: Option<serde_json::Value>,
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
    pub service: Arc<AgentService>,
    pub settings: Settings,
}

/// Stable status mapping for the error taxonomy
fn error_status(error: &AgentError) -> StatusCode {
    match error {
        AgentError::ConversationNotFound(_) => StatusCode::NOT_FOUND,
        AgentError::InvalidRequest(_)
        | AgentError::InvalidPeriod(_)
        | AgentError::InvalidToolInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AgentError::AgentUnavailable(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn failure(error: AgentError) -> (StatusCode, Json<ApiResponse>) {
    (error_status(&error), Json(ApiResponse::error(error.to_string())))
}

/// =============================
/// Health Endpoints
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "financial-agent-api",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn agents_health(State(state): State<ApiState>) -> Json<serde_json::Value> {
    let statuses = state.service.agent_statuses().await;
    let all_healthy = !statuses.is_empty() && statuses.iter().all(|status| status.is_available);

    let agents: serde_json::Map<String, serde_json::Value> = statuses
        .iter()
        .map(|status| {
            (
                status.agent_type.to_string(),
                serde_json::json!(status.is_available),
            )
        })
        .collect();

    Json(serde_json::json!({
        "status": if all_healthy { "healthy" } else { "degraded" },
        "agents": agents,
    }))
}

/// =============================
/// Agent Endpoints
/// =============================

async fn chat(
    State(state): State<ApiState>,
    Json(req): Json<ChatRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    info!(
        agent_type = %req.agent_type.unwrap_or(AgentType::FinancialManager),
        "Processing chat request"
    );

    match state
        .service
        .send_message(req.conversation_id, &req.message, req.context)
        .await
    {
        Ok(outcome) => (StatusCode::OK, Json(ApiResponse::success(outcome))),
        Err(e) => failure(e),
    }
}

async fn create_conversation(State(state): State<ApiState>) -> (StatusCode, Json<ApiResponse>) {
    let conversation_id = state.service.create_conversation().await;
    (
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({
            "conversation_id": conversation_id,
        }))),
    )
}

async fn get_conversation(
    State(state): State<ApiState>,
    Path(conversation_id): Path<Uuid>,
) -> (StatusCode, Json<ApiResponse>) {
    match state.service.get_conversation(conversation_id).await {
        Ok(session) => (StatusCode::OK, Json(ApiResponse::success(session))),
        Err(e) => failure(e),
    }
}

async fn agent_status(State(state): State<ApiState>) -> (StatusCode, Json<ApiResponse>) {
    let statuses = state.service.agent_statuses().await;
    (StatusCode::OK, Json(ApiResponse::success(statuses)))
}

async fn probe_agent(
    State(state): State<ApiState>,
    Path(agent_type): Path<AgentType>,
) -> (StatusCode, Json<ApiResponse>) {
    let status = state.service.probe_health(agent_type).await;
    (StatusCode::OK, Json(ApiResponse::success(status)))
}

/// =============================
/// Service Metadata
/// =============================

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "Financial Agent API is running",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn service_info(State(state): State<ApiState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "app_name": state.settings.app_name,
        "environment": state.settings.environment,
        "available_agents": [AgentType::FinancialManager.to_string()],
    }))
}

/// =============================
/// Router
/// =============================

pub fn create_router(service: Arc<AgentService>, settings: Settings) -> Router {
    let origins: Vec<HeaderValue> = settings
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any);

    let state = ApiState { service, settings };

    Router::new()
        .route("/", get(root))
        .route("/info", get(service_info))
        .route("/health", get(health))
        .route("/health/agents", get(agents_health))
        .route("/api/v1/agents/chat", post(chat))
        .route("/api/v1/agents/conversations", post(create_conversation))
        .route(
            "/api/v1/agents/conversations/:conversation_id",
            get(get_conversation),
        )
        .route("/api/v1/agents/status", get(agent_status))
        .route("/api/v1/agents/status/:agent_type/probe", post(probe_agent))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    service: Arc<AgentService>,
    settings: Settings,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let port = settings.api_port;
    let router = create_router(service, settings);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            error_status(&AgentError::ConversationNotFound(Uuid::new_v4())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            error_status(&AgentError::InvalidPeriod("decade".to_string())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            error_status(&AgentError::AgentUnavailable("down".to_string())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            error_status(&AgentError::UnknownTool("x".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_chat_request_deserializes_with_defaults() {
        let req: ChatRequest =
            serde_json::from_str(r#"{"message": "Analyze AAPL"}"#).unwrap();
        assert_eq!(req.message, "Analyze AAPL");
        assert!(req.conversation_id.is_none());
        assert!(req.context.is_none());
        assert!(req.agent_type.is_none());
    }
}
