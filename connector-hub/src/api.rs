//! Connector Hub HTTP API.
//!
//! Routes:
//! - `GET /health`
//! - `GET /api/tools`: supported tools and their operations
//! - `GET /api/tools/:tool/status`: whether the caller's credential resolves
//! - `POST /api/tools/:tool/execute`: run one operation, returns the result envelope
//! - `PUT /api/tools/:tool/credentials`: store a credential bundle
//! - `DELETE /api/tools/:tool/credentials`: remove a stored credential
//!
//! The tenant comes from the `X-Tenant-Id` header; without it the request
//! uses unscoped credentials.

use crate::args::Args;
use crate::pool::{ConnectorPool, HubError};
use crate::registry::{all_tools, find_tool, ToolSpec};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use toolgate::credentials::{CredentialStore, NO_TENANT};
use toolgate::{CredentialProfile, CredentialType, ToolResult};
use tracing::{debug, info, warn};

pub const TENANT_HEADER: &str = "x-tenant-id";

/// Shared state for the API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub pool: Arc<ConnectorPool>,
    pub store: Arc<dyn CredentialStore>,
}

/// Request body for `POST /api/tools/:tool/execute`.
#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub operation: String,
    #[serde(default)]
    pub args: Map<String, Value>,
    #[serde(default)]
    pub credential_id: Option<String>,
}

/// Request body for `PUT /api/tools/:tool/credentials`.
#[derive(Debug, Deserialize)]
pub struct StoreCredentialRequest {
    #[serde(default)]
    pub credential_id: Option<String>,
    /// Defaults from the tool (`api_key` or `oauth2`)
    #[serde(default)]
    pub credential_type: Option<CredentialType>,
    pub credential_data: Map<String, Value>,
    #[serde(default)]
    pub encrypted: bool,
}

#[derive(Debug, Deserialize)]
pub struct CredentialQuery {
    #[serde(default)]
    pub credential_id: Option<String>,
}

#[derive(Serialize)]
pub struct ListToolsResponse {
    pub tools: Vec<ToolSpec>,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct ToolStatus {
    pub tool: String,
    pub configured: bool,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// ---------------------------------------------------------------------------
// Business logic (called from HTTP handlers and unit tests)
// ---------------------------------------------------------------------------

/// Tenant from the request headers; blank means unscoped.
///
/// The store's unscoped slot name is not accepted as a tenant.
pub fn tenant_from_headers(headers: &HeaderMap) -> Result<Option<String>, AppError> {
    let tenant = headers
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty());

    match tenant {
        Some(NO_TENANT) => Err(AppError::BadRequest(format!(
            "'{}' is reserved and cannot be used as a tenant id",
            NO_TENANT
        ))),
        other => Ok(other.map(str::to_string)),
    }
}

pub async fn handle_execute(
    state: &ApiState,
    tool: &str,
    tenant_id: Option<&str>,
    req: ExecuteRequest,
) -> Result<ToolResult, AppError> {
    known_tool(tool)?;
    let key = ConnectorPool::key(tool, req.credential_id.as_deref(), tenant_id);
    debug!(credential = %key, operation = %req.operation, "Execute request");

    let args = Args::new(req.args);
    Ok(state.pool.execute(&key, &req.operation, &args).await?)
}

pub fn handle_status(
    state: &ApiState,
    tool: &str,
    tenant_id: Option<&str>,
    credential_id: Option<&str>,
) -> Result<ToolStatus, AppError> {
    known_tool(tool)?;
    let key = ConnectorPool::key(tool, credential_id, tenant_id);
    let configured = match state.pool.connector(&key) {
        Ok(connector) => connector.is_configured(),
        Err(HubError::Credential(_)) => false,
        Err(e) => return Err(e.into()),
    };
    Ok(ToolStatus {
        tool: tool.to_string(),
        configured,
    })
}

/// Stores a credential and drops any pooled connector built from the old one.
pub fn handle_store_credential(
    state: &ApiState,
    tool: &str,
    tenant_id: Option<&str>,
    req: StoreCredentialRequest,
) -> Result<(), AppError> {
    let spec = known_tool(tool)?;
    if req.credential_data.is_empty() {
        return Err(AppError::BadRequest("credential_data must not be empty".into()));
    }

    let key = ConnectorPool::key(tool, req.credential_id.as_deref(), tenant_id);
    let credential_type = req.credential_type.unwrap_or(match spec.profile {
        CredentialProfile::ApiKey { .. } => CredentialType::ApiKey,
        CredentialProfile::OAuth2 { .. } | CredentialProfile::BaseUrl { .. } => {
            CredentialType::OAuth2
        }
    });

    state
        .store
        .save(&key, credential_type, &req.credential_data, req.encrypted)
        .map_err(|e| {
            warn!(credential = %key, error = %e, "Failed to store credential");
            AppError::Internal(format!("Failed to store credential: {}", e))
        })?;
    state.pool.invalidate(&key);

    info!(tool = %key.tool_name, tenant = %key.tenant_slot(), "Credential stored");
    Ok(())
}

pub fn handle_delete_credential(
    state: &ApiState,
    tool: &str,
    tenant_id: Option<&str>,
    credential_id: Option<&str>,
) -> Result<(), AppError> {
    known_tool(tool)?;
    let key = ConnectorPool::key(tool, credential_id, tenant_id);

    let deleted = state.store.delete(&key).map_err(|e| {
        warn!(credential = %key, error = %e, "Failed to delete credential");
        AppError::Internal("Failed to delete credential".into())
    })?;
    state.pool.invalidate(&key);

    if !deleted {
        return Err(AppError::NotFound(format!(
            "No credentials found for tool '{}'",
            tool
        )));
    }

    info!(tool = %key.tool_name, tenant = %key.tenant_slot(), "Credential deleted");
    Ok(())
}

fn known_tool(tool: &str) -> Result<&'static ToolSpec, AppError> {
    find_tool(tool).ok_or_else(|| AppError::NotFound(format!("Tool '{}' not found", tool)))
}

// ---------------------------------------------------------------------------
// HTTP handlers
// ---------------------------------------------------------------------------

async fn health() -> Json<Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn list_tools() -> Json<ListToolsResponse> {
    Json(ListToolsResponse {
        tools: all_tools().to_vec(),
    })
}

async fn tool_status(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Path(tool): Path<String>,
    Query(query): Query<CredentialQuery>,
) -> Result<Json<ToolStatus>, AppError> {
    let tenant = tenant_from_headers(&headers)?;
    let status = handle_status(&state, &tool, tenant.as_deref(), query.credential_id.as_deref())?;
    Ok(Json(status))
}

async fn execute(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Path(tool): Path<String>,
    Json(req): Json<ExecuteRequest>,
) -> Result<Json<ToolResult>, AppError> {
    let tenant = tenant_from_headers(&headers)?;
    let result = handle_execute(&state, &tool, tenant.as_deref(), req).await?;
    Ok(Json(result))
}

async fn store_credential(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Path(tool): Path<String>,
    Json(req): Json<StoreCredentialRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    let tenant = tenant_from_headers(&headers)?;
    handle_store_credential(&state, &tool, tenant.as_deref(), req)?;
    Ok(Json(SuccessResponse { success: true }))
}

async fn delete_credential(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Path(tool): Path<String>,
    Query(query): Query<CredentialQuery>,
) -> Result<Json<SuccessResponse>, AppError> {
    let tenant = tenant_from_headers(&headers)?;
    handle_delete_credential(&state, &tool, tenant.as_deref(), query.credential_id.as_deref())?;
    Ok(Json(SuccessResponse { success: true }))
}

// ---------------------------------------------------------------------------
// Error handling
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

impl From<HubError> for AppError {
    fn from(e: HubError) -> Self {
        match e {
            HubError::UnknownTool(tool) => AppError::NotFound(format!("Tool '{}' not found", tool)),
            HubError::Credential(inner) => AppError::Internal(inner.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/tools", get(list_tools))
        .route("/api/tools/:tool/status", get(tool_status))
        .route("/api/tools/:tool/execute", post(execute))
        .route(
            "/api/tools/:tool/credentials",
            put(store_credential).delete(delete_credential),
        )
        .with_state(Arc::new(state))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
