// src/http/mod.rs
// HTTP transport (SPEC_FULL §4.M). Grounded in `web/mcp_http.rs`'s axum
// router setup (route table, `TraceLayer`, shared `AppState` extractor) and
// `web/state.rs`'s `Arc`-wrapped shared state pattern, narrowed from the
// teacher's full web surface (chat, search, embedded UI) down to the two
// endpoints this spec actually calls for.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;
use tower_http::trace::TraceLayer;

use crate::mcp::{McpFacade, NdjsonFrames, ToolRegistry, NDJSON_MIME_TYPE};
use crate::rpc::{self, JsonRpcRequest};
use crate::scheduler::SchedulerController;

pub struct AppState {
    pub facade: Arc<McpFacade>,
    pub registry: Arc<ToolRegistry>,
    pub scheduler: Arc<SchedulerController>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/rpc", post(handle_rpc))
        .route("/healthz", get(handle_healthz))
        .layer(TraceLayer::new_for_http())
        .layer(tower_http::timeout::TimeoutLayer::new(Duration::from_secs(30)))
        .with_state(state)
}

async fn handle_healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let status = state.scheduler.status().await;
    let pending = state.scheduler.pending_count().await;
    Json(serde_json::json!({
        "status": "ok",
        "scheduler_running": state.scheduler.is_running(),
        "pending": pending,
        "processed": status.processed,
        "failed": status.failed,
    }))
}

/// The one JSON-RPC entry point. A streaming `executeTool` call (signaled
/// by `params.streaming == true`) upgrades the response to `application/x-ndjson`;
/// anything else returns a single JSON-RPC envelope.
async fn handle_rpc(State(state): State<Arc<AppState>>, Json(raw): Json<Value>) -> Response {
    let request = match rpc::parse_request(raw) {
        Ok(request) => request,
        Err(failure) => {
            return (StatusCode::OK, Json(rpc::encode_error(&failure.id, &failure.error))).into_response();
        }
    };

    match request.method.as_str() {
        "executeTool" => handle_execute_tool(state, request).await,
        "getResource" => handle_get_resource(state, request).await,
        "listTools" => handle_list_tools(state, request),
        "negotiateCapabilities" => handle_negotiate(state, request),
        other => {
            let err = crate::error::AppError::ProtocolMethodNotFound(other.to_string());
            (StatusCode::OK, Json(rpc::encode_error(&request.id, &err))).into_response()
        }
    }
}

/// Capability negotiation (SPEC_FULL §4.I): a client declares itself and the
/// capabilities it wants; the response carries the intersected set plus
/// everything the resulting session is now entitled to call.
fn handle_negotiate(state: Arc<AppState>, request: JsonRpcRequest) -> Response {
    let params = request.params.as_object().cloned().unwrap_or_default();
    let client_name = params.get("client_name").and_then(Value::as_str).unwrap_or("unknown").to_string();
    let client_version = params.get("client_version").and_then(Value::as_str).unwrap_or("0.0.0").to_string();
    let requested: Vec<String> = params
        .get("supported_capabilities")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();
    let auth_context = params.get("auth_context").cloned();

    let result = state.facade.negotiate(client_name, client_version, &requested, auth_context);
    let tools: Vec<Value> = result
        .available_tools
        .into_iter()
        .map(|(name, description)| serde_json::json!({ "name": name, "description": description }))
        .collect();
    let resources: Vec<Value> = result
        .available_resources
        .into_iter()
        .map(|(name, description)| serde_json::json!({ "name": name, "description": description }))
        .collect();
    let body = serde_json::json!({
        "session_id": result.session.id,
        "server_name": result.server_name,
        "server_version": result.server_version,
        "supported_capabilities": result.supported_capabilities,
        "available_tools": tools,
        "available_resources": resources,
    });
    (StatusCode::OK, Json(rpc::encode_success(&request.id, body))).into_response()
}

async fn handle_execute_tool(state: Arc<AppState>, request: JsonRpcRequest) -> Response {
    let params = request.params.as_object().cloned().unwrap_or_default();
    let tool_name = match params.get("toolName").and_then(Value::as_str) {
        Some(name) => name.to_string(),
        None => {
            let err = crate::error::AppError::ProtocolInvalidParams("params.toolName is required".into());
            return (StatusCode::OK, Json(rpc::encode_error(&request.id, &err))).into_response();
        }
    };
    let input = params.get("toolInput").cloned().unwrap_or_else(|| Value::Object(Default::default()));
    let session_id = params.get("sessionId").and_then(Value::as_str).map(str::to_string);
    let want_stream = params.get("streaming").and_then(Value::as_bool).unwrap_or(false);
    let deadline = params.get("deadlineMs").and_then(Value::as_u64).map(Duration::from_millis);
    let auth_context = params.get("auth_context").cloned();

    let outcome =
        state.facade.execute_tool(session_id.as_deref(), &tool_name, input, want_stream, deadline, auth_context).await;

    match outcome {
        Ok(crate::mcp::ToolOutcome::Unary(result)) => {
            (StatusCode::OK, Json(rpc::encode_success(&request.id, result))).into_response()
        }
        Ok(crate::mcp::ToolOutcome::Streaming(stream, cancel)) => {
            let frames = NdjsonFrames::new(stream, cancel, request.id.clone());
            let body_stream = tokio_stream::StreamExt::map(frames, |item| {
                item.map_err(|e| std::io::Error::other(e.to_string()))
            });
            let mut response = Response::new(Body::from_stream(body_stream));
            response.headers_mut().insert(
                axum::http::header::CONTENT_TYPE,
                HeaderValue::from_static(NDJSON_MIME_TYPE),
            );
            response
        }
        Err(err) => (StatusCode::OK, Json(rpc::encode_error(&request.id, &err))).into_response(),
    }
}

async fn handle_get_resource(state: Arc<AppState>, request: JsonRpcRequest) -> Response {
    let params = request.params.as_object().cloned().unwrap_or_default();
    let resource_name = match params.get("resourceName").and_then(Value::as_str) {
        Some(name) => name.to_string(),
        None => {
            let err = crate::error::AppError::ProtocolInvalidParams("params.resourceName is required".into());
            return (StatusCode::OK, Json(rpc::encode_error(&request.id, &err))).into_response();
        }
    };
    let id = params.get("id").and_then(Value::as_str).map(str::to_string);
    let query = params.get("params").cloned().unwrap_or_else(|| Value::Object(Default::default()));
    let session_id = params.get("sessionId").and_then(Value::as_str).map(str::to_string);

    match state.facade.get_resource(session_id.as_deref(), &resource_name, id, query).await {
        Ok(result) => (StatusCode::OK, Json(rpc::encode_success(&request.id, result))).into_response(),
        Err(err) => (StatusCode::OK, Json(rpc::encode_error(&request.id, &err))).into_response(),
    }
}

fn handle_list_tools(state: Arc<AppState>, request: JsonRpcRequest) -> Response {
    let tag = request.params.as_object().and_then(|p| p.get("tag")).and_then(Value::as_str);
    let tools: Vec<Value> = state
        .registry
        .list_tools(tag)
        .into_iter()
        .map(|(name, description)| serde_json::json!({ "name": name, "description": description }))
        .collect();
    (StatusCode::OK, Json(rpc::encode_success(&request.id, serde_json::json!({ "tools": tools })))).into_response()
}
