// src/error.rs
// Flat error taxonomy shared by every layer: component kernel, scheduler,
// JSON-RPC core, tool registry, session store.

use serde_json::Value;
use thiserror::Error;

/// Every error kind the core can raise, plus a stable mapping onto the
/// JSON-RPC/MCP wire codes in [`AppError::rpc_code`].
#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("component '{name}' depends on '{dep}' which is not registered")]
    ComponentMissingDep { name: String, dep: String },

    #[error("component dependency cycle among: {0:?}")]
    ComponentCycle(Vec<String>),

    #[error("component '{name}' failed to initialize: {reason}")]
    ComponentInitFailed { name: String, reason: String },

    #[error("queue is closed")]
    QueueClosed,

    #[error("worker panicked: {0}")]
    WorkerPanic(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("tool '{0}' not found")]
    ToolNotFound(String),

    #[error("invalid input for tool '{tool}': {reason}")]
    ToolInvalidInput { tool: String, reason: String },

    #[error("invalid output from tool '{tool}': {reason}")]
    ToolInvalidOutput { tool: String, reason: String },

    #[error("tool '{tool}' execution failed: {reason}")]
    ToolExecutionFailed { tool: String, reason: String },

    #[error("session expired")]
    SessionExpired,

    #[error("capability '{0}' is not supported by this session")]
    CapabilityUnsupported(String),

    #[error("failed to parse request: {0}")]
    ProtocolParseError(String),

    #[error("invalid request: {0}")]
    ProtocolInvalidRequest(String),

    #[error("method '{0}' not found")]
    ProtocolMethodNotFound(String),

    #[error("invalid params: {0}")]
    ProtocolInvalidParams(String),

    #[error("resource '{0}' not found")]
    ResourceNotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("internal error: {0}")]
    InternalError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Stable JSON-RPC / MCP error code for this kind. See SPEC_FULL §6.
    pub fn rpc_code(&self) -> i64 {
        match self {
            AppError::ProtocolParseError(_) | AppError::Json(_) => -32700,
            AppError::ProtocolInvalidRequest(_) => -32600,
            AppError::ProtocolMethodNotFound(_) | AppError::ToolNotFound(_) => -32601,
            AppError::ProtocolInvalidParams(_) | AppError::ToolInvalidInput { .. } => -32602,
            AppError::ToolExecutionFailed { .. } => 32000,
            AppError::ResourceNotFound(_) => 32001,
            AppError::Unauthorized(_) => 32002,
            AppError::DeadlineExceeded => 32003,
            AppError::Cancelled => 32004,
            _ => -32603,
        }
    }

    /// Extra structured detail to attach to a JSON-RPC error's `data` field.
    /// Most kinds carry none; a handful expose machine-readable context.
    pub fn rpc_data(&self) -> Option<Value> {
        match self {
            AppError::ComponentMissingDep { name, dep } => {
                Some(serde_json::json!({ "component": name, "missing_dep": dep }))
            }
            AppError::ComponentCycle(names) => Some(serde_json::json!({ "cycle": names })),
            AppError::ToolInvalidInput { tool, .. } => Some(serde_json::json!({ "tool": tool })),
            AppError::ToolInvalidOutput { tool, .. } => Some(serde_json::json!({ "tool": tool })),
            AppError::ToolExecutionFailed { tool, .. } => Some(serde_json::json!({ "tool": tool })),
            _ => None,
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::InternalError(msg.into())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_cancelled() {
            AppError::Cancelled
        } else if err.is_panic() {
            AppError::WorkerPanic(err.to_string())
        } else {
            AppError::InternalError(err.to_string())
        }
    }
}

impl From<String> for AppError {
    fn from(s: String) -> Self {
        AppError::InternalError(s)
    }
}
