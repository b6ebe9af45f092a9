// src/rpc/mod.rs
// JSON-RPC 2.0 Core (SPEC_FULL §4.G). Grounded in the teacher's
// `ipc/protocol.rs` (`IpcRequest`/`IpcResponse`, line-delimited JSON,
// `success()`/`error()` constructors), generalized from Mira's custom
// `{op, id, params}` / `{id, ok, result, error}` shape to full JSON-RPC 2.0
// envelopes with the spec's stable MCP error codes (§6).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;

pub const JSONRPC_VERSION: &str = "2.0";

/// A parsed, structurally valid JSON-RPC request. Validation order matches
/// SPEC_FULL §4.G: object shape, `jsonrpc` field, non-empty `method`,
/// `params` being an object when present.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcErrorBody {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcErrorBody {
    pub fn from_app_error(err: &AppError) -> Self {
        Self { code: err.rpc_code(), message: err.to_string(), data: err.rpc_data() }
    }
}

/// Failure to even construct a [`JsonRpcRequest`]: carries whatever `id`
/// could be salvaged from the raw payload (or `null` if none could be read).
pub struct RequestParseFailure {
    pub id: Value,
    pub error: AppError,
}

/// Parse and structurally validate a raw JSON value into a request.
/// This is intentionally separate from `serde_json::from_value` so the
/// three failure modes in SPEC_FULL §4.G produce the right error kinds
/// rather than a single generic deserialization error.
pub fn parse_request(raw: Value) -> Result<JsonRpcRequest, RequestParseFailure> {
    let Value::Object(ref map) = raw else {
        return Err(RequestParseFailure {
            id: Value::Null,
            error: AppError::ProtocolInvalidRequest("request must be a JSON object".into()),
        });
    };

    let id = map.get("id").cloned().unwrap_or(Value::Null);

    let jsonrpc = map.get("jsonrpc").and_then(Value::as_str).unwrap_or_default();
    if jsonrpc != JSONRPC_VERSION {
        return Err(RequestParseFailure {
            id,
            error: AppError::ProtocolInvalidRequest(format!(
                "unsupported jsonrpc version '{jsonrpc}', expected \"2.0\""
            )),
        });
    }

    let method = match map.get("method").and_then(Value::as_str) {
        Some(m) if !m.is_empty() => m.to_string(),
        _ => {
            return Err(RequestParseFailure {
                id,
                error: AppError::ProtocolInvalidRequest("method must be a non-empty string".into()),
            });
        }
    };

    let params = match map.get("params") {
        None => Value::Object(serde_json::Map::new()),
        Some(Value::Object(o)) => Value::Object(o.clone()),
        Some(_) => {
            return Err(RequestParseFailure {
                id,
                error: AppError::ProtocolInvalidParams("params must be an object when present".into()),
            });
        }
    };

    Ok(JsonRpcRequest { jsonrpc: jsonrpc.to_string(), id, method, params })
}

/// Build a success envelope `{"jsonrpc":"2.0","id":..,"result":..}`.
pub fn encode_success(id: &Value, result: Value) -> Value {
    serde_json::json!({ "jsonrpc": JSONRPC_VERSION, "id": id, "result": result })
}

/// Build an error envelope `{"jsonrpc":"2.0","id":..,"error":{...}}`.
pub fn encode_error(id: &Value, err: &AppError) -> Value {
    let body = JsonRpcErrorBody::from_app_error(err);
    serde_json::json!({ "jsonrpc": JSONRPC_VERSION, "id": id, "error": body })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_request_parses() {
        let raw = serde_json::json!({
            "jsonrpc": "2.0", "id": 7, "method": "executeTool", "params": {"toolName": "x"}
        });
        let req = parse_request(raw).unwrap();
        assert_eq!(req.method, "executeTool");
        assert_eq!(req.id, serde_json::json!(7));
    }

    #[test]
    fn wrong_jsonrpc_version_is_invalid_request_and_preserves_id() {
        let raw = serde_json::json!({ "jsonrpc": "1.0", "id": 7, "method": "executeTool" });
        let failure = parse_request(raw).unwrap_err();
        assert_eq!(failure.id, serde_json::json!(7));
        assert!(matches!(failure.error, AppError::ProtocolInvalidRequest(_)));
        assert_eq!(failure.error.rpc_code(), -32600);
    }

    #[test]
    fn non_object_request_has_null_id() {
        let raw = serde_json::json!([1, 2, 3]);
        let failure = parse_request(raw).unwrap_err();
        assert_eq!(failure.id, Value::Null);
    }

    #[test]
    fn missing_method_is_invalid_request() {
        let raw = serde_json::json!({ "jsonrpc": "2.0", "id": 1 });
        let failure = parse_request(raw).unwrap_err();
        assert!(matches!(failure.error, AppError::ProtocolInvalidRequest(_)));
    }

    #[test]
    fn non_object_params_is_invalid_params() {
        let raw = serde_json::json!({ "jsonrpc": "2.0", "id": 1, "method": "m", "params": [1,2] });
        let failure = parse_request(raw).unwrap_err();
        assert!(matches!(failure.error, AppError::ProtocolInvalidParams(_)));
    }

    #[test]
    fn encode_success_round_trips_id() {
        let out = encode_success(&serde_json::json!("abc"), serde_json::json!({"ok": true}));
        assert_eq!(out["id"], serde_json::json!("abc"));
        assert_eq!(out["result"]["ok"], true);
    }

    #[test]
    fn encode_error_carries_stable_code() {
        let err = AppError::ToolNotFound("missing".into());
        let out = encode_error(&serde_json::json!(42), &err);
        assert_eq!(out["error"]["code"], -32601);
        assert_eq!(out["id"], serde_json::json!(42));
    }
}
