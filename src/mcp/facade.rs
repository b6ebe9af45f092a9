// src/mcp/facade.rs
// Tool-invocation Facade (SPEC_FULL §4.L): the single entry point gluing
// session resolution, tool lookup, input validation, cancellation-token
// creation, and unary-vs-streaming dispatch together. Grounded in the
// teacher's `mcp/router.rs` dispatch function, which performs the same
// "resolve connection, look up handler, invoke" sequence for its fixed set
// of `rmcp`-derived tools.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::error::{AppError, Result};
use crate::mcp::progress::{CancelToken, ProgressReporter};
use crate::mcp::registry::{ChunkStream, ToolContext, ToolRegistry};
use crate::mcp::session::{Session, SessionStore, BASIC_CAPABILITY};

/// Tracks one invocation's lifecycle. Streaming invocations pass through
/// every state; unary invocations skip straight from `Init` to `Done` or
/// `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    Init,
    Streaming,
    Closing,
    Done,
    Error,
}

pub enum ToolOutcome {
    Unary(serde_json::Value),
    Streaming(ChunkStream, CancelToken),
}

/// Response shape for the dedicated capability-negotiation method
/// (SPEC_FULL §4.I): echoes the server's identity and capabilities plus
/// everything a client could subsequently call.
pub struct NegotiationResult {
    pub session: Session,
    pub server_name: String,
    pub server_version: String,
    pub supported_capabilities: Vec<String>,
    pub available_tools: Vec<(String, String)>,
    pub available_resources: Vec<(String, String)>,
}

pub struct McpFacade {
    registry: Arc<ToolRegistry>,
    sessions: Arc<SessionStore>,
    server_name: String,
    server_version: String,
}

impl McpFacade {
    pub fn new(registry: Arc<ToolRegistry>, sessions: Arc<SessionStore>) -> Self {
        Self {
            registry,
            sessions,
            server_name: env!("CARGO_PKG_NAME").to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Handle the capability-negotiation handshake (SPEC_FULL §4.I): create
    /// a session whose capabilities are the intersection of what the client
    /// declared and what this server supports, and report back everything
    /// the client can now do with it.
    pub fn negotiate(
        &self,
        client_name: impl Into<String>,
        client_version: impl Into<String>,
        requested_capabilities: &[String],
        auth_context: Option<serde_json::Value>,
    ) -> NegotiationResult {
        let session = self.sessions.create_session(client_name, client_version, requested_capabilities, auth_context, Utc::now());
        NegotiationResult {
            session,
            server_name: self.server_name.clone(),
            server_version: self.server_version.clone(),
            supported_capabilities: self.sessions.supported_capabilities().iter().cloned().collect(),
            available_tools: self.registry.list_tools(None),
            available_resources: self.registry.list_resources(),
        }
    }

    /// Resolve `session_id` (anonymous sessions are allowed: both a
    /// completely omitted id and one that is unknown or has expired fall
    /// back to an anonymous, `{basic}`-capability session rather than
    /// rejecting the call), validate input against the tool's schema, and
    /// run it. `want_stream`
    /// routes to the streaming path only when the caller asked for it, the
    /// tool supports it, AND the resolved session's negotiated capabilities
    /// include `streaming` (SPEC_FULL §4.L step 5) — a caller without that
    /// capability always gets a unary result, even against a streaming tool.
    /// Progress and cancellation tokens handed to the tool impl are
    /// similarly gated on `progress_tracking`/`cancellation` (step 4): a
    /// session that didn't negotiate them gets an inert token rather than
    /// one wired to this invocation's real deadline/cancel machinery.
    pub async fn execute_tool(
        &self,
        session_id: Option<&str>,
        tool_name: &str,
        input: serde_json::Value,
        want_stream: bool,
        deadline: Option<Duration>,
        auth_context: Option<serde_json::Value>,
    ) -> Result<ToolOutcome> {
        let mut state = InvocationState::Init;

        // An unknown or expired id behaves the same as an omitted one: the
        // call proceeds as an anonymous, `{basic}`-capability session rather
        // than failing outright.
        let session: Option<Session> = match session_id {
            Some(id) => match self.sessions.touch(id, Utc::now()) {
                Ok(session) => Some(session),
                Err(AppError::SessionExpired) => None,
                Err(e) => return Err(e),
            },
            None => None,
        };

        if !self.registry.has_tool(tool_name) {
            return Err(AppError::ToolNotFound(tool_name.to_string()));
        }

        let capabilities: HashSet<String> = session
            .as_ref()
            .map(|s| s.capabilities.clone())
            .unwrap_or_else(|| [BASIC_CAPABILITY.to_string()].into_iter().collect());

        // `cancel` is the server-side deadline/streaming-closure mechanism:
        // it always exists and always responds to the deadline regardless
        // of negotiated capabilities (SPEC_FULL §6: "deadline elapsed ...
        // the in-flight tool is signaled via cancellation" is unconditional).
        let cancel = CancelToken::new();
        // What the tool itself is handed is gated: a session that never
        // negotiated `cancellation` gets a token of its own that nothing
        // ever signals, so it cannot observe this invocation's real
        // cancel/deadline state.
        let tool_cancel = if capabilities.contains("cancellation") { cancel.clone() } else { CancelToken::new() };
        // No live progress sink is wired in this transport yet, so every
        // invocation gets a silent reporter regardless of capability; a
        // session that never negotiated `progress_tracking` is already
        // getting the "nil" behaviour the capability gate would enforce.
        let ctx = ToolContext::new(ProgressReporter::silent(), tool_cancel).with_auth_context(auth_context);

        // An optional deadline triggers the same cancellation token a caller
        // could trigger by hand; the guard task is harmless to leave running
        // past a unary reply since `cancel()` on an already-finished
        // invocation is a no-op.
        let _deadline_guard = deadline.map(|d| spawn_deadline_guard(cancel.clone(), d));

        if want_stream && capabilities.contains("streaming") {
            match self.registry.execute_streaming(tool_name, input.clone(), ctx.clone()).await {
                Ok(stream) => {
                    state = InvocationState::Streaming;
                    info!(tool = tool_name, ?state, "tool invocation streaming");
                    return Ok(ToolOutcome::Streaming(stream, cancel));
                }
                Err(AppError::ToolExecutionFailed { reason, .. }) if reason.contains("does not support streaming") => {
                    // Fall through to the unary path below.
                }
                Err(e) => {
                    state = InvocationState::Error;
                    warn!(tool = tool_name, ?state, error = %e, "streaming invocation failed");
                    return Err(e);
                }
            }
        }

        let result = if let Some(d) = deadline {
            tokio::select! {
                biased;
                _ = tokio::time::sleep(d) => {
                    cancel.cancel();
                    Err(AppError::DeadlineExceeded)
                }
                result = self.registry.execute(tool_name, input, ctx) => result,
            }
        } else {
            self.registry.execute(tool_name, input, ctx).await
        };

        state = if result.is_ok() { InvocationState::Done } else { InvocationState::Error };
        info!(tool = tool_name, ?state, "tool invocation finished");
        result.map(ToolOutcome::Unary)
    }

    /// Fetch a resource on behalf of a session, applying the same
    /// anonymous-session-allowed resolution as `execute_tool`: an unknown or
    /// expired id falls back to an anonymous session rather than an error.
    pub async fn get_resource(
        &self,
        session_id: Option<&str>,
        resource_name: &str,
        id: Option<String>,
        params: serde_json::Value,
    ) -> Result<serde_json::Value> {
        if let Some(sid) = session_id {
            match self.sessions.touch(sid, Utc::now()) {
                Ok(_) | Err(AppError::SessionExpired) => {}
                Err(e) => return Err(e),
            }
        }
        let ctx = ToolContext::new(ProgressReporter::silent(), CancelToken::new());
        self.registry.get_resource(resource_name, id, params, ctx).await
    }

    /// Signal cancellation for an in-flight streaming invocation. The
    /// caller holds the `CancelToken` returned from `execute_tool`; this
    /// helper exists for symmetry with the `Closing` state transition and
    /// documents the expected sequence: `cancel()` then drain remaining
    /// frames (the stream itself emits the terminal error frame).
    pub fn cancel_invocation(cancel: &CancelToken) -> InvocationState {
        cancel.cancel();
        InvocationState::Closing
    }

    pub fn session_reaper_interval() -> Duration {
        Duration::from_secs(60)
    }
}

/// Fires `cancel()` once `deadline` elapses. Runs detached so a streaming
/// invocation keeps being watched after `execute_tool` has already returned
/// the stream to its caller.
fn spawn_deadline_guard(cancel: CancelToken, deadline: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(deadline).await;
        cancel.cancel();
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::registry::{ToolContext as Ctx, ToolDefinition, ToolImpl};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashSet;

    struct Echo;

    #[async_trait]
    impl ToolImpl for Echo {
        async fn call(&self, input: serde_json::Value, _ctx: Ctx) -> Result<serde_json::Value> {
            Ok(input)
        }
    }

    fn facade() -> McpFacade {
        let registry = Arc::new(ToolRegistry::new());
        registry
            .register_tool(ToolDefinition {
                name: "echo".into(),
                description: "".into(),
                input_schema: json!({}),
                output_schema: None,
                tags: HashSet::new(),
                version: "1.0.0".into(),
                implementation: Arc::new(Echo),
            })
            .unwrap();
        let sessions = Arc::new(SessionStore::new(HashSet::new(), Duration::from_secs(300)));
        McpFacade::new(registry, sessions)
    }

    #[tokio::test]
    async fn anonymous_invocation_succeeds_unary() {
        let facade = facade();
        let outcome = facade.execute_tool(None, "echo", json!({"x": 1}), false, None, None).await.unwrap();
        match outcome {
            ToolOutcome::Unary(v) => assert_eq!(v, json!({"x": 1})),
            _ => panic!("expected unary outcome"),
        }
    }

    #[tokio::test]
    async fn unknown_tool_is_rejected() {
        let facade = facade();
        let err = facade.execute_tool(None, "missing", json!({}), false, None, None).await.unwrap_err();
        assert!(matches!(err, AppError::ToolNotFound(_)));
    }

    #[tokio::test]
    async fn streaming_request_against_non_streaming_tool_falls_back_to_unary() {
        let facade = facade();
        let outcome = facade.execute_tool(None, "echo", json!({"x": 2}), true, None, None).await.unwrap();
        assert!(matches!(outcome, ToolOutcome::Unary(_)));
    }

    struct Counter;

    #[async_trait]
    impl ToolImpl for Counter {
        async fn call(&self, _input: serde_json::Value, _ctx: Ctx) -> Result<serde_json::Value> {
            Ok(json!({"n": 0}))
        }

        fn supports_streaming(&self) -> bool {
            true
        }

        async fn call_streaming(&self, _input: serde_json::Value, _ctx: Ctx) -> Result<ChunkStream> {
            let items: Vec<Result<serde_json::Value>> = vec![Ok(json!({"n": 1})), Ok(json!({"n": 2}))];
            Ok(Box::pin(tokio_stream::iter(items)))
        }
    }

    fn facade_with_streaming_tool(supported_capabilities: HashSet<String>) -> McpFacade {
        let registry = Arc::new(ToolRegistry::new());
        registry
            .register_tool(ToolDefinition {
                name: "counter".into(),
                description: "".into(),
                input_schema: json!({}),
                output_schema: None,
                tags: HashSet::new(),
                version: "1.0.0".into(),
                implementation: Arc::new(Counter),
            })
            .unwrap();
        let sessions = Arc::new(SessionStore::new(supported_capabilities, Duration::from_secs(300)));
        McpFacade::new(registry, sessions)
    }

    #[tokio::test]
    async fn streaming_requires_session_to_have_negotiated_the_capability() {
        let facade = facade_with_streaming_tool(HashSet::new());
        let session = facade.negotiate("cli", "1.0.0", &["streaming".to_string()], None);
        assert!(!session.session.has_capability("streaming"), "server doesn't support it, so it's not granted");

        let outcome = facade
            .execute_tool(Some(&session.session.id), "counter", json!({}), true, None, None)
            .await
            .unwrap();
        assert!(
            matches!(outcome, ToolOutcome::Unary(_)),
            "a session that never negotiated `streaming` must not get an NDJSON stream even against a streaming tool"
        );
    }

    #[tokio::test]
    async fn streaming_is_granted_once_the_session_negotiates_it() {
        let facade = facade_with_streaming_tool(["streaming".to_string()].into_iter().collect());
        let session = facade.negotiate("cli", "1.0.0", &["streaming".to_string()], None);
        assert!(session.session.has_capability("streaming"));

        let outcome = facade
            .execute_tool(Some(&session.session.id), "counter", json!({}), true, None, None)
            .await
            .unwrap();
        assert!(matches!(outcome, ToolOutcome::Streaming(..)));
    }

    #[tokio::test]
    async fn unknown_session_id_falls_back_to_anonymous() {
        let facade = facade();
        let outcome = facade
            .execute_tool(Some("nonexistent"), "echo", json!({"x": 1}), false, None, None)
            .await
            .unwrap();
        match outcome {
            ToolOutcome::Unary(v) => assert_eq!(v, json!({"x": 1})),
            _ => panic!("expected unary outcome"),
        }
    }

    struct Slow;

    #[async_trait]
    impl ToolImpl for Slow {
        async fn call(&self, _input: serde_json::Value, ctx: Ctx) -> Result<serde_json::Value> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            assert!(ctx.cancel.is_cancelled(), "deadline should have cancelled the token");
            Ok(serde_json::json!({}))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_elapsing_cancels_the_token_and_surfaces_deadline_exceeded() {
        let registry = Arc::new(ToolRegistry::new());
        registry
            .register_tool(ToolDefinition {
                name: "slow".into(),
                description: "".into(),
                input_schema: json!({}),
                output_schema: None,
                tags: HashSet::new(),
                version: "1.0.0".into(),
                implementation: Arc::new(Slow),
            })
            .unwrap();
        let sessions = Arc::new(SessionStore::new(HashSet::new(), Duration::from_secs(300)));
        let facade = McpFacade::new(registry, sessions);

        let err = facade
            .execute_tool(None, "slow", json!({}), false, Some(Duration::from_millis(50)), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DeadlineExceeded));
    }
}
