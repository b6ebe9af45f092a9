// src/mcp/registry.rs
// Tool/Resource Registry (SPEC_FULL §4.H). Grounded in the orphaned
// `mcp/router.rs`'s dispatch table and `mcp/mod.rs`'s `#[tool(description =
// ...)]` macro-derived tool list, translated from `rmcp`'s compile-time
// macro registration to a hand-rolled runtime map, since this crate's tools
// are registered with data-driven schemas rather than derived from Rust
// types.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_stream::Stream;

use crate::error::{AppError, Result};
use crate::mcp::progress::{CancelToken, ProgressReporter};
use crate::mcp::schema;

pub type ChunkStream = std::pin::Pin<Box<dyn Stream<Item = Result<Value>> + Send>>;

/// Per-invocation context handed to a tool implementation. `auth_context` is
/// opaque to the core (SPEC_FULL non-goals: no auth policy lives here) and
/// is passed through unexamined from the `executeTool` envelope.
#[derive(Clone)]
pub struct ToolContext {
    pub progress: ProgressReporter,
    pub cancel: CancelToken,
    pub auth_context: Option<Value>,
}

impl ToolContext {
    pub fn new(progress: ProgressReporter, cancel: CancelToken) -> Self {
        Self { progress, cancel, auth_context: None }
    }

    pub fn with_auth_context(mut self, auth_context: Option<Value>) -> Self {
        self.auth_context = auth_context;
        self
    }
}

/// A tool's executable behavior. Unary tools only implement `call`;
/// streaming tools additionally implement `call_streaming` and are invoked
/// through the streaming path when the caller requests it.
#[async_trait]
pub trait ToolImpl: Send + Sync {
    async fn call(&self, input: Value, ctx: ToolContext) -> Result<Value>;

    fn supports_streaming(&self) -> bool {
        false
    }

    async fn call_streaming(&self, _input: Value, _ctx: ToolContext) -> Result<ChunkStream> {
        Err(AppError::internal("tool does not support streaming"))
    }
}

pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub output_schema: Option<Value>,
    pub tags: HashSet<String>,
    pub version: String,
    pub implementation: Arc<dyn ToolImpl>,
}

/// A resource's executable behavior: fetch by optional id plus query params.
#[async_trait]
pub trait ResourceImpl: Send + Sync {
    async fn get(&self, id: Option<String>, params: Value, ctx: ToolContext) -> Result<Value>;
}

pub struct ResourceDefinition {
    pub name: String,
    pub description: String,
    pub implementation: Arc<dyn ResourceImpl>,
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: std::sync::RwLock<HashMap<String, ToolDefinition>>,
    resources: std::sync::RwLock<HashMap<String, ResourceDefinition>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_tool(&self, def: ToolDefinition) -> Result<()> {
        let mut tools = self.tools.write().expect("tool registry lock poisoned");
        if tools.contains_key(&def.name) {
            return Err(AppError::ConfigInvalid(format!("tool '{}' already registered", def.name)));
        }
        tools.insert(def.name.clone(), def);
        Ok(())
    }

    pub fn unregister_tool(&self, name: &str) -> bool {
        self.tools.write().expect("tool registry lock poisoned").remove(name).is_some()
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.read().expect("tool registry lock poisoned").contains_key(name)
    }

    pub fn list_tools(&self, tag: Option<&str>) -> Vec<(String, String)> {
        self.tools
            .read()
            .expect("tool registry lock poisoned")
            .values()
            .filter(|t| tag.is_none_or(|tag| t.tags.contains(tag)))
            .map(|t| (t.name.clone(), t.description.clone()))
            .collect()
    }

    pub fn list_tags(&self) -> Vec<String> {
        let tools = self.tools.read().expect("tool registry lock poisoned");
        let mut tags: HashSet<String> = HashSet::new();
        for t in tools.values() {
            tags.extend(t.tags.iter().cloned());
        }
        let mut tags: Vec<String> = tags.into_iter().collect();
        tags.sort();
        tags
    }

    pub fn register_resource(&self, def: ResourceDefinition) -> Result<()> {
        let mut resources = self.resources.write().expect("resource registry lock poisoned");
        if resources.contains_key(&def.name) {
            return Err(AppError::ConfigInvalid(format!("resource '{}' already registered", def.name)));
        }
        resources.insert(def.name.clone(), def);
        Ok(())
    }

    pub fn has_resource(&self, name: &str) -> bool {
        self.resources.read().expect("resource registry lock poisoned").contains_key(name)
    }

    pub fn list_resources(&self) -> Vec<(String, String)> {
        self.resources
            .read()
            .expect("resource registry lock poisoned")
            .values()
            .map(|r| (r.name.clone(), r.description.clone()))
            .collect()
    }

    /// Validate `input` against the tool's input schema, invoke it, then
    /// validate the result against its output schema (if declared). Any
    /// panic-worthy or propagated error from the implementation is wrapped
    /// as `ToolExecutionFailed` so a misbehaving tool can never surface a
    /// raw, unmapped error to the wire.
    pub async fn execute(&self, name: &str, input: Value, ctx: ToolContext) -> Result<Value> {
        let def = self.lookup_tool(name)?;

        schema::validate(&input, &def.input_schema)
            .map_err(|reason| AppError::ToolInvalidInput { tool: name.to_string(), reason })?;

        let output = def
            .implementation
            .call(input, ctx)
            .await
            .map_err(|e| AppError::ToolExecutionFailed { tool: name.to_string(), reason: e.to_string() })?;

        if let Some(output_schema) = &def.output_schema {
            schema::validate(&output, output_schema)
                .map_err(|reason| AppError::ToolInvalidOutput { tool: name.to_string(), reason })?;
        }

        Ok(output)
    }

    pub async fn execute_streaming(&self, name: &str, input: Value, ctx: ToolContext) -> Result<ChunkStream> {
        let def = self.lookup_tool(name)?;
        if !def.implementation.supports_streaming() {
            return Err(AppError::ToolExecutionFailed {
                tool: name.to_string(),
                reason: "tool does not support streaming".into(),
            });
        }
        schema::validate(&input, &def.input_schema)
            .map_err(|reason| AppError::ToolInvalidInput { tool: name.to_string(), reason })?;

        def.implementation
            .call_streaming(input, ctx)
            .await
            .map_err(|e| AppError::ToolExecutionFailed { tool: name.to_string(), reason: e.to_string() })
    }

    pub async fn get_resource(&self, name: &str, id: Option<String>, params: Value, ctx: ToolContext) -> Result<Value> {
        let implementation = {
            let resources = self.resources.read().expect("resource registry lock poisoned");
            let def = resources
                .get(name)
                .ok_or_else(|| AppError::ResourceNotFound(name.to_string()))?;
            def.implementation.clone()
        };
        implementation.get(id, params, ctx).await
    }

    fn lookup_tool(&self, name: &str) -> Result<Arc<ToolDefinitionSnapshot>> {
        let tools = self.tools.read().expect("tool registry lock poisoned");
        let def = tools.get(name).ok_or_else(|| AppError::ToolNotFound(name.to_string()))?;
        Ok(Arc::new(ToolDefinitionSnapshot {
            input_schema: def.input_schema.clone(),
            output_schema: def.output_schema.clone(),
            implementation: def.implementation.clone(),
        }))
    }
}

/// A cloned-out snapshot of the pieces of a [`ToolDefinition`] `execute`
/// needs, so the registry's read lock isn't held across the `.await`.
struct ToolDefinitionSnapshot {
    input_schema: Value,
    output_schema: Option<Value>,
    implementation: Arc<dyn ToolImpl>,
}

#[async_trait]
impl ToolImpl for ToolDefinitionSnapshot {
    async fn call(&self, input: Value, ctx: ToolContext) -> Result<Value> {
        self.implementation.call(input, ctx).await
    }
    fn supports_streaming(&self) -> bool {
        self.implementation.supports_streaming()
    }
    async fn call_streaming(&self, input: Value, ctx: ToolContext) -> Result<ChunkStream> {
        self.implementation.call_streaming(input, ctx).await
    }
}
