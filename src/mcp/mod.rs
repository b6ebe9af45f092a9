// src/mcp/mod.rs
// Capability-negotiated JSON-RPC 2.0 tool/resource serving surface
// (SPEC_FULL §4.H-§4.L).

pub mod facade;
pub mod progress;
pub mod registry;
pub mod schema;
pub mod session;
pub mod stream;

pub use facade::{InvocationState, McpFacade, NegotiationResult, ToolOutcome};
pub use progress::{CancelToken, ProgressReporter};
pub use registry::{ChunkStream, ResourceDefinition, ResourceImpl, ToolContext, ToolDefinition, ToolImpl, ToolRegistry};
pub use session::{Session, SessionStore, BASIC_CAPABILITY};
pub use stream::{NdjsonFrames, NDJSON_MIME_TYPE};
