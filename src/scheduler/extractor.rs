// src/scheduler/extractor.rs
// The "extractor" port (SPEC_FULL §1): an external collaborator that performs
// the actual work for one changed path. The scheduler only knows this trait;
// the real analysis/indexing logic lives outside this crate's scope.

use async_trait::async_trait;

use super::change::FileChange;
use crate::error::Result;

/// Opaque per-path work function. Implementations are provided by the
/// embedding application; the worker pool treats every error uniformly
/// (isolated, reported, never propagated to other items).
#[async_trait]
pub trait ChangeExtractor: Send + Sync {
    /// Handle a created/modified/renamed change. `contents` is the file's
    /// current bytes, read by the worker pool before this call.
    async fn extract(&self, change: &FileChange, contents: &[u8]) -> Result<()>;

    /// Handle a deleted change (no file contents to read). Default is a
    /// no-op for extractors that don't track per-path metadata.
    async fn on_delete(&self, _change: &FileChange) -> Result<()> {
        Ok(())
    }
}
