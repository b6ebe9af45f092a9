// src/mcp/stream.rs
// NDJSON Streaming Response Pipeline (SPEC_FULL §4.K). Grounded in the
// teacher's `web/mcp_http.rs` SSE-over-axum response building (`Sse::new`,
// `KeepAlive`), generalized from server-sent events to newline-delimited
// JSON frames with explicit back-pressure and cancellation, since the spec
// calls for NDJSON rather than SSE as the wire framing.

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Bytes;
use futures::Stream;
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::mcp::progress::CancelToken;
use crate::mcp::registry::ChunkStream;

pub const NDJSON_MIME_TYPE: &str = "application/x-ndjson";

/// Wraps a tool's chunk stream, re-using the original request id to frame
/// each chunk as a full JSON-RPC 2.0 response object (`{"jsonrpc":"2.0",
/// "id":..,"result":..}\n`) per SPEC_FULL §4.K, and stopping early once the
/// invocation's cancellation token fires. Cancellation is a clean close: no
/// further lines are emitted, not even an error frame. A source error, by
/// contrast, does end with one final JSON-RPC error line.
pub struct NdjsonFrames {
    inner: ChunkStream,
    cancel: CancelToken,
    request_id: Value,
    finished: bool,
}

impl NdjsonFrames {
    pub fn new(inner: ChunkStream, cancel: CancelToken, request_id: Value) -> Self {
        Self { inner, cancel, request_id, finished: false }
    }

    fn encode_line(value: &Value) -> Bytes {
        let mut line = serde_json::to_vec(value).unwrap_or_else(|_| b"{}".to_vec());
        line.push(b'\n');
        Bytes::from(line)
    }

    fn encode_result_line(&self, chunk: Value) -> Bytes {
        Self::encode_line(&crate::rpc::encode_success(&self.request_id, chunk))
    }

    fn encode_error_line(&self, err: &AppError) -> Bytes {
        Self::encode_line(&crate::rpc::encode_error(&self.request_id, err))
    }
}

impl Stream for NdjsonFrames {
    type Item = Result<Bytes>;

    /// Back-pressure falls straight out of pull-based `Stream` polling:
    /// a chunk isn't produced (and the underlying tool isn't driven
    /// forward) until the consumer polls again, which axum only does once
    /// the previous frame has actually been written to the socket.
    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }

        if self.cancel.is_cancelled() {
            self.finished = true;
            return Poll::Ready(None);
        }

        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(value))) => Poll::Ready(Some(Ok(self.encode_result_line(value)))),
            Poll::Ready(Some(Err(err))) => {
                self.finished = true;
                Poll::Ready(Some(Ok(self.encode_error_line(&err))))
            }
            Poll::Ready(None) => {
                self.finished = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
