//! API interaction layer: typed errors, streaming, retry, and cost tracking.
//!
//! These modules handle everything between the
//! [`Harness`](crate::agent::harness::Harness) loop and the chat completions
//! endpoint:
//!
//! - [`error`]: [`ApiError`] and its transient/permanent split.
//! - [`retry`]: exponential backoff with jitter for transient failures.
//! - [`streaming`]: SSE parser for incremental text and tool-call deltas,
//!   producing [`ChunkEvent`](streaming::ChunkEvent) values.
//! - [`tracing`]: correlation IDs, per-model pricing, and a cumulative
//!   [`CostTracker`].

pub mod error;
pub mod retry;
pub mod streaming;
pub mod tracing;

pub use error::ApiError;
pub use retry::{RetryConfig, retry_api_call};
pub use tracing::{CostTracker, generate_span_id, generate_trace_id, pricing_for_model};
