//! Typed failures from the chat completions endpoint.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response (connect, TLS, body read).
    #[error("request failed: {0}")]
    Transport(String),

    /// Non-2xx status from the endpoint.
    #[error("completion API HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The response body was not the JSON we expected.
    #[error("failed to parse response: {0}")]
    Decode(String),

    /// A 2xx response carrying an `error` object.
    #[error("completion API error: {0}")]
    Api(String),
}

impl ApiError {
    /// Whether retrying the same request may succeed.
    ///
    /// Rate limits, gateway failures and transport errors are transient.
    /// Client errors (400, 401, 403, 404, 422) and decode failures are not.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Transport(_) => true,
            ApiError::Http { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            ApiError::Decode(_) | ApiError::Api(_) => false,
        }
    }
}
