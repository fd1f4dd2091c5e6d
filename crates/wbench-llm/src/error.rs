//! LLM transport errors.

use thiserror::Error;

/// Errors from issuing or consuming a streaming chat completion.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The underlying HTTP request failed.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The endpoint returned a non-success status.
    #[error("endpoint returned {status}: {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated for display.
        body: String,
    },

    /// A configured API key contained characters that cannot appear in an
    /// HTTP header value.
    #[error("API key contains invalid header characters")]
    InvalidApiKey,

    /// The stream ended without a terminal event.
    #[error("stream ended unexpectedly")]
    StreamTruncated,

    /// A chunk of the stream could not be decoded as UTF-8 or JSON.
    #[error("malformed stream chunk: {0}")]
    MalformedChunk(String),

    /// The call was cancelled via its abort signal.
    #[error("cancelled")]
    Cancelled,
}

/// Convenience alias used throughout this crate.
pub type LlmResult<T> = Result<T, LlmError>;
