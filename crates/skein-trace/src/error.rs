//! Error types for span payload handling.

/// Errors produced while encoding or decoding the span payload.
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    /// Payload was not valid JSON of the expected span-list shape
    #[error("malformed span payload: {0}")]
    Payload(#[from] serde_json::Error),
}
