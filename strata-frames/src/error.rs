//! Error types for the response-flattening engine

/// Errors surfaced to callers of the transform entry points.
///
/// Everything else the engine encounters (response/definition drift, missing
/// metric values, unresolvable alias tokens) is absorbed locally as a skip,
/// gap, or placeholder and never becomes an error.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A target's response slot carried an `error` object. Aborts the whole
    /// batch; `payload` holds the serialized raw error for diagnostics.
    #[error("Upstream query error: {message}")]
    Upstream { message: String, payload: String },

    /// The response body could not be deserialized into the typed shell.
    #[error("Malformed response body: {0}")]
    MalformedResponse(String),
}
