/// Error type returned by this crate.
///
/// The retry engine never surfaces these directly: every outcome of
/// [`crate::run`] is a [`crate::FetchResult`]. Errors show up from transports,
/// configuration, payload decoding and [`crate::FetchResult::into_result`].
#[derive(Debug, thiserror::Error)]
pub enum ColdStartError {
    /// Network or request execution error from `reqwest`.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    /// A single attempt did not complete within its timeout.
    #[error("Request timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
    /// Response body could not be read or decoded.
    #[error("decode error: {0}")]
    Decode(String),
    /// Retry options violate their invariants.
    #[error("invalid retry options: {0}")]
    InvalidOptions(String),
    /// Caller input rejected before any request was sent.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Environment-based configuration is missing or malformed.
    #[error("configuration error: {0}")]
    Config(String),
    /// The caller cancelled the request.
    #[error("Request was cancelled")]
    Cancelled,
    /// The retry budget ran out before the backend answered.
    #[error("backend timed out: {0}")]
    BudgetExhausted(String),
    /// The backend rejected the request or could not be reached.
    #[error("backend unreachable: {0}")]
    Unreachable(String),
}
