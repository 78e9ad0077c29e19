//! Error types for the Tellerbot domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Tellerbot operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Inbound validation ---
    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] ValidationError),

    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Cache / store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Client input that fails validation before reaching the core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("message must not be empty")]
    EmptyMessage,

    #[error("message is {length} characters, the limit is {max}")]
    MessageTooLong { length: usize, max: usize },

    #[error("conversation id '{0}' must be 1-64 characters of [A-Za-z0-9_-]")]
    InvalidConversationId(String),
}

/// Classified failures of the completion endpoint.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Connection failure or timeout.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// 4xx: bad request, auth, quota.
    #[error("Upstream rejected the request (status: {status}): {message}")]
    UpstreamRejected { status: u16, message: String },

    /// 5xx from the provider.
    #[error("Upstream error (status: {status}): {message}")]
    UpstreamError { status: u16, message: String },

    /// 2xx with a body we could not understand.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    /// Transient failures the caller may retry with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::UpstreamUnavailable(_) | Self::UpstreamError { .. }
        )
    }

    /// Short machine-readable tag, used in logs and API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::UpstreamRejected { .. } => "upstream_rejected",
            Self::UpstreamError { .. } => "upstream_error",
            Self::MalformedResponse(_) => "malformed_response",
            Self::NotConfigured(_) => "not_configured",
        }
    }
}

/// Failures of the key-value cache or the conversation store.
///
/// These never reach an API caller: the cache fails open and
/// conversation persistence is best-effort.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Backend timed out after {0}ms")]
    Timeout(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::UpstreamError {
            status: 503,
            message: "Service Unavailable".into(),
        });
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("Service Unavailable"));
    }

    #[test]
    fn only_transient_errors_are_retryable() {
        assert!(ProviderError::UpstreamUnavailable("timeout".into()).is_retryable());
        assert!(
            ProviderError::UpstreamError {
                status: 500,
                message: String::new()
            }
            .is_retryable()
        );
        assert!(
            !ProviderError::UpstreamRejected {
                status: 401,
                message: String::new()
            }
            .is_retryable()
        );
        assert!(!ProviderError::MalformedResponse("no choices".into()).is_retryable());
    }

    #[test]
    fn validation_error_converts_to_invalid_request() {
        let err: Error = ValidationError::EmptyMessage.into();
        assert!(matches!(err, Error::InvalidRequest(_)));
        assert!(err.to_string().contains("empty"));
    }
}
