//! Kotoba error types

use std::time::Duration;

/// Kotoba error types
///
/// Backend-level variants (`Http`, `Api`, `RateLimited`, ...) describe what a
/// single request to a provider produced. Gateway-level variants
/// (`NoBackendAvailable`, `TransientExhausted`, `PermanentRejected`) are what
/// [`invoke`](crate::gateway::invoke) hands back to the presentation layer.
#[derive(Debug, thiserror::Error)]
pub enum KotobaError {
    // Provider/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("model not found: {model}: {message}")]
    ModelNotFound { model: String, message: String },

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    // Soft errors
    #[error("empty response from model")]
    EmptyResponse,

    #[error("content filtered: {reason}")]
    ContentFiltered { reason: String },

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    // Gateway outcomes
    /// Every credential × backend probe failed.
    #[error("no backend available ({probed} candidates probed)")]
    NoBackendAvailable { probed: usize },

    /// The retry budget was consumed by transient failures.
    #[error("backend still failing after {attempts} attempts: {last_error}")]
    TransientExhausted {
        attempts: u32,
        #[source]
        last_error: Box<KotobaError>,
    },

    /// The backend refused this specific request; retrying will not help.
    #[error("request rejected: {reason}")]
    PermanentRejected {
        reason: String,
        #[source]
        source: Box<KotobaError>,
    },

    // Session errors
    #[error("no lesson loaded")]
    NoLesson,

    #[error("operation cancelled")]
    Cancelled,
}

/// The three failure kinds the presentation layer has to tell apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Nothing answered a probe: try again later.
    NoBackendAvailable,
    /// Retries ran out: wait a little, then repeat the same action.
    TransientExhausted,
    /// The backend refused the request: change the input or give up.
    PermanentRejected,
}

impl FailureKind {
    /// Short message suitable for showing to the learner.
    pub fn user_message(self) -> &'static str {
        match self {
            FailureKind::NoBackendAvailable => {
                "No model is reachable right now. Please try again later."
            }
            FailureKind::TransientExhausted => {
                "The model is busy. Wait a minute, then try the same action again."
            }
            FailureKind::PermanentRejected => {
                "The model refused this request. Check the text, image or recording and try something else."
            }
        }
    }
}

impl KotobaError {
    /// Whether a single failed request is worth repeating unchanged.
    ///
    /// Only rejections the backend reported as final are permanent: bad
    /// input, bad credentials, unknown models, content blocks and 4xx
    /// statuses other than 408, 409 and 429. Gateway outcomes and local
    /// session or configuration errors are final too. Any other failure is
    /// transient.
    pub fn is_transient(&self) -> bool {
        match self {
            KotobaError::Api { status, .. } => {
                !(400..500).contains(status) || matches!(*status, 408 | 409 | 429)
            }
            KotobaError::InvalidInput(_)
            | KotobaError::AuthenticationFailed(_)
            | KotobaError::ModelNotFound { .. }
            | KotobaError::ContentFiltered { .. }
            | KotobaError::Configuration(_) => false,
            _ if self.is_gateway_outcome() => false,
            _ => true,
        }
    }

    /// Errors produced by the gateway or session themselves rather than by a
    /// backend. They pass through the retry loop unchanged.
    pub fn is_gateway_outcome(&self) -> bool {
        matches!(
            self,
            KotobaError::NoBackendAvailable { .. }
                | KotobaError::TransientExhausted { .. }
                | KotobaError::PermanentRejected { .. }
                | KotobaError::NoLesson
                | KotobaError::Cancelled
        )
    }

    /// Provider-supplied delay hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            KotobaError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Classify a gateway outcome for display.
    ///
    /// Returns `None` for errors that never leave the gateway as one of the
    /// three outcome kinds (configuration, I/O, session misuse).
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            KotobaError::NoBackendAvailable { .. } => Some(FailureKind::NoBackendAvailable),
            KotobaError::TransientExhausted { .. } => Some(FailureKind::TransientExhausted),
            KotobaError::PermanentRejected { .. } => Some(FailureKind::PermanentRejected),
            _ => None,
        }
    }

    /// Wrap a backend error that must not be retried.
    ///
    /// The reason is the backend's own message where it gave one.
    pub(crate) fn rejected(source: KotobaError) -> Self {
        let reason = match &source {
            KotobaError::InvalidInput(message)
            | KotobaError::AuthenticationFailed(message)
            | KotobaError::Api { message, .. } => message.clone(),
            KotobaError::ModelNotFound { model, message } => format!("{model}: {message}"),
            KotobaError::ContentFiltered { reason } => format!("content filtered: {reason}"),
            other => other.to_string(),
        };
        KotobaError::PermanentRejected {
            reason,
            source: Box::new(source),
        }
    }
}

/// Result type alias for Kotoba operations
pub type Result<T> = std::result::Result<T, KotobaError>;
