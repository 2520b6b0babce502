//! Error types for the Aiven provider.
//!
//! There are three layers:
//!
//! - [`ApiError`]: a single failed call against the Aiven API.
//! - [`WaitError`]: a terminal failure of a poll loop.
//! - [`ProviderError`]: what a resource handler reports back to its caller.

use std::time::Duration;

use thiserror::Error;

/// Errors returned by an [`AivenApi`](crate::client::AivenApi) implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The requested entity does not exist (HTTP 404).
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Authentication or authorization failure (HTTP 401/403).
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The entity already exists (HTTP 409).
    #[error("Resource already exists: {0}")]
    Conflict(String),

    /// The API is temporarily unable to serve the request (HTTP 429/5xx).
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// The request never produced an HTTP response.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Any other non-success response.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message reported by the API.
        message: String,
    },

    /// The response body could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),
}

impl ApiError {
    /// Build an error from an HTTP status code and the API's message.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            404 => Self::NotFound(message),
            401 | 403 => Self::PermissionDenied(message),
            409 => Self::Conflict(message),
            429 | 500..=599 => Self::Unavailable(message),
            _ => Self::Api { status, message },
        }
    }

    /// Whether this error means the entity is gone.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether this error means the entity already exists.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Whether polling may continue after this error.
    ///
    /// Network failures and overloaded/unavailable responses are transient;
    /// everything else is treated as fatal by the poll loop.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Transport(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::Decode(err.to_string());
        }
        match err.status() {
            Some(status) => Self::from_status(status.as_u16(), err.to_string()),
            None => Self::Transport(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Terminal failures of a poll loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaitError {
    /// A non-retryable API failure; polling stopped immediately.
    #[error("unable to wait for {what}: {source}")]
    Fatal {
        /// The awaited entity.
        what: String,
        /// The API failure.
        #[source]
        source: ApiError,
    },

    /// The deadline passed (or the wait was cancelled) while still pending.
    #[error("{}", timeout_message(.what, .timeout, .last_status, .last_error, .cancelled))]
    Timeout {
        /// The awaited entity.
        what: String,
        /// The configured deadline.
        timeout: Duration,
        /// Last status label observed, if any poll succeeded.
        last_status: Option<String>,
        /// Last retryable fetch failure, if any.
        last_error: Option<ApiError>,
        /// Set when the wait was aborted by cancellation rather than expiry.
        cancelled: bool,
    },

    /// The remote entity reported a status outside the pending and target sets.
    #[error("unexpected state '{status}' while waiting for {what}, expected one of: {expected}")]
    UnexpectedState {
        /// The awaited entity.
        what: String,
        /// The offending wire label.
        status: String,
        /// Pending and target labels, comma separated.
        expected: String,
    },

    /// The wait configuration violates its invariants.
    #[error("invalid wait configuration: {0}")]
    InvalidConfig(String),
}

impl WaitError {
    /// Whether the loop gave up because of its deadline or cancellation.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

fn timeout_message(
    what: &str,
    timeout: &Duration,
    last_status: &Option<String>,
    last_error: &Option<ApiError>,
    cancelled: &bool,
) -> String {
    let mut msg = if *cancelled {
        format!("wait for {what} was cancelled")
    } else {
        format!("timeout while waiting for {what} after {timeout:?}")
    };
    if let Some(status) = last_status {
        msg.push_str(&format!(", last state: {status}"));
    }
    if let Some(err) = last_error {
        msg.push_str(&format!(", last error: {err}"));
    }
    msg
}

/// Errors that can occur in a resource handler.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested resource was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A validation error occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Resource already exists (create conflict).
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// Permission denied (authentication/authorization failure).
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Service temporarily unavailable.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Operation timed out.
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// Operation failed due to current state (precondition not met).
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// Any other API failure.
    #[error("API error: {0}")]
    Api(String),
}

impl ProviderError {
    /// Get the error message as a string.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(msg) => msg,
            Self::Validation(msg) => msg,
            Self::Configuration(msg) => msg,
            Self::UnknownResource(msg) => msg,
            Self::Serialization(_err) => "serialization error (see Debug output)",
            Self::AlreadyExists(msg) => msg,
            Self::PermissionDenied(msg) => msg,
            Self::Unavailable(msg) => msg,
            Self::DeadlineExceeded(msg) => msg,
            Self::FailedPrecondition(msg) => msg,
            Self::Api(msg) => msg,
        }
    }
}

impl From<ApiError> for ProviderError {
    fn from(err: ApiError) -> Self {
        let msg = err.to_string();
        match err {
            ApiError::NotFound(_) => Self::NotFound(msg),
            ApiError::PermissionDenied(_) => Self::PermissionDenied(msg),
            ApiError::Conflict(_) => Self::AlreadyExists(msg),
            ApiError::Unavailable(_) | ApiError::Transport(_) => Self::Unavailable(msg),
            ApiError::Api { .. } | ApiError::Decode(_) => Self::Api(msg),
        }
    }
}

impl From<WaitError> for ProviderError {
    fn from(err: WaitError) -> Self {
        let msg = err.to_string();
        match err {
            WaitError::Fatal { source, .. } => match ProviderError::from(source) {
                Self::NotFound(_) => Self::NotFound(msg),
                Self::PermissionDenied(_) => Self::PermissionDenied(msg),
                _ => Self::Api(msg),
            },
            WaitError::Timeout { .. } => Self::DeadlineExceeded(msg),
            WaitError::UnexpectedState { .. } => Self::FailedPrecondition(msg),
            WaitError::InvalidConfig(_) => Self::Configuration(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_from_status() {
        assert!(ApiError::from_status(404, "gone").is_not_found());
        assert!(matches!(
            ApiError::from_status(403, "nope"),
            ApiError::PermissionDenied(_)
        ));
        assert!(ApiError::from_status(409, "exists").is_conflict());
        assert!(ApiError::from_status(503, "busy").is_retryable());
        assert!(ApiError::from_status(429, "slow down").is_retryable());
        assert_eq!(
            ApiError::from_status(400, "bad"),
            ApiError::Api {
                status: 400,
                message: "bad".to_string()
            }
        );
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ApiError::Transport("reset".to_string()).is_retryable());
        assert!(!ApiError::NotFound("x".to_string()).is_retryable());
        assert!(!ApiError::PermissionDenied("x".to_string()).is_retryable());
        assert!(!ApiError::Decode("x".to_string()).is_retryable());
    }

    #[test]
    fn test_timeout_display() {
        let err = WaitError::Timeout {
            what: "service my-project/pg".to_string(),
            timeout: Duration::from_secs(60),
            last_status: Some("REBUILDING".to_string()),
            last_error: None,
            cancelled: false,
        };
        assert_eq!(
            err.to_string(),
            "timeout while waiting for service my-project/pg after 60s, last state: REBUILDING"
        );

        let err = WaitError::Timeout {
            what: "topic p/s/t".to_string(),
            timeout: Duration::from_secs(5),
            last_status: None,
            last_error: Some(ApiError::Unavailable("busy".to_string())),
            cancelled: true,
        };
        assert_eq!(
            err.to_string(),
            "wait for topic p/s/t was cancelled, last error: Service unavailable: busy"
        );
    }

    #[test]
    fn test_unexpected_state_display() {
        let err = WaitError::UnexpectedState {
            what: "static ip p/ip-1".to_string(),
            status: "deleting".to_string(),
            expected: "creating, waiting, created".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "unexpected state 'deleting' while waiting for static ip p/ip-1, expected one of: creating, waiting, created"
        );
    }

    #[test]
    fn test_provider_error_from_api_error() {
        let err: ProviderError = ApiError::NotFound("topic".to_string()).into();
        assert!(matches!(err, ProviderError::NotFound(_)));

        let err: ProviderError = ApiError::Conflict("topic".to_string()).into();
        assert!(matches!(err, ProviderError::AlreadyExists(_)));

        let err: ProviderError = ApiError::Transport("reset".to_string()).into();
        assert!(matches!(err, ProviderError::Unavailable(_)));
    }

    #[test]
    fn test_provider_error_from_wait_error() {
        let err: ProviderError = WaitError::Timeout {
            what: "x".to_string(),
            timeout: Duration::from_secs(1),
            last_status: None,
            last_error: None,
            cancelled: false,
        }
        .into();
        assert!(matches!(err, ProviderError::DeadlineExceeded(_)));

        let err: ProviderError = WaitError::UnexpectedState {
            what: "x".to_string(),
            status: "POWEROFF".to_string(),
            expected: "RUNNING".to_string(),
        }
        .into();
        assert!(matches!(err, ProviderError::FailedPrecondition(_)));

        let err: ProviderError = WaitError::Fatal {
            what: "x".to_string(),
            source: ApiError::PermissionDenied("token".to_string()),
        }
        .into();
        assert!(matches!(err, ProviderError::PermissionDenied(_)));
    }

    #[test]
    fn test_message_method() {
        let err = ProviderError::NotFound("resource-123".to_string());
        assert_eq!(err.message(), "resource-123");

        let err = ProviderError::Configuration("invalid config".to_string());
        assert_eq!(err.message(), "invalid config");
    }
}
