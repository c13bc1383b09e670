//! Application-wide error types and the closed error-kind taxonomy.

use thiserror::Error;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// The closed taxonomy an implementation must distinguish (see spec §7).
///
/// Internal components classify into this enum and never match on raw
/// provider errors; only the classifier (`Error::kind`) looks at symptoms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    ProviderTimeout,
    ProviderUnavailable,
    ProviderProtocol,
    Cancelled,
    InternalInvariant,
}

impl ErrorKind {
    /// Whether a segment task may be retried after an error of this kind.
    pub fn retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::ProviderTimeout | ErrorKind::ProviderUnavailable
        )
    }

    /// Whether a single retry should be granted even though the kind is not
    /// generally retryable (protocol errors get exactly one extra try).
    pub fn retryable_once(self) -> bool {
        matches!(self, ErrorKind::ProviderProtocol)
    }
}

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("provider timed out: {0}")]
    ProviderTimeout(String),

    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("provider returned a malformed response: {0}")]
    ProviderProtocol(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),

    #[error("not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Map this error onto the closed taxonomy used for retry decisions and
    /// client-facing error codes.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::ProviderTimeout(_) => ErrorKind::ProviderTimeout,
            Error::ProviderUnavailable(_) => ErrorKind::ProviderUnavailable,
            Error::ProviderProtocol(_) => ErrorKind::ProviderProtocol,
            Error::Cancelled => ErrorKind::Cancelled,
            _ => ErrorKind::InternalInvariant,
        }
    }

    /// Classify a provider-layer `reqwest` failure into the closed taxonomy.
    ///
    /// This is the single place that looks at a raw external symptom
    /// (timeout, connection refused, non-2xx status, body parse failure)
    /// and maps it to a `Kind` — every other component handles kinds only.
    pub fn classify_provider_error(err: &reqwest::Error) -> ErrorKind {
        if err.is_timeout() {
            ErrorKind::ProviderTimeout
        } else if err.is_connect() {
            ErrorKind::ProviderUnavailable
        } else if err.is_decode() || err.is_body() {
            ErrorKind::ProviderProtocol
        } else if let Some(status) = err.status() {
            if status.is_server_error() || status.as_u16() == 429 {
                ErrorKind::ProviderUnavailable
            } else {
                ErrorKind::ProviderProtocol
            }
        } else {
            ErrorKind::ProviderUnavailable
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_kinds() {
        assert!(ErrorKind::ProviderTimeout.retryable());
        assert!(ErrorKind::ProviderUnavailable.retryable());
        assert!(!ErrorKind::ProviderProtocol.retryable());
        assert!(ErrorKind::ProviderProtocol.retryable_once());
        assert!(!ErrorKind::InvalidInput.retryable());
        assert!(!ErrorKind::Cancelled.retryable());
    }

    #[test]
    fn error_kind_mapping() {
        assert_eq!(Error::InvalidInput("x".into()).kind(), ErrorKind::InvalidInput);
        assert_eq!(Error::Cancelled.kind(), ErrorKind::Cancelled);
    }
}
