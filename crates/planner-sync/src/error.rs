//! Error types for the sync engine
//!
//! Provides error handling for:
//! - Remote accessor failures (fetch/update)
//! - Patch validation and application
//! - Configuration loading

/// Failure reported by a remote accessor
///
/// Flush failures of every kind are recovered by the engine; the
/// classification only drives logging and the notice text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    /// Entity does not exist on the remote store
    #[error("{kind} {id} not found")]
    NotFound {
        /// Entity kind
        kind: String,
        /// Requested id
        id: String,
    },

    /// Transport-level failure (connection reset, DNS, timeout)
    #[error("network error: {0}")]
    Network(String),

    /// Non-2xx response from the store
    #[error("remote returned status {code}: {message}")]
    Status {
        /// HTTP-like status code
        code: u16,
        /// Server-provided detail
        message: String,
    },

    /// Store refused the payload (validation on the server side)
    #[error("update rejected: {0}")]
    Rejected(String),
}

impl AccessError {
    /// Create not-found error
    #[inline]
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Create status error
    #[inline]
    pub fn status(code: u16, message: impl Into<String>) -> Self {
        Self::Status {
            code,
            message: message.into(),
        }
    }

    /// Check if a later attempt could plausibly succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Status { code, .. } => *code >= 500 || *code == 408 || *code == 429,
            Self::NotFound { .. } | Self::Rejected(_) => false,
        }
    }
}

/// Patch validation and application errors
///
/// Returned synchronously from `mutate` before anything is applied or
/// buffered. A rejected patch leaves the snapshot untouched.
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    /// Patch source was not a JSON object
    #[error("patch must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    /// Entity has no field with this name
    #[error("{kind} has no field '{field}'")]
    UnknownField {
        /// Entity kind
        kind: &'static str,
        /// Offending field
        field: String,
    },

    /// Field is owned by the server and cannot be edited locally
    #[error("{kind}.{field} is read-only")]
    ReadOnlyField {
        /// Entity kind
        kind: &'static str,
        /// Offending field
        field: String,
    },

    /// Value does not fit the field's type
    #[error("{kind}: {source}")]
    Type {
        /// Entity kind
        kind: &'static str,
        /// Underlying serde failure
        #[source]
        source: serde_json::Error,
    },

    /// Entity serialized to something other than a JSON object
    #[error("{0} does not serialize as a record")]
    NotARecord(&'static str),

    /// Record-level invariant violated after applying the patch
    #[error("invalid {kind}: {code}: {message}")]
    Invalid {
        /// Entity kind
        kind: &'static str,
        /// Stable machine-readable code
        code: &'static str,
        /// Human-readable detail
        message: String,
    },
}

impl PatchError {
    /// Create invariant violation error
    #[inline]
    pub fn invalid(kind: &'static str, code: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            kind,
            code,
            message: message.into(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML could not be parsed into a config
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Parsed values are out of range
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_error_display() {
        let err = AccessError::not_found("course", "c1");
        assert_eq!(err.to_string(), "course c1 not found");

        let err = AccessError::status(503, "unavailable");
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn access_error_is_retryable() {
        assert!(AccessError::Network("reset".to_string()).is_retryable());
        assert!(AccessError::status(502, "bad gateway").is_retryable());
        assert!(AccessError::status(429, "slow down").is_retryable());
        assert!(!AccessError::status(422, "invalid").is_retryable());
        assert!(!AccessError::not_found("program", "p1").is_retryable());
        assert!(!AccessError::Rejected("nope".to_string()).is_retryable());
    }

    #[test]
    fn patch_error_display() {
        let err = PatchError::ReadOnlyField {
            kind: "course",
            field: "id".to_string(),
        };
        assert_eq!(err.to_string(), "course.id is read-only");

        let err = PatchError::invalid("semester", "INVALID_SEMESTER_DATE_RANGE", "start after end");
        assert!(err.to_string().contains("INVALID_SEMESTER_DATE_RANGE"));
    }
}
