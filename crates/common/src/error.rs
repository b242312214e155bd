//! Error types for the oVirt client.
//!
//! Callers should branch on [`ErrorKind`] (via [`Error::kind`] or
//! [`Error::has_kind`]) rather than on message text.

use std::fmt;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A caller-supplied value failed local validation.
    BadArgument,
    /// A remote response lacked a field the local model requires.
    FieldMissing,
    /// The targeted resource does not exist.
    NotFound,
    /// An internal invariant was violated.
    Bug,
    /// The remote endpoint could not be reached or failed transiently.
    Connection,
    /// The remote rejected the call because of a concurrent operation.
    Conflict,
    /// The credentials were rejected or lack permissions.
    PermissionDenied,
    /// The operation has not reached its desired state yet.
    Pending,
    /// A retry or polling budget was exhausted.
    Timeout,
    /// The operation was cancelled by the caller.
    Cancelled,
    /// Invalid or unreadable configuration.
    Config,
}

impl ErrorKind {
    /// Whether errors of this kind are worth another attempt.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::Connection | ErrorKind::Conflict | ErrorKind::Pending
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::BadArgument => "bad argument",
            ErrorKind::FieldMissing => "field missing",
            ErrorKind::NotFound => "not found",
            ErrorKind::Bug => "bug",
            ErrorKind::Connection => "connection",
            ErrorKind::Conflict => "conflict",
            ErrorKind::PermissionDenied => "permission denied",
            ErrorKind::Pending => "pending",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Config => "config",
        };
        f.write_str(name)
    }
}

/// Main error type for the oVirt client.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid caller input, detected before any network call.
    #[error("bad argument: {0}")]
    BadArgument(String),

    /// A mandatory field was absent from a remote object.
    #[error("{field} field missing from {object} object")]
    FieldMissing {
        /// Object (path) that was being converted
        object: &'static str,
        /// Name of the missing field
        field: &'static str,
    },

    /// The resource does not exist on the remote side.
    #[error("not found: {0}")]
    NotFound(String),

    /// Internal error (unexpected condition or malformed remote data).
    #[error("internal bug: {message}")]
    Bug {
        /// What went wrong
        message: String,
        /// Underlying cause, if any
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Transport failure or server-side error.
    #[error("connection error: {0}")]
    Connection(String),

    /// The remote is busy with a related operation.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Authentication or authorization failure.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The desired state has not been reached yet.
    #[error("pending: {0}")]
    Pending(String),

    /// A status poll ran out of budget before the target status appeared.
    #[error(
        "timed out waiting for {resource} to reach status {target} after {attempts} attempts (last observed: {})",
        .last_observed.as_deref().unwrap_or("none")
    )]
    StatusTimeout {
        /// Resource being polled, e.g. `VM 1234`
        resource: String,
        /// Status that was waited for
        target: String,
        /// Last status reported by the remote
        last_observed: Option<String>,
        /// Number of fetch attempts made
        attempts: u32,
    },

    /// A retryable error persisted until the retry budget ran out.
    #[error("{action}: giving up after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Description of the operation
        action: String,
        /// Number of attempts made
        attempts: u32,
        /// The error of the final attempt
        #[source]
        last: Box<Error>,
    },

    /// Cancelled through a cancellation token.
    #[error("{0}: cancelled")]
    Cancelled(String),

    /// Invalid configuration provided.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a bad-argument error.
    pub fn bad_argument(message: impl Into<String>) -> Self {
        Error::BadArgument(message.into())
    }

    /// Create a field-missing error.
    pub fn field_missing(object: &'static str, field: &'static str) -> Self {
        Error::FieldMissing { object, field }
    }

    /// Create a bug error without an underlying cause.
    pub fn bug(message: impl Into<String>) -> Self {
        Error::Bug {
            message: message.into(),
            source: None,
        }
    }

    /// Create a bug error wrapping an underlying cause.
    pub fn bug_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Error::Bug {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::BadArgument(_) => ErrorKind::BadArgument,
            Error::FieldMissing { .. } => ErrorKind::FieldMissing,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Bug { .. } | Error::Serialization(_) => ErrorKind::Bug,
            Error::Connection(_) => ErrorKind::Connection,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Error::Pending(_) => ErrorKind::Pending,
            Error::StatusTimeout { .. } | Error::RetriesExhausted { .. } => ErrorKind::Timeout,
            Error::Cancelled(_) => ErrorKind::Cancelled,
            Error::Config(_) => ErrorKind::Config,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// Check if this error indicates a not-found condition.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Check whether this error, or the last cause of an exhausted retry,
    /// has the given kind.
    pub fn has_kind(&self, kind: ErrorKind) -> bool {
        if self.kind() == kind {
            return true;
        }
        match self {
            Error::RetriesExhausted { last, .. } => last.has_kind(kind),
            _ => false,
        }
    }

    /// The last status observed before a status poll timed out.
    pub fn last_observed_status(&self) -> Option<&str> {
        match self {
            Error::StatusTimeout { last_observed, .. } => last_observed.as_deref(),
            _ => None,
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

/// Extension helpers for results of removal calls.
pub trait ResultExt {
    /// Treat a not-found error as success.
    fn ignore_not_found(self) -> Result<()>;
}

impl ResultExt for Result<()> {
    fn ignore_not_found(self) -> Result<()> {
        match self {
            Err(err) if err.is_not_found() => Ok(()),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::field_missing("VM", "id");
        assert_eq!(err.to_string(), "id field missing from VM object");

        let err = Error::StatusTimeout {
            resource: "VM vm-1".to_string(),
            target: "up".to_string(),
            last_observed: Some("powering_up".to_string()),
            attempts: 3,
        };
        assert_eq!(
            err.to_string(),
            "timed out waiting for VM vm-1 to reach status up after 3 attempts (last observed: powering_up)"
        );
    }

    #[test]
    fn test_ignore_not_found() {
        let missing: Result<()> = Err(Error::NotFound("vm-1".to_string()));
        assert!(missing.ignore_not_found().is_ok());

        let busy: Result<()> = Err(Error::Conflict("busy".to_string()));
        assert!(busy.ignore_not_found().is_err());
    }

    #[test]
    fn test_is_retryable() {
        assert!(Error::Connection("reset".to_string()).is_retryable());
        assert!(Error::Conflict("busy".to_string()).is_retryable());
        assert!(Error::Pending("not yet".to_string()).is_retryable());
        assert!(!Error::bad_argument("bad").is_retryable());
        assert!(!Error::field_missing("VM", "id").is_retryable());
        assert!(!Error::bug("oops").is_retryable());
        assert!(!Error::NotFound("vm".to_string()).is_retryable());
    }

    #[test]
    fn test_is_not_found() {
        assert!(Error::NotFound("vm".to_string()).is_not_found());
        assert!(!Error::bug("test").is_not_found());
    }

    #[test]
    fn test_has_kind_looks_through_exhausted_retries() {
        let err = Error::RetriesExhausted {
            action: "fetching VM vm-1".to_string(),
            attempts: 3,
            last: Box::new(Error::Connection("refused".to_string())),
        };
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(err.has_kind(ErrorKind::Timeout));
        assert!(err.has_kind(ErrorKind::Connection));
        assert!(!err.has_kind(ErrorKind::NotFound));
    }

    #[test]
    fn test_bug_keeps_source() {
        let parse_err = "abc".parse::<u64>().unwrap_err();
        let err = Error::bug_with_source("failed to parse hugepages", parse_err);
        assert_eq!(err.kind(), ErrorKind::Bug);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_last_observed_status() {
        let err = Error::StatusTimeout {
            resource: "VM vm-1".to_string(),
            target: "up".to_string(),
            last_observed: None,
            attempts: 1,
        };
        assert_eq!(err.last_observed_status(), None);
        assert!(err.to_string().ends_with("(last observed: none)"));
    }
}
