//! Client error types.

use std::fmt;

use dbconn_pool::BoxError;
use thiserror::Error;

use crate::context::CancelCause;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while establishing, using or releasing a client.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The configuration is invalid. Never retried.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The connection could not be established, used or released.
    #[error("connection failed: {reason}: {source}")]
    ConnectionFailed {
        /// What went wrong.
        reason: FailureReason,
        /// The underlying error.
        #[source]
        source: BoxError,
    },
}

/// Why a [`Error::ConnectionFailed`] was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum FailureReason {
    /// Every allowed attempt failed.
    RetriesExhausted {
        /// Attempts made.
        attempts: u32,
    },
    /// The caller's context ended while waiting to retry.
    Cancelled {
        /// Attempts made before cancellation.
        attempts: u32,
        /// Whether the context was cancelled or ran past its deadline.
        cause: CancelCause,
    },
    /// The pool rejected a limit change.
    PoolConfiguration,
    /// The database could not be reached.
    Unreachable,
    /// The pool could not be released cleanly.
    Release,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RetriesExhausted { attempts } => {
                write!(f, "gave up after {attempts} attempts")
            }
            Self::Cancelled { attempts, cause } => {
                write!(f, "{cause} after {attempts} attempts")
            }
            Self::PoolConfiguration => f.write_str("failed to configure pool"),
            Self::Unreachable => f.write_str("database unreachable"),
            Self::Release => f.write_str("failed to release pool"),
        }
    }
}

impl Error {
    pub(crate) fn connection_failed(
        reason: FailureReason,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::ConnectionFailed {
            reason,
            source: source.into(),
        }
    }

    /// The failure reason, if this is a connection failure.
    #[must_use]
    pub fn reason(&self) -> Option<FailureReason> {
        match self {
            Self::ConnectionFailed { reason, .. } => Some(*reason),
            Self::InvalidConfig(_) => None,
        }
    }

    /// Number of connection attempts made, when known.
    #[must_use]
    pub fn attempts(&self) -> Option<u32> {
        match self.reason()? {
            FailureReason::RetriesExhausted { attempts }
            | FailureReason::Cancelled { attempts, .. } => Some(attempts),
            _ => None,
        }
    }

    /// Why the caller's context ended, if it did.
    ///
    /// Also finds a [`CancelCause`] wrapped as the source of another failure,
    /// such as a ping interrupted by its context.
    #[must_use]
    pub fn cancel_cause(&self) -> Option<CancelCause> {
        match self {
            Self::ConnectionFailed {
                reason: FailureReason::Cancelled { cause, .. },
                ..
            } => Some(*cause),
            Self::ConnectionFailed { source, .. } => source.downcast_ref::<CancelCause>().copied(),
            Self::InvalidConfig(_) => None,
        }
    }

    /// Whether this is a configuration error.
    #[must_use]
    pub fn is_invalid_config(&self) -> bool {
        matches!(self, Self::InvalidConfig(_))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::error::Error as _;

    use dbconn_pool::PoolError;

    use super::*;

    #[test]
    fn test_display_wraps_source() {
        let err = Error::connection_failed(
            FailureReason::RetriesExhausted { attempts: 3 },
            PoolError::Connect("connection refused".into()),
        );
        assert_eq!(
            err.to_string(),
            "connection failed: gave up after 3 attempts: failed to open connection: connection refused"
        );
        assert_eq!(err.attempts(), Some(3));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_cancel_cause_from_reason() {
        let err = Error::connection_failed(
            FailureReason::Cancelled {
                attempts: 1,
                cause: CancelCause::DeadlineExceeded,
            },
            PoolError::PoolClosed,
        );
        assert_eq!(err.cancel_cause(), Some(CancelCause::DeadlineExceeded));
        assert_eq!(err.attempts(), Some(1));
        assert!(err.to_string().contains("context deadline exceeded after 1 attempts"));
    }

    #[test]
    fn test_cancel_cause_from_source() {
        let err = Error::connection_failed(FailureReason::Unreachable, CancelCause::Cancelled);
        assert_eq!(err.cancel_cause(), Some(CancelCause::Cancelled));
        assert_eq!(err.attempts(), None);
    }

    #[test]
    fn test_invalid_config() {
        let err = Error::InvalidConfig("host is required".into());
        assert!(err.is_invalid_config());
        assert_eq!(err.reason(), None);
        assert_eq!(err.to_string(), "invalid configuration: host is required");
    }
}
