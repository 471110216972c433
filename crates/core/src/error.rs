//! Error types for Reva.

/// Result type alias for Reva operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Failures surfaced through a [`Promise`](crate::Promise).
///
/// Failures raised by observer callbacks are panics and never pass through
/// this type; they unwind to whichever thread triggered the delivery.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The holder abandoned interest before the result was produced.
    #[error("Cancelled: {reason}")]
    Cancelled {
        reason: String,
    },
    /// The producer reported a failure.
    #[error("Failed: {message}")]
    Failed {
        message: String,
    },
}

impl Error {
    /// Creates a cancellation error.
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Error::Cancelled {
            reason: reason.into(),
        }
    }

    /// Creates a failure error.
    pub fn failed(message: impl Into<String>) -> Self {
        Error::Failed {
            message: message.into(),
        }
    }

    /// Returns true if this error is a cancellation.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }
}
