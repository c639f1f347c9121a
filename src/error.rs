//! Unified error type.

use http::StatusCode;

/// The error type returned by handlers and by tsu's fallible operations.
///
/// Handlers return `Err(Error)` to signal failure. The router's error handler
/// turns it into a response; middleware sees the same value on the way out.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Binding to a port or accepting a connection failed.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// An error that carries its own response status.
    #[error("{message}")]
    Http { status: StatusCode, message: String },

    /// A second response was written for the same request.
    #[error("response already committed")]
    Committed,

    /// Any other handler failure.
    #[error("{0}")]
    Handler(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Handler error with a plain message: `Err(Error::msg("ups"))`.
    pub fn msg(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self::Handler(message.into())
    }

    /// Wraps any error value as a handler error.
    pub fn other(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Handler(Box::new(err))
    }

    /// An error rendered with `status`. The message defaults to the canonical
    /// reason phrase.
    pub fn http(status: StatusCode) -> Self {
        let message = status.canonical_reason().unwrap_or("").to_owned();
        Self::Http { status, message }
    }

    /// Replaces the message of an [`Error::Http`]; other variants are returned
    /// unchanged.
    pub fn with_message(self, message: impl Into<String>) -> Self {
        match self {
            Self::Http { status, .. } => Self::Http { status, message: message.into() },
            other => other,
        }
    }

    /// Status the default error handler responds with.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Http { status, .. } => *status,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
