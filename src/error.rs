use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Could not connect or the request could not be sent.
    Connection,
    /// The backend answered with a non-2xx status.
    Status,
    /// The body was not JSON, or not the shape the endpoint promises.
    MalformedBody,
    /// A caller-imposed deadline expired.
    Timeout,
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Connection => "connection",
            Self::Status => "status",
            Self::MalformedBody => "malformed body",
            Self::Timeout => "timeout",
        };
        f.write_str(label)
    }
}

/// A failed round trip to the agent backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind} error: {detail}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub detail: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn connection(detail: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Connection, detail)
    }

    pub fn status(detail: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Status, detail)
    }

    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::MalformedBody, detail)
    }

    pub fn timeout(detail: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, detail)
    }
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("input cannot be empty")]
    EmptyInput,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("config error: {0}")]
    Config(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Rejects empty and whitespace-only input before anything is dispatched.
pub fn require_text(text: &str) -> Result<&str, ValidationError> {
    if text.trim().is_empty() {
        return Err(ValidationError::EmptyInput);
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_display_includes_kind_and_detail() {
        let err = TransportError::status("502 Bad Gateway");
        assert_eq!(err.to_string(), "status error: 502 Bad Gateway");

        let err = TransportError::timeout("after 5s");
        assert_eq!(err.to_string(), "timeout error: after 5s");
    }

    #[test]
    fn require_text_rejects_blank_input() {
        assert_eq!(require_text(""), Err(ValidationError::EmptyInput));
        assert_eq!(require_text("   \t\n"), Err(ValidationError::EmptyInput));
        assert_eq!(require_text(" hi "), Ok(" hi "));
    }

    #[test]
    fn client_error_wraps_both_taxonomies() {
        let err: ClientError = ValidationError::EmptyInput.into();
        assert_eq!(err.to_string(), "input cannot be empty");

        let err: ClientError = TransportError::connection("refused").into();
        assert!(matches!(err, ClientError::Transport(_)));
        assert_eq!(err.to_string(), "connection error: refused");
    }
}
