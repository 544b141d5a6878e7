use replica_api::error::CodecError;
use replica_api::protocol::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server refused the request.
    #[error("{kind:?} (HTTP {status}): {message}")]
    Rejected { status: u16, kind: ErrorCode, message: String },

    /// The reply does not have the shape the interface descriptor promises.
    #[error("decode error: {0}")]
    Decode(CodecError),

    #[error("method '{0}' is not in the interface")]
    UnknownMethod(String),

    #[error("invalid arguments for '{method}': {error}")]
    Arguments { method: String, error: CodecError },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    pub fn is_decode(&self) -> bool {
        matches!(self, ClientError::Decode(_))
    }

    /// Server-side error category, if the server answered with one.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ClientError::Rejected { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Add context to the error.
    pub fn with_context(self, ctx: impl std::fmt::Display) -> Self {
        match self {
            ClientError::Rejected { status, kind, message } => {
                ClientError::Rejected { status, kind, message: format!("{ctx}: {message}") }
            }
            other => other,
        }
    }
}
