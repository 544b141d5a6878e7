use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use replica_api::protocol::{ErrorBody, ErrorCode};
use replica_engine::ReplicaError;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("config error: {0}")]
    Config(String),

    #[error("bind {addr}: {message}")]
    Bind { addr: String, message: String },

    #[error("serve: {0}")]
    Serve(String),

    #[error("instance not found: {0}")]
    InstanceNotFound(u64),

    #[error("instance limit of {0} reached")]
    Capacity(usize),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Replica(#[from] ReplicaError),
}

impl ServerError {
    /// Add context to the error.
    pub fn with_context(self, ctx: impl std::fmt::Display) -> Self {
        match self {
            ServerError::Config(msg) => ServerError::Config(format!("{ctx}: {msg}")),
            ServerError::Replica(e) => ServerError::Replica(e.with_context(ctx)),
            other => other,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            ServerError::Config(_) | ServerError::BadRequest(_) => ErrorCode::BadRequest,
            ServerError::Bind { .. } | ServerError::Serve(_) => ErrorCode::Internal,
            ServerError::InstanceNotFound(_) => ErrorCode::NotFound,
            ServerError::Capacity(_) => ErrorCode::Capacity,
            ServerError::Replica(e) => e.code(),
        }
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        ServerError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ServerError {
    fn from(rejection: PathRejection) -> Self {
        ServerError::BadRequest(rejection.body_text())
    }
}

fn status_of(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::BadRequest | ErrorCode::InvalidModule | ErrorCode::Decode => StatusCode::BAD_REQUEST,
        ErrorCode::InstallRejected | ErrorCode::UpgradeRejected | ErrorCode::CallRejected => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ErrorCode::Capacity => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let kind = self.code();
        let body = ErrorBody { kind, message: self.to_string() };
        (status_of(kind), axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_codes_to_statuses() {
        assert_eq!(status_of(ServerError::InstanceNotFound(3).code()), StatusCode::NOT_FOUND);
        assert_eq!(status_of(ServerError::Capacity(1).code()), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            status_of(ServerError::Replica(ReplicaError::Install("x".into())).code()),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
