use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("tenant not found: {0}")]
    TenantNotFound(String),
    #[error("authentication failed")]
    AuthenticationFailure,
    #[error("forbidden: {0}")]
    Forbidden(&'static str),
    #[error("message already deleted")]
    AlreadyDeleted,
    #[error("invalid status: {0}")]
    InvalidStatus(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("too many messages, slow down")]
    RateLimited,
    #[error("{0}")]
    Validation(String),
    #[error("session is not active")]
    SessionClosed,
    #[error("store failure")]
    Store(#[from] sqlx::Error),
}

impl ChatError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ChatError::TenantNotFound(_) | ChatError::NotFound(_) => StatusCode::NOT_FOUND,
            ChatError::AuthenticationFailure | ChatError::SessionClosed => StatusCode::UNAUTHORIZED,
            ChatError::Forbidden(_) => StatusCode::FORBIDDEN,
            ChatError::AlreadyDeleted => StatusCode::CONFLICT,
            ChatError::InvalidStatus(_) | ChatError::Validation(_) => StatusCode::BAD_REQUEST,
            ChatError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ChatError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Extra context for the client. Only store failures carry any.
    pub fn details(&self) -> Option<String> {
        match self {
            ChatError::Store(e) => Some(e.to_string()),
            _ => None,
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        if let ChatError::Store(ref e) = self {
            tracing::error!("Store failure: {:?}", e);
        }
        (
            self.status_code(),
            Json(serde_json::json!({"error": self.to_string()})),
        )
            .into_response()
    }
}
