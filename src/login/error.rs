use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

#[derive(Debug)]
pub enum LoginError {
    UserNotFound(String),
    UserExists(String),
    DatabaseError(String),
    InternalError(String),
}

impl fmt::Display for LoginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoginError::UserNotFound(name) => write!(f, "User not found: {}", name),
            LoginError::UserExists(name) => write!(f, "User already exists: {}", name),
            LoginError::DatabaseError(e) => write!(f, "Database error: {}", e),
            LoginError::InternalError(e) => write!(f, "Internal error: {}", e),
        }
    }
}

impl std::error::Error for LoginError {}

impl From<std::io::Error> for LoginError {
    fn from(e: std::io::Error) -> Self {
        LoginError::DatabaseError(e.to_string())
    }
}

impl IntoResponse for LoginError {
    fn into_response(self) -> Response {
        tracing::error!("{}", self);
        let (status, message) = match self {
            LoginError::UserNotFound(_) => (StatusCode::NOT_FOUND, "User not found"),
            LoginError::UserExists(_) => (StatusCode::CONFLICT, "User already exists"),
            LoginError::DatabaseError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Database error"),
            LoginError::InternalError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        (status, message).into_response()
    }
}
