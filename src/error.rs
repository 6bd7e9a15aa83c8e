//! API error taxonomy shared by the store and HTTP layers
//!
//! Every failure surfaces to the caller as a structured JSON body; there is
//! no silent recovery and no retry, and no distinction between transient and
//! permanent failure.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Errors returned by record access and the journal generator.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A referenced entity does not exist (student, category-by-slug, ...)
    #[error("{0}")]
    NotFound(String),

    /// Malformed request or an empty lesson window
    #[error("{0}")]
    BadRequest(String),

    /// Missing or invalid field on create/update (e.g. dangling reference)
    #[error("{0}")]
    Validation(String),

    /// Unique-field collision (slug, admin username)
    #[error("{0}")]
    Conflict(String),

    /// Anything unexpected from the storage layer or runtime
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "not found",
            ApiError::BadRequest(_) => "bad request",
            ApiError::Validation(_) => "validation error",
            ApiError::Conflict(_) => "uniqueness violation",
            ApiError::Internal(_) => "internal error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(err) = &self {
            tracing::error!("internal error: {err:#}");
        }
        let body = Json(json!({
            "error": self.kind(),
            "details": self.to_string(),
        }));
        (self.status(), body).into_response()
    }
}

impl From<axum::extract::rejection::JsonRejection> for ApiError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> Self {
        // SQLITE_CONSTRAINT_FOREIGNKEY = 787, SQLITE_CONSTRAINT_UNIQUE = 2067,
        // SQLITE_CONSTRAINT_PRIMARYKEY = 1555
        if let rusqlite::Error::SqliteFailure(e, msg) = &err {
            match e.extended_code {
                787 => {
                    return ApiError::Validation("referenced record does not exist".to_string())
                }
                2067 | 1555 => {
                    return ApiError::Conflict(
                        msg.clone()
                            .unwrap_or_else(|| "unique constraint violated".to_string()),
                    )
                }
                _ => {}
            }
        }
        ApiError::Internal(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::NotFound("x".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::BadRequest("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::Conflict("x".into()).status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_constraint_mapping() {
        let fk = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: rusqlite::ffi::ErrorCode::ConstraintViolation,
                extended_code: 787,
            },
            None,
        );
        assert!(matches!(ApiError::from(fk), ApiError::Validation(_)));

        let unique = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: rusqlite::ffi::ErrorCode::ConstraintViolation,
                extended_code: 2067,
            },
            Some("UNIQUE constraint failed: learning_categories.slug".to_string()),
        );
        assert!(matches!(ApiError::from(unique), ApiError::Conflict(_)));
    }
}
