use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::result::ApiResult;
use crate::utils::error_codes;

#[derive(Debug)]
pub enum AppError {
    Validation(String),
    UserExists,
    AlreadyExists(String),
    SelfFollow,
    Unauthorized,
    PermissionDenied(String),
    NotFound(String),
    Database(sqlx::Error),
    Internal(String),
}

impl AppError {
    pub fn not_found(what: &str) -> Self {
        AppError::NotFound(format!("{} not found", what))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => AppError::NotFound("resource not found".to_string()),
            // Races on membership inserts lose to the unique constraint and
            // surface the same way as the pre-check.
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::AlreadyExists("already exists".to_string())
            }
            _ => AppError::Database(e),
        }
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(e: bcrypt::BcryptError) -> Self {
        AppError::Internal(format!("password hashing failed: {}", e))
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Internal(format!("io error: {}", e))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, error_message) = match self {
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, error_codes::VALIDATION_ERROR, msg)
            }
            AppError::UserExists => (
                StatusCode::BAD_REQUEST,
                error_codes::USER_EXISTS,
                "a user with that email or username already exists".to_string(),
            ),
            AppError::AlreadyExists(msg) => {
                (StatusCode::BAD_REQUEST, error_codes::ALREADY_EXISTS, msg)
            }
            AppError::SelfFollow => (
                StatusCode::BAD_REQUEST,
                error_codes::SELF_FOLLOW,
                "you cannot follow yourself".to_string(),
            ),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                error_codes::AUTH_FAILED,
                "authentication required".to_string(),
            ),
            AppError::PermissionDenied(msg) => {
                (StatusCode::FORBIDDEN, error_codes::PERMISSION_DENIED, msg)
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, error_codes::NOT_FOUND, msg),
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_codes::INTERNAL_ERROR,
                    "internal server error".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_codes::INTERNAL_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(ApiResult::<()>::error(code, &error_message));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_maps_to_not_found() {
        // RowNotFound is the only sqlx variant constructible without a live
        // connection; the unique-violation arm is covered by the relation
        // manager pre-checks.
        let err = AppError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn statuses_follow_the_error_taxonomy() {
        let cases = [
            (
                AppError::Validation("bad".into()),
                StatusCode::BAD_REQUEST,
            ),
            (AppError::UserExists, StatusCode::BAD_REQUEST),
            (
                AppError::AlreadyExists("dup".into()),
                StatusCode::BAD_REQUEST,
            ),
            (AppError::SelfFollow, StatusCode::BAD_REQUEST),
            (AppError::Unauthorized, StatusCode::UNAUTHORIZED),
            (
                AppError::PermissionDenied("no".into()),
                StatusCode::FORBIDDEN,
            ),
            (
                AppError::NotFound("missing".into()),
                StatusCode::NOT_FOUND,
            ),
            (
                AppError::Internal("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[tokio::test]
    async fn duplicate_user_carries_its_own_code() {
        let response = AppError::UserExists.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], error_codes::USER_EXISTS);
    }
}
