use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::services::evaluation_review::ReviewError;
use crate::services::user_admin::UserAdminError;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: u16,
    error: String,
}

#[derive(Debug)]
pub(crate) enum ApiError {
    Unauthorized(&'static str),
    Forbidden(&'static str),
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    PayloadTooLarge(String),
    TooManyRequests(&'static str),
    ServiceUnavailable(&'static str),
    Internal(String),
}

impl ApiError {
    /// Log the underlying error with context and return an `Internal` variant.
    pub(crate) fn internal(err: impl std::fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Internal(context.to_string())
    }

    fn status_and_message(self) -> (StatusCode, String) {
        match self {
            ApiError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message.to_string()),
            ApiError::Forbidden(message) => (StatusCode::FORBIDDEN, message.to_string()),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, message),
            ApiError::PayloadTooLarge(message) => (StatusCode::PAYLOAD_TOO_LARGE, message),
            ApiError::TooManyRequests(message) => {
                (StatusCode::TOO_MANY_REQUESTS, message.to_string())
            }
            ApiError::ServiceUnavailable(message) => {
                (StatusCode::SERVICE_UNAVAILABLE, message.to_string())
            }
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let unauthorized = matches!(self, ApiError::Unauthorized(_));
        let (status, error) = self.status_and_message();
        let mut response =
            (status, Json(ErrorResponse { status: status.as_u16(), error })).into_response();
        if unauthorized {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<ReviewError> for ApiError {
    fn from(err: ReviewError) -> Self {
        let message = err.to_string();
        match err {
            ReviewError::RecordNotFound(_) | ReviewError::QuestionNotFound(_) => {
                ApiError::NotFound(message)
            }
            ReviewError::MarksOutOfRange { .. } | ReviewError::NothingApproved => {
                ApiError::BadRequest(message)
            }
            ReviewError::InvalidTransition { .. }
            | ReviewError::NotGraded
            | ReviewError::RecordLocked
            | ReviewError::SessionLocked
            | ReviewError::UnreviewedRecords { .. } => ApiError::Conflict(message),
        }
    }
}

impl From<UserAdminError> for ApiError {
    fn from(err: UserAdminError) -> Self {
        match err {
            UserAdminError::Invalid(message) => ApiError::BadRequest(message),
            UserAdminError::SelfDelete => ApiError::BadRequest(err.to_string()),
            UserAdminError::Duplicate(_) => ApiError::Conflict(err.to_string()),
            UserAdminError::NotFound => ApiError::NotFound(err.to_string()),
            UserAdminError::Database(err) => ApiError::internal(err, "User administration failed"),
            UserAdminError::Security(err) => ApiError::internal(err, "Password hashing failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_errors_map_to_statuses() {
        let cases = [
            (ReviewError::RecordLocked, StatusCode::CONFLICT),
            (ReviewError::QuestionNotFound(4), StatusCode::NOT_FOUND),
            (ReviewError::MarksOutOfRange { question: 1, total: 10.0 }, StatusCode::BAD_REQUEST),
            (ReviewError::NothingApproved, StatusCode::BAD_REQUEST),
            (ReviewError::UnreviewedRecords { unapproved: 1, total: 3 }, StatusCode::CONFLICT),
            (ReviewError::SessionLocked, StatusCode::CONFLICT),
            (ReviewError::NotGraded, StatusCode::CONFLICT),
        ];
        for (err, expected) in cases {
            let (status, _) = ApiError::from(err).status_and_message();
            assert_eq!(status, expected);
        }
    }

    #[test]
    fn unauthorized_carries_challenge_header() {
        let response = ApiError::Unauthorized("nope").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
    }
}
