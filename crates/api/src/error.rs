use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::{InviteError, StoreError};
use serde::Serialize;
use thiserror::Error;

/// Message shown for every invite that cannot be used, whatever the reason.
pub const INVALID_INVITE_MESSAGE: &str = "This invite is invalid or no longer active";

#[derive(Debug, Error)]
pub enum ApiError {
    /// No credential, or one that failed verification.
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Valid credential without the required ownership or capability.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Unknown, inactive and expired invites are indistinguishable to callers.
    #[error("Invalid invite")]
    InvalidInvite,

    #[error("Invite usage limit reached")]
    InviteExhausted,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        details: Vec<ValidationDetail>,
    },

    #[error("Rate limited")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
            details: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<ValidationDetail>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationDetail {
    pub field: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut details = None;
        let (status, error_code, message) = match self {
            ApiError::Unauthenticated(msg) => (StatusCode::UNAUTHORIZED, "unauthenticated", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::InvalidInvite => (
                StatusCode::NOT_FOUND,
                "invalid_invite",
                INVALID_INVITE_MESSAGE.into(),
            ),
            ApiError::InviteExhausted => (
                StatusCode::GONE,
                "invite_exhausted",
                "This invite has already been used the maximum number of times".into(),
            ),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::Validation {
                message,
                details: fields,
            } => {
                if !fields.is_empty() {
                    details = Some(fields);
                }
                (StatusCode::BAD_REQUEST, "validation_error", message)
            }
            ApiError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "Too many requests. Please try again later.".into(),
            ),
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".into(),
                )
            }
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
        };

        let body = ErrorBody {
            error: error_code.into(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<InviteError> for ApiError {
    fn from(err: InviteError) -> Self {
        match err {
            InviteError::Unauthorized(msg) => ApiError::Forbidden(msg),
            InviteError::NotFound | InviteError::NotActive | InviteError::Expired => {
                ApiError::InvalidInvite
            }
            InviteError::UsageExceeded => ApiError::InviteExhausted,
            InviteError::AlreadyRevoked => {
                ApiError::Conflict("Invite is no longer active".into())
            }
            InviteError::Validation(msg) => ApiError::validation(msg),
            InviteError::ServiceUnavailable => ApiError::ServiceUnavailable(
                "Storage is temporarily unavailable, please retry".into(),
            ),
            InviteError::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ApiError::NotFound("Resource not found".into()),
            other => InviteError::from(other).into(),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details: Vec<ValidationDetail> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| ValidationDetail {
                    field: field.to_string(),
                    message: e.message.clone().map(|m| m.to_string()).unwrap_or_default(),
                })
            })
            .collect();

        let message = if details.len() == 1 {
            details[0].message.clone()
        } else {
            format!("{} validation errors", details.len())
        };

        ApiError::Validation { message, details }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn status_of(error: impl Into<ApiError>) -> StatusCode {
        error.into().into_response().status()
    }

    #[test]
    fn test_api_error_statuses() {
        assert_eq!(
            status_of(ApiError::Unauthenticated("no token".into())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(ApiError::Forbidden("not owner".into())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(status_of(ApiError::InvalidInvite), StatusCode::NOT_FOUND);
        assert_eq!(status_of(ApiError::InviteExhausted), StatusCode::GONE);
        assert_eq!(
            status_of(ApiError::validation("bad")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(ApiError::RateLimited), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            status_of(ApiError::Internal("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_invite_lookup_failures_collapse() {
        for err in [
            InviteError::NotFound,
            InviteError::NotActive,
            InviteError::Expired,
        ] {
            assert!(matches!(ApiError::from(err), ApiError::InvalidInvite));
        }
    }

    #[test]
    fn test_invite_error_mapping() {
        assert_eq!(
            status_of(InviteError::Unauthorized("guest".into())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(status_of(InviteError::UsageExceeded), StatusCode::GONE);
        assert_eq!(status_of(InviteError::AlreadyRevoked), StatusCode::CONFLICT);
        assert_eq!(
            status_of(InviteError::Validation("bad code".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_unavailable_is_never_client_error() {
        assert_eq!(
            status_of(InviteError::ServiceUnavailable),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(StoreError::ServiceUnavailable { attempts: 3 }),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(StoreError::Transient("reset".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_api_error_display() {
        assert_eq!(
            format!("{}", ApiError::Unauthenticated("test".to_string())),
            "Unauthenticated: test"
        );
        assert_eq!(
            format!("{}", ApiError::validation("test")),
            "Validation error: test"
        );
        assert_eq!(format!("{}", ApiError::RateLimited), "Rate limited");
    }

    #[test]
    fn test_from_validation_errors_keeps_details() {
        use validator::Validate;

        #[derive(Validate)]
        struct Input {
            #[validate(email(message = "Invalid email format"))]
            email: String,
        }

        let errors = Input {
            email: "nope".into(),
        }
        .validate()
        .unwrap_err();

        match ApiError::from(errors) {
            ApiError::Validation { message, details } => {
                assert_eq!(message, "Invalid email format");
                assert_eq!(details.len(), 1);
                assert_eq!(details[0].field, "email");
            }
            other => panic!("Expected Validation error, got {:?}", other),
        }
    }
}
