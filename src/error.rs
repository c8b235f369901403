use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::repository::StoreError;
use crate::token::TokenError;

/// ApiError
///
/// The single error taxonomy for every operation boundary. Each handler maps
/// its domain failures into one of these variants; the `IntoResponse` impl
/// owns the status-code mapping and the external message, so no handler can
/// accidentally leak a different shape.
///
/// Two deliberate information-hiding rules live here:
/// - `Unauthorized` carries one fixed message for every credential failure
///   (unknown email, wrong password, bad token, expired token) so callers
///   cannot enumerate accounts or distinguish token states.
/// - `Ownership` maps to 404, not 403: an admin probing another admin's
///   course must not learn that the course exists.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed input: missing fields, shape violations, bad media types.
    #[error("{0}")]
    Validation(String),

    /// An account with this email already exists within the same variant.
    #[error("account already exists")]
    DuplicateAccount,

    /// The learner already holds a purchase for this course.
    #[error("course already purchased")]
    DuplicatePurchase,

    /// Credential or token failure. One message for all causes.
    #[error("invalid credentials")]
    Unauthorized,

    /// The requested resource does not exist (or must appear not to).
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Mutation attempted on a course created by another admin.
    #[error("cannot update a course created by another admin")]
    Ownership,

    /// Upstream asset-store failure.
    #[error("asset upload failed")]
    Upload(String),

    /// Unexpected failure. Detail is logged, never surfaced.
    #[error("internal server error")]
    Internal(String),
}

/// JSON error body. Matches the `{"errors": "..."}` shape the frontend
/// already consumes.
#[derive(Debug, Serialize)]
struct ErrorBody {
    errors: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Validation(_) | Self::DuplicateAccount | Self::DuplicatePurchase => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) | Self::Ownership => StatusCode::NOT_FOUND,
            Self::Upload(detail) => {
                tracing::error!(detail = %detail, "asset store failure");
                StatusCode::BAD_GATEWAY
            }
            Self::Internal(detail) => {
                tracing::error!(detail = %detail, "internal server error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = ErrorBody {
            errors: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            // The only storage-level duplicate reachable through `?` is the
            // per-variant unique email index; purchase conflicts surface as
            // an absent row, not an error.
            StoreError::Duplicate => Self::DuplicateAccount,
            StoreError::Database(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing => Self::Internal("token signing failed".to_string()),
            TokenError::Expired | TokenError::Invalid => Self::Unauthorized,
        }
    }
}
