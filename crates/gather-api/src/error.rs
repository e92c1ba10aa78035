use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

use gather_db::DomainError;
use gather_types::api::ApiResponse;

/// Wraps the domain taxonomy for the HTTP boundary: every variant maps to a
/// status code and the uniform envelope. Storage internals are logged and
/// replaced with a generic message.
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, errors) = match self.0 {
            DomainError::Validation(errs) => (
                StatusCode::BAD_REQUEST,
                "Validation failed".to_string(),
                Some(errs),
            ),
            DomainError::NotFound(_) => (StatusCode::NOT_FOUND, self.0.to_string(), None),
            DomainError::Unauthenticated | DomainError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, self.0.to_string(), None)
            }
            DomainError::Forbidden => (StatusCode::FORBIDDEN, self.0.to_string(), None),
            DomainError::EventNotOpen
            | DomainError::EventFull
            | DomainError::DuplicateRegistration
            | DomainError::InvalidTransition { .. } => {
                (StatusCode::CONFLICT, self.0.to_string(), None)
            }
            DomainError::Storage(_) | DomainError::LockPoisoned | DomainError::Internal(_) => {
                error!("request failed: {:?}", self.0);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                    None,
                )
            }
        };

        (status, Json(ApiResponse::<()>::error(message, errors))).into_response()
    }
}

/// Runs a blocking storage call off the async runtime.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, DomainError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError(DomainError::Internal(e.to_string()))
        })?
        .map_err(ApiError::from)
}
