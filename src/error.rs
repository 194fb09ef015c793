//! HTTP mapping for engine errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;
use tracking::Error;

use crate::SERVICE;

/// Error reply for the REST surface: domain code mapped to a status, the
/// `code: ..., description: ...` rendering as the body.
pub struct HttpError {
    status: StatusCode,
    error: String,
}

impl HttpError {
    pub fn not_found(description: impl Into<String>) -> Self {
        Self { status: StatusCode::NOT_FOUND, error: description.into() }
    }
}

impl From<Error> for HttpError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::UnknownVehicle(_) => StatusCode::NOT_FOUND,
            Error::InvalidFormat(_) => StatusCode::BAD_REQUEST,
            Error::Directory(_) => StatusCode::BAD_GATEWAY,
            Error::Persistence(_) | Error::ServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self { status, error: err.description() }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(monotonic_counter.handler_errors = 1, error = %self.error, service = %SERVICE);
        }
        (self.status, self.error).into_response()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn domain_errors_map_to_statuses() {
        let err = HttpError::from(Error::UnknownVehicle("vehicle ghost".to_string()));
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.error, "code: unknown_vehicle, description: vehicle ghost");

        let err = HttpError::from(Error::Persistence("write failed".to_string()));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);

        let err = HttpError::from(Error::InvalidFormat("empty id".to_string()));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
