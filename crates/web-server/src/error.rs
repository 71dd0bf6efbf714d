// In crates/web-server/src/error.rs

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Domain(#[from] core_types::Error),
    #[error("Invalid request body: {}", .0.body_text())]
    InvalidBody(#[from] JsonRejection),
    #[error("Failed to bind server address: {0}")]
    ServerBindError(std::io::Error),
    #[error("Server terminated: {0}")]
    ServeError(std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    fn status(&self) -> StatusCode {
        use core_types::Error as Domain;

        match self {
            Error::Domain(Domain::InvalidOrder { .. }) => StatusCode::BAD_REQUEST,
            Error::Domain(Domain::UnknownInstrument(_)) => StatusCode::NOT_FOUND,
            Error::Domain(Domain::InsufficientHoldings { .. }) => StatusCode::CONFLICT,
            Error::Domain(Domain::NotAuthenticated) => StatusCode::UNAUTHORIZED,
            Error::Domain(Domain::StorageUnavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Error::InvalidBody(rejection) => rejection.status(),
            Error::ServerBindError(_) | Error::ServeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        let body = Json(json!({
            "success": false,
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}
