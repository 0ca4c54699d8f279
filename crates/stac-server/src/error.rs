//! Error types for the service.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use stac_core::error::ClientError;
use stac_core::migration::{ErrorClass, MigrationError};
use thiserror::Error;

/// Errors that stop the service from starting or running.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration or assembly.
    #[error("configuration error: {0}")]
    Config(String),

    /// The database could not be reached.
    #[error("connectivity error: {0}")]
    Connectivity(String),

    /// The database schema is not at the expected revision.
    #[error("readiness error: {0}")]
    Readiness(#[source] MigrationError),

    /// A migration step or bookkeeping query failed.
    #[error("migration failed: {0}")]
    Migration(#[source] MigrationError),

    /// Listener or socket failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serverless runtime failure.
    #[error("serverless runtime error: {0}")]
    Serverless(String),
}

impl Error {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Config(_) => 2,
            Error::Connectivity(_) => 3,
            Error::Readiness(_) => 4,
            Error::Migration(_) | Error::Io(_) | Error::Serverless(_) => 1,
        }
    }
}

impl From<MigrationError> for Error {
    fn from(err: MigrationError) -> Self {
        match err.class() {
            ErrorClass::Configuration => Error::Config(err.to_string()),
            ErrorClass::Connectivity => Error::Connectivity(err.to_string()),
            ErrorClass::Readiness => Error::Readiness(err),
            ErrorClass::Operational => Error::Migration(err),
        }
    }
}

/// Request-scoped error rendered as an HTTP response.
#[derive(Debug)]
pub enum AppError {
    /// Error from the composed client.
    Client(ClientError),
    /// Malformed request body or parameters.
    BadRequest(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code.
    pub code: String,
    /// Human readable description.
    pub description: String,
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Client(ClientError::NotFound(_)) => (StatusCode::NOT_FOUND, "NotFoundError"),
            AppError::Client(ClientError::Conflict(_)) => (StatusCode::CONFLICT, "ConflictError"),
            AppError::Client(ClientError::Validation(_)) | AppError::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, "RequestValidationError")
            }
            AppError::Client(ClientError::Unsupported { .. }) => {
                (StatusCode::NOT_IMPLEMENTED, "NotImplementedError")
            }
            AppError::Client(ClientError::Backend(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "DatabaseError")
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.parts();
        let description = match self {
            AppError::Client(err) => err.to_string(),
            AppError::BadRequest(msg) => msg,
        };
        if status.is_server_error() && status != StatusCode::NOT_IMPLEMENTED {
            tracing::error!(code, %description, "request failed");
        }

        let body = ErrorResponse {
            code: code.to_string(),
            description,
        };

        (status, Json(body)).into_response()
    }
}

impl From<ClientError> for AppError {
    fn from(err: ClientError) -> Self {
        AppError::Client(err)
    }
}

impl From<JsonRejection> for AppError {
    fn from(err: JsonRejection) -> Self {
        AppError::BadRequest(err.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(err: QueryRejection) -> Self {
        AppError::BadRequest(err.body_text())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stac_core::client::Capability;
    use stac_core::migration::Revision;

    #[test]
    fn test_exit_codes_are_distinct_per_class() {
        let config: Error = MigrationError::UnknownRevision {
            revision: Revision::new("x"),
        }
        .into();
        let connectivity: Error = MigrationError::Connection("refused".to_string()).into();
        let readiness: Error = MigrationError::SchemaMismatch {
            actual: None,
            expected: Revision::new("x"),
        }
        .into();
        assert_eq!(config.exit_code(), 2);
        assert_eq!(connectivity.exit_code(), 3);
        assert_eq!(readiness.exit_code(), 4);
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ClientError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ClientError::Conflict("x".into()), StatusCode::CONFLICT),
            (ClientError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (
                ClientError::Unsupported {
                    capability: Capability::Query,
                },
                StatusCode::NOT_IMPLEMENTED,
            ),
            (ClientError::Backend("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).into_response().status(), status);
        }
    }
}
