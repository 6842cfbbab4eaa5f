//! Exception controller: raises plain, chained and status-declaring faults.

use std::io;

use axum::{
    Router,
    extract::{Path, rejection::PathRejection},
    http::StatusCode,
    routing::get,
};
use thiserror::Error;

use crate::error::{ErrorRecord, Fault};
use crate::server::AppState;

/// Faults raised by [`get_specific_exception`]
#[derive(Debug, Error)]
pub enum DemoError {
    #[error("{0}")]
    Basic(String),
    #[error("{message}")]
    Chained {
        message: String,
        #[source]
        source: io::Error,
    },
    #[error("{0}")]
    ResourceNotFound(String),
    #[error("{0}")]
    BadArguments(String),
    #[error("{0}")]
    Internal(String),
}

impl DemoError {
    /// Status statically attached to the error type, if any
    pub fn declared_status(&self) -> Option<StatusCode> {
        match self {
            DemoError::Basic(_) | DemoError::Chained { .. } => None,
            DemoError::ResourceNotFound(_) => Some(StatusCode::NOT_FOUND),
            DemoError::BadArguments(_) => Some(StatusCode::BAD_REQUEST),
            DemoError::Internal(_) => Some(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }
}

impl From<DemoError> for Fault {
    fn from(error: DemoError) -> Self {
        match error.declared_status() {
            Some(status) => Fault::Declared {
                status,
                error: error.into(),
            },
            None => Fault::Undeclared(error.into()),
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/exception/{exception_id}", get(get_specific_exception))
}

/// Raise the fault named by `exception_id`
#[utoipa::path(
    get,
    path = "/exception/{exception_id}",
    params(
        ("exception_id" = String, Path, description = "basic, chained, not_found, bad_arguments or anything else"),
        ("trace" = Option<bool>, Query, description = "Ask for the cause chain")
    ),
    responses(
        (status = 400, description = "Declared bad request", body = ErrorRecord),
        (status = 404, description = "Declared not found", body = ErrorRecord),
        (status = 500, description = "Undeclared or declared internal fault", body = ErrorRecord)
    ),
    tag = "exception"
)]
pub async fn get_specific_exception(
    exception_id: Result<Path<String>, PathRejection>,
) -> Result<(), Fault> {
    let Path(exception_id) = exception_id?;
    let error = match exception_id.as_str() {
        "basic" => DemoError::Basic("basic exception".to_string()),
        "chained" => DemoError::Chained {
            message: "chained exception".to_string(),
            source: io::Error::other("child IOException message"),
        },
        "not_found" => DemoError::ResourceNotFound("resource not found".to_string()),
        "bad_arguments" => DemoError::BadArguments("bad arguments".to_string()),
        _ => DemoError::Internal("internal error".to_string()),
    };

    Err(error.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn raise(id: &str) -> Fault {
        get_specific_exception(Ok(Path(id.to_string())))
            .await
            .unwrap_err()
    }

    #[tokio::test]
    async fn test_basic_is_undeclared() {
        let fault = raise("basic").await;
        assert!(matches!(fault, Fault::Undeclared(_)));
        assert_eq!(fault.to_string(), "basic exception");
    }

    #[tokio::test]
    async fn test_chained_keeps_cause() {
        let fault = raise("chained").await;
        assert_eq!(fault.to_string(), "chained exception");
        assert_eq!(fault.causes(), vec!["child IOException message".to_string()]);
    }

    #[tokio::test]
    async fn test_declared_statuses() {
        for (id, status, message) in [
            ("not_found", StatusCode::NOT_FOUND, "resource not found"),
            ("bad_arguments", StatusCode::BAD_REQUEST, "bad arguments"),
            ("dummy", StatusCode::INTERNAL_SERVER_ERROR, "internal error"),
        ] {
            match raise(id).await {
                Fault::Declared {
                    status: declared,
                    error,
                } => {
                    assert_eq!(declared, status);
                    assert_eq!(error.to_string(), message);
                }
                other => panic!("expected declared fault for {}, got {:?}", id, other),
            }
        }
    }
}
