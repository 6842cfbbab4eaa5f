//! Validation controller: the same payload validated while binding (400 by
//! default) or inside a validated service method (500 by default).

use axum::{
    Json, Router,
    extract::{
        Query,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::error::{ErrorRecord, Fault, ValidationOrigin};
use crate::models::TestRequestBody;
use crate::server::AppState;
use crate::validation::{Validate, Violations, min};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/test/validation", post(do_post_without_validation))
        .route("/test/binding-validation", post(do_post_with_validation))
        .route(
            "/test/validation/parameter-validation",
            get(some_get_method),
        )
}

/// Service whose methods validate their arguments on entry
#[derive(Debug, Clone, Copy, Default)]
pub struct TestService;

impl TestService {
    pub fn do_something(&self, request_body: &TestRequestBody) -> Result<(), Fault> {
        request_body
            .validate("doSomething.requestBody")
            .into_result(ValidationOrigin::MethodLevel)?;
        tracing::debug!("doSomething accepted request body");
        Ok(())
    }
}

/// Accept any well-formed body and hand it to the validated service
#[utoipa::path(
    post,
    path = "/test/validation",
    request_body = TestRequestBody,
    responses(
        (status = 204, description = "Body accepted"),
        (status = 400, description = "Malformed JSON", body = ErrorRecord),
        (status = 500, description = "Method-level validation failed", body = ErrorRecord)
    ),
    tag = "validation"
)]
pub async fn do_post_without_validation(
    payload: Result<Json<TestRequestBody>, JsonRejection>,
) -> Result<StatusCode, Fault> {
    let Json(request_body) = payload?;
    TestService.do_something(&request_body)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Validate the body while binding it to the handler argument
#[utoipa::path(
    post,
    path = "/test/binding-validation",
    request_body = TestRequestBody,
    responses(
        (status = 204, description = "Body accepted"),
        (status = 400, description = "Malformed JSON or argument validation failed", body = ErrorRecord)
    ),
    tag = "validation"
)]
pub async fn do_post_with_validation(
    payload: Result<Json<TestRequestBody>, JsonRejection>,
) -> Result<StatusCode, Fault> {
    let Json(request_body) = payload?;
    request_body
        .validate("doPostWithValidation.requestBody")
        .into_result(ValidationOrigin::ArgumentBinding)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PageParams {
    /// Must be greater than or equal to 0
    pub page: i64,
}

/// Handler with a method-level constraint on its `page` parameter
#[utoipa::path(
    get,
    path = "/test/validation/parameter-validation",
    params(PageParams),
    responses(
        (status = 204, description = "Parameter accepted"),
        (status = 400, description = "Missing or non-numeric page", body = ErrorRecord),
        (status = 500, description = "Method-level validation failed", body = ErrorRecord)
    ),
    tag = "validation"
)]
pub async fn some_get_method(
    params: Result<Query<PageParams>, QueryRejection>,
) -> Result<StatusCode, Fault> {
    let Query(PageParams { page }) = params?;

    let mut violations = Violations::new();
    violations.check(min("someGetMethod.page", page, 0));
    violations.into_result(ValidationOrigin::MethodLevel)?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_rejects_invalid_body() {
        let fault = TestService
            .do_something(&TestRequestBody {
                value: None,
                value2: Some(String::new()),
            })
            .unwrap_err();

        match fault {
            Fault::Validation { origin, violations } => {
                assert_eq!(origin, ValidationOrigin::MethodLevel);
                assert_eq!(violations.len(), 3);
            }
            other => panic!("expected validation fault, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_parameter_validation() {
        let fault = some_get_method(Ok(Query(PageParams { page: -1 })))
            .await
            .unwrap_err();
        assert_eq!(
            fault.to_string(),
            "someGetMethod.page: must be greater than or equal to 0"
        );

        let accepted = some_get_method(Ok(Query(PageParams { page: 0 }))).await;
        assert_eq!(accepted.unwrap(), StatusCode::NO_CONTENT);
    }
}
