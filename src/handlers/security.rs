//! Security controller: served behind Basic authentication, raises
//! authentication and authorization faults.

use axum::{
    Router,
    extract::{Path, rejection::PathRejection},
    http::StatusCode,
    middleware,
    routing::get,
};

use crate::auth::{AuthenticatedUser, deny_all_guard};
use crate::error::{AuthenticationFault, AuthorizationFault, Fault};
use crate::server::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/deny-all",
            get(get_access_denied).route_layer(middleware::from_fn(deny_all_guard)),
        )
        .route("/exception/{exception_id}", get(get_specific_exception))
}

/// Never reached: the deny-all guard rejects every caller
pub async fn get_access_denied() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Raise the security fault named by `exception_id`
pub async fn get_specific_exception(
    AuthenticatedUser(user): AuthenticatedUser,
    exception_id: Result<Path<String>, PathRejection>,
) -> Result<(), Fault> {
    let Path(exception_id) = exception_id?;
    tracing::debug!(user = %user, exception_id = %exception_id, "Raising security fault");

    Err(match exception_id.as_str() {
        "bad-credentials" => Fault::Authentication(AuthenticationFault::BadCredentials(
            "Fake bad credentials".to_string(),
        )),
        "access-denied" => Fault::Authorization(AuthorizationFault::AccessDenied(
            "Fake access denied".to_string(),
        )),
        "account-expired" => Fault::Authentication(AuthenticationFault::AccountExpired(
            "Fake account expired".to_string(),
        )),
        other => Fault::Authentication(AuthenticationFault::Other(other.to_string())),
    })
}
