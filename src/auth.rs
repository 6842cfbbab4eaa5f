//! # Authentication and Authorization
//!
//! HTTP Basic authentication against the single configured user, plus the
//! deny-all guard. Missing credentials surface as an authentication fault and
//! are normalized like any other fault; wrong credentials short-circuit to a
//! bare `401` challenge without a JSON body.

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{AUTHORIZATION, WWW_AUTHENTICATE},
        request::Parts,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{Engine as _, engine::general_purpose};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::config::AppConfig;
use crate::error::{AuthenticationFault, AuthorizationFault, Fault};
use crate::server::AppState;

const BASIC_REALM: &str = r#"Basic realm="Realm""#;

/// Name of the user that passed Basic authentication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub String);

/// Decoded `Authorization: Basic` credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

/// Reasons a present `Authorization` header could not be decoded
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialsError {
    #[error("Authorization header is not valid ASCII")]
    InvalidHeader,
    #[error("Basic credentials are not valid base64")]
    InvalidEncoding,
    #[error("Basic credentials are missing the ':' separator")]
    MissingSeparator,
}

impl FromRef<AppState> for Arc<AppConfig> {
    fn from_ref(app_state: &AppState) -> Self {
        Arc::clone(&app_state.config)
    }
}

/// Authentication middleware for HTTP Basic credentials
pub async fn basic_auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request,
    next: Next,
) -> Result<Response, Fault> {
    let credentials = match extract_basic_credentials(request.headers()) {
        Ok(Some(credentials)) => credentials,
        Ok(None) => {
            return Err(Fault::Authentication(
                AuthenticationFault::MissingCredentials,
            ));
        }
        Err(err) => {
            tracing::debug!(error = %err, "Rejected malformed Basic credentials");
            return Ok(basic_challenge());
        }
    };

    if !credentials_match(&config, &credentials) {
        tracing::debug!(user = %credentials.username, "Rejected Basic credentials");
        return Ok(basic_challenge());
    }

    tracing::debug!(user = %credentials.username, "Authenticated request");
    request
        .extensions_mut()
        .insert(AuthenticatedUser(credentials.username));

    Ok(next.run(request).await)
}

/// Guard that refuses every caller, authenticated or not
pub async fn deny_all_guard(_request: Request, _next: Next) -> Result<Response, Fault> {
    Err(Fault::Authorization(AuthorizationFault::AccessDenied(
        "Access is denied".to_string(),
    )))
}

/// Bare `401` with a Basic challenge and no body
pub fn basic_challenge() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(WWW_AUTHENTICATE, HeaderValue::from_static(BASIC_REALM))],
    )
        .into_response()
}

/// Read Basic credentials; `Ok(None)` when the request carries none.
///
/// Headers using another scheme are treated as carrying no credentials.
pub fn extract_basic_credentials(
    headers: &HeaderMap,
) -> Result<Option<BasicCredentials>, CredentialsError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let header = value.to_str().map_err(|_| CredentialsError::InvalidHeader)?;

    let Some((scheme, encoded)) = header.trim().split_once(' ') else {
        return Ok(None);
    };
    if !scheme.eq_ignore_ascii_case("basic") {
        return Ok(None);
    }

    let decoded = general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|_| CredentialsError::InvalidEncoding)?;
    let decoded = String::from_utf8(decoded).map_err(|_| CredentialsError::InvalidEncoding)?;

    let (username, password) = decoded
        .split_once(':')
        .ok_or(CredentialsError::MissingSeparator)?;

    Ok(Some(BasicCredentials {
        username: username.to_string(),
        password: password.to_string(),
    }))
}

fn credentials_match(config: &AppConfig, credentials: &BasicCredentials) -> bool {
    let (Some(user), Some(password)) = (
        config.security_user_name.as_deref(),
        config.security_user_password.as_deref(),
    ) else {
        return false;
    };

    let user_ok: bool = credentials.username.as_bytes().ct_eq(user.as_bytes()).into();
    let password_ok: bool = credentials
        .password
        .as_bytes()
        .ct_eq(password.as_bytes())
        .into();
    user_ok & password_ok
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Sync,
{
    type Rejection = Fault;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or(Fault::Authentication(
                AuthenticationFault::MissingCredentials,
            ))
    }
}
