//! # Error Handling
//!
//! This module classifies every caught failure into a [`Fault`] and normalizes it
//! into the canonical JSON [`ErrorRecord`] (`status`, `error`, `message`, `path`,
//! and optionally `trace`). Handlers return `Result<_, Fault>`; the
//! [`error_attributes`] middleware renders the record once the request path and
//! query flags are known.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{
        Query, Request, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{
        HeaderValue, StatusCode, Uri,
        header::{CONTENT_LENGTH, CONTENT_TYPE, WWW_AUTHENTICATE},
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::server::AppState;
use crate::validation::{Violation, Violations};

/// Canonical error body returned for every failed request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ErrorRecord {
    /// HTTP status code of the response
    #[schema(example = 404)]
    pub status: u16,
    /// Standard reason phrase matching `status`
    #[schema(example = "Not Found")]
    pub error: String,
    /// Fault kind name (only when exception visibility is enabled)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
    /// Full cause chain (only when trace visibility allows it)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
    /// Fault message or joined violation descriptions (only when message visibility allows it)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "resource not found")]
    pub message: Option<String>,
    /// Individual violations of a validation fault (only when binding-error visibility allows it)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
    /// Request path that produced the fault, copied verbatim
    #[schema(example = "/exception/not_found")]
    pub path: String,
}

/// A single violated constraint as exposed in [`ErrorRecord::errors`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl From<&Violation> for FieldError {
    fn from(violation: &Violation) -> Self {
        Self {
            field: violation.path.clone(),
            message: violation.message.clone(),
        }
    }
}

/// Where a validation fault was raised, which decides its status under [`StatusPolicy`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationOrigin {
    /// Raised while binding a request argument (body, query) to a handler
    ArgumentBinding,
    /// Raised by a validated service or handler method after binding
    MethodLevel,
}

/// Authentication failures raised by handlers or by the Basic auth middleware
#[derive(Debug, Error)]
pub enum AuthenticationFault {
    #[error("Full authentication is required to access this resource")]
    MissingCredentials,
    #[error("{0}")]
    BadCredentials(String),
    #[error("{0}")]
    AccountExpired(String),
    #[error("{0}")]
    Other(String),
}

/// Authorization failures for authenticated callers
#[derive(Debug, Error)]
pub enum AuthorizationFault {
    #[error("{0}")]
    AccessDenied(String),
}

/// Every failure a request can end with, one variant per classification
#[derive(Debug, Error)]
pub enum Fault {
    /// No status attached; always 500
    #[error("{0}")]
    Undeclared(anyhow::Error),
    /// Carries an explicit status that wins over any default
    #[error("{error}")]
    Declared {
        status: StatusCode,
        error: anyhow::Error,
    },
    /// One or more violated constraints, in evaluation order
    #[error("{violations}")]
    Validation {
        origin: ValidationOrigin,
        violations: Violations,
    },
    #[error(transparent)]
    Authentication(AuthenticationFault),
    #[error(transparent)]
    Authorization(AuthorizationFault),
    /// Unparsable request input; the message holds the parser diagnostic
    #[error("{0}")]
    MalformedInput(String),
}

impl Fault {
    /// Create a fault without a declared status
    pub fn undeclared<S: Into<String>>(message: S) -> Self {
        Fault::Undeclared(anyhow::Error::msg(message.into()))
    }

    /// Create a fault with an explicit status
    pub fn declared<S: Into<String>>(status: StatusCode, message: S) -> Self {
        Fault::Declared {
            status,
            error: anyhow::Error::msg(message.into()),
        }
    }

    /// Kind name used for the `exception` attribute and the first trace line
    pub fn kind(&self) -> &'static str {
        match self {
            Fault::Undeclared(_) => "UndeclaredFault",
            Fault::Declared { .. } => "DeclaredStatusFault",
            Fault::Validation { .. } => "ValidationFault",
            Fault::Authentication(AuthenticationFault::MissingCredentials) => {
                "InsufficientAuthenticationFault"
            }
            Fault::Authentication(AuthenticationFault::BadCredentials(_)) => "BadCredentialsFault",
            Fault::Authentication(AuthenticationFault::AccountExpired(_)) => "AccountExpiredFault",
            Fault::Authentication(AuthenticationFault::Other(_)) => "AuthenticationFault",
            Fault::Authorization(AuthorizationFault::AccessDenied(_)) => "AccessDeniedFault",
            Fault::MalformedInput(_) => "MalformedInputFault",
        }
    }

    /// Messages of the underlying causes, outermost first, excluding the fault itself
    pub fn causes(&self) -> Vec<String> {
        match self {
            Fault::Undeclared(error) | Fault::Declared { error, .. } => {
                error.chain().skip(1).map(ToString::to_string).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Render the full cause chain, one line per link
    pub fn trace(&self) -> String {
        let mut trace = format!("{}: {}", self.kind(), self);
        for cause in self.causes() {
            trace.push_str("\nCaused by: ");
            trace.push_str(&cause);
        }
        trace
    }
}

impl From<anyhow::Error> for Fault {
    fn from(error: anyhow::Error) -> Self {
        Fault::Undeclared(error)
    }
}

impl From<JsonRejection> for Fault {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonSyntaxError(err) => {
                Fault::MalformedInput(format!("JSON parse error: {}", err.body_text()))
            }
            JsonRejection::JsonDataError(err) => {
                Fault::MalformedInput(format!("JSON parse error: {}", err.body_text()))
            }
            JsonRejection::MissingJsonContentType(err) => {
                Fault::declared(StatusCode::UNSUPPORTED_MEDIA_TYPE, err.body_text())
            }
            other => Fault::declared(other.status(), other.body_text()),
        }
    }
}

impl From<QueryRejection> for Fault {
    fn from(rejection: QueryRejection) -> Self {
        Fault::MalformedInput(rejection.body_text())
    }
}

impl From<PathRejection> for Fault {
    fn from(rejection: PathRejection) -> Self {
        match rejection.status() {
            StatusCode::BAD_REQUEST => Fault::MalformedInput(rejection.body_text()),
            status => Fault::declared(status, rejection.body_text()),
        }
    }
}

/// Response extension carrying the fault from the handler to [`error_attributes`]
#[derive(Debug, Clone)]
pub struct FaultSlot(pub Arc<Fault>);

impl IntoResponse for Fault {
    fn into_response(self) -> Response {
        // Provisional status; the error-page middleware replaces it with the configured one.
        let status = StatusPolicy::default().resolve(&self);
        let mut response = status.into_response();
        response.extensions_mut().insert(FaultSlot(Arc::new(self)));
        response
    }
}

/// When an optional attribute is written into the error record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncludeAttribute {
    Never,
    Always,
    /// Only when the request asks for it through a query parameter
    OnParam,
}

impl IncludeAttribute {
    pub fn includes(self, requested: bool) -> bool {
        match self {
            IncludeAttribute::Never => false,
            IncludeAttribute::Always => true,
            IncludeAttribute::OnParam => requested,
        }
    }
}

/// Visibility switches for the sensitive attributes of the error record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorVisibility {
    pub include_message: IncludeAttribute,
    pub include_stacktrace: IncludeAttribute,
    pub include_binding_errors: IncludeAttribute,
    pub include_exception: bool,
}

impl Default for ErrorVisibility {
    fn default() -> Self {
        Self {
            include_message: IncludeAttribute::Always,
            include_stacktrace: IncludeAttribute::OnParam,
            include_binding_errors: IncludeAttribute::Never,
            include_exception: false,
        }
    }
}

/// Message reported for authentication and authorization faults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMessage {
    /// Replace the fault's own message with the status reason phrase
    ReasonPhrase,
    /// Keep the fault's own message
    Original,
}

/// Status and message policy for faults whose outcome is not fixed by their kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusPolicy {
    pub argument_binding_validation: StatusCode,
    pub method_validation: StatusCode,
    pub auth_message: AuthMessage,
}

impl Default for StatusPolicy {
    fn default() -> Self {
        Self {
            argument_binding_validation: StatusCode::BAD_REQUEST,
            method_validation: StatusCode::INTERNAL_SERVER_ERROR,
            auth_message: AuthMessage::ReasonPhrase,
        }
    }
}

impl StatusPolicy {
    /// Resolve the response status for a fault
    pub fn resolve(&self, fault: &Fault) -> StatusCode {
        match fault {
            Fault::Undeclared(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Fault::Declared { status, .. } => *status,
            Fault::Validation {
                origin: ValidationOrigin::ArgumentBinding,
                ..
            } => self.argument_binding_validation,
            Fault::Validation {
                origin: ValidationOrigin::MethodLevel,
                ..
            } => self.method_validation,
            Fault::Authentication(_) => StatusCode::UNAUTHORIZED,
            Fault::Authorization(_) => StatusCode::FORBIDDEN,
            Fault::MalformedInput(_) => StatusCode::BAD_REQUEST,
        }
    }
}

/// Attributes the caller explicitly asked for through query parameters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestedAttributes {
    pub trace: bool,
    pub message: bool,
    pub errors: bool,
}

impl RequestedAttributes {
    /// Read the `trace`, `message` and `errors` flags from a request URI.
    ///
    /// A flag is set when the parameter is present and not `false`. A repeated
    /// parameter keeps its first value.
    pub fn from_uri(uri: &Uri) -> Self {
        let pairs = Query::<Vec<(String, String)>>::try_from_uri(uri)
            .map(|Query(pairs)| pairs)
            .unwrap_or_default();

        let flag = |name: &str| {
            pairs
                .iter()
                .find(|(key, _)| key == name)
                .is_some_and(|(_, value)| !value.eq_ignore_ascii_case("false"))
        };

        Self {
            trace: flag("trace"),
            message: flag("message"),
            errors: flag("errors"),
        }
    }
}

/// Reason phrase for a status, falling back for codes without a standard phrase
pub fn reason_phrase(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("Unknown Status")
}

/// Turns faults into [`ErrorRecord`]s under a fixed visibility and status policy
#[derive(Debug, Clone, Default)]
pub struct ErrorNormalizer {
    visibility: ErrorVisibility,
    policy: StatusPolicy,
}

impl ErrorNormalizer {
    pub fn new(visibility: ErrorVisibility, policy: StatusPolicy) -> Self {
        Self { visibility, policy }
    }

    pub fn visibility(&self) -> &ErrorVisibility {
        &self.visibility
    }

    pub fn policy(&self) -> &StatusPolicy {
        &self.policy
    }

    /// Build the error record for `fault` raised while serving `path`.
    ///
    /// Pure: the same inputs always produce the same record.
    pub fn normalize(&self, fault: &Fault, path: &str, requested: RequestedAttributes) -> ErrorRecord {
        let status = self.policy.resolve(fault);

        let message = self
            .visibility
            .include_message
            .includes(requested.message)
            .then(|| self.message(fault, status));

        let trace = self
            .visibility
            .include_stacktrace
            .includes(requested.trace)
            .then(|| fault.trace());

        let errors = match fault {
            Fault::Validation { violations, .. }
                if self
                    .visibility
                    .include_binding_errors
                    .includes(requested.errors) =>
            {
                Some(violations.iter().map(FieldError::from).collect())
            }
            _ => None,
        };

        ErrorRecord {
            status: status.as_u16(),
            error: reason_phrase(status).to_string(),
            exception: self
                .visibility
                .include_exception
                .then(|| fault.kind().to_string()),
            trace,
            message,
            errors,
            path: path.to_string(),
        }
    }

    fn message(&self, fault: &Fault, status: StatusCode) -> String {
        match fault {
            Fault::Authentication(_) | Fault::Authorization(_)
                if self.policy.auth_message == AuthMessage::ReasonPhrase =>
            {
                reason_phrase(status).to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Error-page middleware: replaces the body of any failed response with the
/// normalized JSON record for the original request path.
///
/// Responses without a fault (framework rejections such as `405`) are treated
/// as declared faults for their own status. Basic challenges carrying
/// `WWW-Authenticate` pass through untouched.
pub async fn error_attributes(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_owned();
    let requested = RequestedAttributes::from_uri(request.uri());

    let mut response = next.run(request).await;
    let fault = match response.extensions_mut().remove::<FaultSlot>() {
        Some(FaultSlot(fault)) => fault,
        None => match unhandled_failure(&response) {
            Some(fault) => Arc::new(fault),
            None => return response,
        },
    };

    let record = state.normalizer.normalize(&fault, &path, requested);
    if record.status >= 500 {
        tracing::error!(
            path = %path,
            status = record.status,
            kind = fault.kind(),
            causes = ?fault.causes(),
            "Request failed: {}",
            fault
        );
    } else {
        tracing::debug!(
            path = %path,
            status = record.status,
            kind = fault.kind(),
            "Request rejected: {}",
            fault
        );
    }

    let body = match serde_json::to_vec(&record) {
        Ok(body) => body,
        Err(err) => {
            tracing::error!("Failed to serialize error record: {}", err);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let status = StatusCode::from_u16(record.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let (mut parts, _) = response.into_parts();
    parts.status = status;
    parts
        .headers
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    parts.headers.remove(CONTENT_LENGTH);

    Response::from_parts(parts, Body::from(body))
}

/// Fault for a failed response that no handler classified
fn unhandled_failure(response: &Response) -> Option<Fault> {
    let status = response.status();
    let failed = status.is_client_error() || status.is_server_error();
    if !failed || response.headers().contains_key(WWW_AUTHENTICATE) {
        return None;
    }
    Some(Fault::declared(status, reason_phrase(status)))
}
