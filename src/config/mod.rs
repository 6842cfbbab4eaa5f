//! Configuration loading for the fault normalizer service.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `FAULTS_`, producing a typed [`AppConfig`].

use std::{collections::BTreeMap, env, net::SocketAddr, path::PathBuf};

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{AuthMessage, ErrorNormalizer, ErrorVisibility, IncludeAttribute, StatusPolicy};

const ENV_PREFIX: &str = "FAULTS_";

/// Application configuration derived from `FAULTS_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_api_bind_addr")]
    pub api_bind_addr: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    /// Whether `message` is written into error records (default: always)
    #[serde(default = "default_error_include_message")]
    pub error_include_message: IncludeAttribute,
    /// Whether `trace` is written into error records (default: on_param)
    #[serde(default = "default_error_include_stacktrace")]
    pub error_include_stacktrace: IncludeAttribute,
    /// Whether `errors` is written into validation error records (default: never)
    #[serde(default = "default_error_include_binding_errors")]
    pub error_include_binding_errors: IncludeAttribute,
    #[serde(default)]
    pub error_include_exception: bool,
    /// Status for validation faults raised while binding request arguments (default: 400)
    #[serde(default = "default_argument_binding_validation_status")]
    pub argument_binding_validation_status: u16,
    /// Status for validation faults raised by validated methods (default: 500)
    #[serde(default = "default_method_validation_status")]
    pub method_validation_status: u16,
    #[serde(default = "default_auth_message")]
    pub auth_message: AuthMessage,
    /// Put every route behind HTTP Basic authentication
    #[serde(default)]
    pub security_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_user_password: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            api_bind_addr: default_api_bind_addr(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            error_include_message: default_error_include_message(),
            error_include_stacktrace: default_error_include_stacktrace(),
            error_include_binding_errors: default_error_include_binding_errors(),
            error_include_exception: false,
            argument_binding_validation_status: default_argument_binding_validation_status(),
            method_validation_status: default_method_validation_status(),
            auth_message: default_auth_message(),
            security_enabled: false,
            security_user_name: None,
            security_user_password: None,
        }
    }
}

impl AppConfig {
    /// Returns the configured bind address as a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.api_bind_addr.parse()
    }

    /// Returns a redacted JSON representation (secrets are redacted).
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let mut config = self.clone();
        if config.security_user_password.is_some() {
            config.security_user_password = Some("[REDACTED]".to_string());
        }
        serde_json::to_string_pretty(&config)
    }

    /// Visibility switches for the error normalizer.
    pub fn error_visibility(&self) -> ErrorVisibility {
        ErrorVisibility {
            include_message: self.error_include_message,
            include_stacktrace: self.error_include_stacktrace,
            include_binding_errors: self.error_include_binding_errors,
            include_exception: self.error_include_exception,
        }
    }

    /// Status policy for the error normalizer; codes outside 4xx/5xx fall back to 500.
    pub fn status_policy(&self) -> StatusPolicy {
        StatusPolicy {
            argument_binding_validation: error_status(self.argument_binding_validation_status),
            method_validation: error_status(self.method_validation_status),
            auth_message: self.auth_message,
        }
    }

    pub fn error_normalizer(&self) -> ErrorNormalizer {
        ErrorNormalizer::new(self.error_visibility(), self.status_policy())
    }

    /// Validates the configuration, returning an error if settings are inconsistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            (
                "ARGUMENT_BINDING_VALIDATION_STATUS",
                self.argument_binding_validation_status,
            ),
            ("METHOD_VALIDATION_STATUS", self.method_validation_status),
        ] {
            if !(400..=599).contains(&value) {
                return Err(ConfigError::InvalidErrorStatus {
                    field: field.to_string(),
                    value,
                });
            }
        }

        if self.security_enabled {
            if self.security_user_name.as_deref().is_none_or(str::is_empty) {
                return Err(ConfigError::MissingSecurityUserName);
            }
            if self.security_user_password.as_deref().is_none_or(str::is_empty) {
                return Err(ConfigError::MissingSecurityUserPassword);
            }
        }

        if !matches!(self.log_format.as_str(), "json" | "pretty") {
            return Err(ConfigError::InvalidLogFormat {
                value: self.log_format.clone(),
            });
        }

        Ok(())
    }
}

fn error_status(code: u16) -> StatusCode {
    StatusCode::from_u16(code)
        .ok()
        .filter(|status| status.is_client_error() || status.is_server_error())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_api_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_error_include_message() -> IncludeAttribute {
    IncludeAttribute::Always
}

fn default_error_include_stacktrace() -> IncludeAttribute {
    IncludeAttribute::OnParam
}

fn default_error_include_binding_errors() -> IncludeAttribute {
    IncludeAttribute::Never
}

fn default_argument_binding_validation_status() -> u16 {
    400
}

fn default_method_validation_status() -> u16 {
    500
}

fn default_auth_message() -> AuthMessage {
    AuthMessage::ReasonPhrase
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("invalid api bind address '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        source: std::net::AddrParseError,
    },
    #[error("{key} must be one of never, always, on_param; got '{value}'")]
    InvalidIncludeAttribute { key: String, value: String },
    #[error("{key} must be one of reason_phrase, original; got '{value}'")]
    InvalidAuthMessage { key: String, value: String },
    #[error("{key} must be a boolean, got '{value}'")]
    InvalidBool { key: String, value: String },
    #[error("{key} must be an HTTP status code, got '{value}'")]
    InvalidStatusNumber { key: String, value: String },
    #[error("{field} must be an error status between 400 and 599, got {value}")]
    InvalidErrorStatus { field: String, value: u16 },
    #[error("log format must be json or pretty, got '{value}'")]
    InvalidLogFormat { value: String },
    #[error("security is enabled but no user name is set; set FAULTS_SECURITY_USER_NAME")]
    MissingSecurityUserName,
    #[error("security is enabled but no password is set; set FAULTS_SECURITY_USER_PASSWORD")]
    MissingSecurityUserPassword,
}

fn parse_include_attribute(key: &str, value: &str) -> Result<IncludeAttribute, ConfigError> {
    match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
        "never" => Ok(IncludeAttribute::Never),
        "always" => Ok(IncludeAttribute::Always),
        "on_param" | "on_trace_param" => Ok(IncludeAttribute::OnParam),
        _ => Err(ConfigError::InvalidIncludeAttribute {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_auth_message(key: &str, value: &str) -> Result<AuthMessage, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "reason_phrase" => Ok(AuthMessage::ReasonPhrase),
        "original" => Ok(AuthMessage::Original),
        _ => Err(ConfigError::InvalidAuthMessage {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_status(key: &str, value: &str) -> Result<u16, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidStatusNumber {
            key: key.to_string(),
            value: value.to_string(),
        })
}

/// Loads configuration using layered `.env` files and `FAULTS_*` env vars.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Loads and validates the configuration.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        // Overlay process environment last so it wins.
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                layered.insert(stripped.to_string(), value);
            }
        }

        let mut take = |key: &str| layered.remove(key).filter(|v| !v.trim().is_empty());

        let profile = take("PROFILE").unwrap_or(profile_hint);
        let api_bind_addr = take("API_BIND_ADDR").unwrap_or_else(default_api_bind_addr);
        let log_level = take("LOG_LEVEL").unwrap_or_else(default_log_level);
        let log_format = take("LOG_FORMAT").unwrap_or_else(default_log_format);

        let error_include_message = take("ERROR_INCLUDE_MESSAGE")
            .map(|v| parse_include_attribute("FAULTS_ERROR_INCLUDE_MESSAGE", &v))
            .transpose()?
            .unwrap_or_else(default_error_include_message);
        let error_include_stacktrace = take("ERROR_INCLUDE_STACKTRACE")
            .map(|v| parse_include_attribute("FAULTS_ERROR_INCLUDE_STACKTRACE", &v))
            .transpose()?
            .unwrap_or_else(default_error_include_stacktrace);
        let error_include_binding_errors = take("ERROR_INCLUDE_BINDING_ERRORS")
            .map(|v| parse_include_attribute("FAULTS_ERROR_INCLUDE_BINDING_ERRORS", &v))
            .transpose()?
            .unwrap_or_else(default_error_include_binding_errors);
        let error_include_exception = take("ERROR_INCLUDE_EXCEPTION")
            .map(|v| parse_bool("FAULTS_ERROR_INCLUDE_EXCEPTION", &v))
            .transpose()?
            .unwrap_or(false);

        let argument_binding_validation_status = take("ARGUMENT_BINDING_VALIDATION_STATUS")
            .map(|v| parse_status("FAULTS_ARGUMENT_BINDING_VALIDATION_STATUS", &v))
            .transpose()?
            .unwrap_or_else(default_argument_binding_validation_status);
        let method_validation_status = take("METHOD_VALIDATION_STATUS")
            .map(|v| parse_status("FAULTS_METHOD_VALIDATION_STATUS", &v))
            .transpose()?
            .unwrap_or_else(default_method_validation_status);
        let auth_message = take("AUTH_MESSAGE")
            .map(|v| parse_auth_message("FAULTS_AUTH_MESSAGE", &v))
            .transpose()?
            .unwrap_or_else(default_auth_message);

        let security_enabled = take("SECURITY_ENABLED")
            .map(|v| parse_bool("FAULTS_SECURITY_ENABLED", &v))
            .transpose()?
            .unwrap_or(false);
        let security_user_name = take("SECURITY_USER_NAME").map(|v| v.trim().to_string());
        let security_user_password = take("SECURITY_USER_PASSWORD");

        let config = AppConfig {
            profile,
            api_bind_addr,
            log_level,
            log_format,
            error_include_message,
            error_include_stacktrace,
            error_include_binding_errors,
            error_include_exception,
            argument_binding_validation_status,
            method_validation_status,
            auth_message,
            security_enabled,
            security_user_name,
            security_user_password,
        };

        config.validate()?;

        match config.bind_addr() {
            Ok(_) => Ok(config),
            Err(source) => Err(ConfigError::InvalidBindAddr {
                value: config.api_bind_addr.clone(),
                source,
            }),
        }
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var(format!("{}PROFILE", ENV_PREFIX))
            .ok()
            .or_else(|| values.get("PROFILE").cloned())
            .unwrap_or_else(default_profile);

        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}", &profile)),
            &mut values,
        )?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}.local", &profile)),
            &mut values,
        )?;

        Ok((values, profile))
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                        values.insert(stripped.to_string(), value);
                    }
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
