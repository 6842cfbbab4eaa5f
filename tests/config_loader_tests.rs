use fault_normalizer::config::ConfigLoader;
use fault_normalizer::error::{AuthMessage, IncludeAttribute};
use std::{
    env, fs,
    sync::{Mutex, MutexGuard, OnceLock},
};
use tempfile::TempDir;

const KEYS: &[&str] = &[
    "FAULTS_PROFILE",
    "FAULTS_API_BIND_ADDR",
    "FAULTS_LOG_LEVEL",
    "FAULTS_LOG_FORMAT",
    "FAULTS_ERROR_INCLUDE_MESSAGE",
    "FAULTS_ERROR_INCLUDE_STACKTRACE",
    "FAULTS_ERROR_INCLUDE_BINDING_ERRORS",
    "FAULTS_ERROR_INCLUDE_EXCEPTION",
    "FAULTS_ARGUMENT_BINDING_VALIDATION_STATUS",
    "FAULTS_METHOD_VALIDATION_STATUS",
    "FAULTS_AUTH_MESSAGE",
    "FAULTS_SECURITY_ENABLED",
    "FAULTS_SECURITY_USER_NAME",
    "FAULTS_SECURITY_USER_PASSWORD",
];

fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

fn env_guard() -> MutexGuard<'static, ()> {
    env_lock()
        .lock()
        .unwrap_or_else(|poison| poison.into_inner())
}

fn clear_env() {
    for key in KEYS {
        unsafe {
            env::remove_var(key);
        }
    }
}

fn write_env_file(dir: &TempDir, name: &str, contents: &str) {
    let path = dir.path().join(name);
    fs::write(path, contents).unwrap();
}

fn loader_for(dir: &TempDir) -> ConfigLoader {
    ConfigLoader::with_base_dir(dir.path().to_path_buf())
}

#[test]
fn loads_defaults_when_no_env_present() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    let cfg = loader_for(&temp_dir)
        .load()
        .expect("config loads with defaults");

    assert_eq!(cfg.profile, "local");
    assert_eq!(cfg.api_bind_addr, "0.0.0.0:8080");
    assert_eq!(cfg.log_level, "info");
    assert_eq!(cfg.error_include_message, IncludeAttribute::Always);
    assert_eq!(cfg.error_include_stacktrace, IncludeAttribute::OnParam);
    assert_eq!(cfg.error_include_binding_errors, IncludeAttribute::Never);
    assert!(!cfg.error_include_exception);
    assert_eq!(cfg.argument_binding_validation_status, 400);
    assert_eq!(cfg.method_validation_status, 500);
    assert_eq!(cfg.auth_message, AuthMessage::ReasonPhrase);
    assert!(!cfg.security_enabled);
    cfg.bind_addr().expect("default bind addr parses");
    clear_env();
}

#[test]
fn layered_env_files_apply_in_order() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(&temp_dir, ".env", "FAULTS_API_BIND_ADDR=127.0.0.1:3000\n");
    write_env_file(
        &temp_dir,
        ".env.test",
        "FAULTS_API_BIND_ADDR=192.168.0.10:5000\nFAULTS_ERROR_INCLUDE_STACKTRACE=always\n",
    );
    write_env_file(
        &temp_dir,
        ".env.test.local",
        "FAULTS_API_BIND_ADDR=10.0.0.5:6000\n",
    );

    // Select profile via .env.local before profile-specific files load.
    write_env_file(
        &temp_dir,
        ".env.local",
        "FAULTS_PROFILE=test\nFAULTS_API_BIND_ADDR=127.0.0.1:4000\n",
    );

    let cfg = loader_for(&temp_dir)
        .load()
        .expect("config loads with layered env files");

    assert_eq!(cfg.profile, "test");
    assert_eq!(cfg.api_bind_addr, "10.0.0.5:6000");
    assert_eq!(cfg.error_include_stacktrace, IncludeAttribute::Always);
    clear_env();
}

#[test]
fn os_environment_has_highest_precedence() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(
        &temp_dir,
        ".env",
        "FAULTS_API_BIND_ADDR=127.0.0.1:3000\nFAULTS_METHOD_VALIDATION_STATUS=422\n",
    );

    unsafe {
        env::set_var("FAULTS_API_BIND_ADDR", "0.0.0.0:9090");
    }

    let cfg = loader_for(&temp_dir)
        .load()
        .expect("config loads with env override");
    assert_eq!(cfg.api_bind_addr, "0.0.0.0:9090");
    assert_eq!(cfg.method_validation_status, 422);

    clear_env();
}

#[test]
fn invalid_bind_addr_returns_error() {
    let _guard = env_guard();
    clear_env();

    unsafe {
        env::set_var("FAULTS_API_BIND_ADDR", "not-an-addr");
    }
    let temp_dir = TempDir::new().unwrap();
    let err = loader_for(&temp_dir)
        .load()
        .expect_err("invalid bind addr should fail");
    assert!(format!("{}", err).contains("invalid api bind address"));

    clear_env();
}

#[test]
fn error_attribute_settings_are_parsed() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(
        &temp_dir,
        ".env",
        "FAULTS_ERROR_INCLUDE_MESSAGE=never\n\
         FAULTS_ERROR_INCLUDE_BINDING_ERRORS=on-trace-param\n\
         FAULTS_ERROR_INCLUDE_EXCEPTION=true\n\
         FAULTS_AUTH_MESSAGE=original\n",
    );

    let cfg = loader_for(&temp_dir).load().expect("config loads");
    assert_eq!(cfg.error_include_message, IncludeAttribute::Never);
    assert_eq!(cfg.error_include_binding_errors, IncludeAttribute::OnParam);
    assert!(cfg.error_include_exception);
    assert_eq!(cfg.auth_message, AuthMessage::Original);

    clear_env();
}

#[test]
fn invalid_error_settings_are_rejected() {
    let _guard = env_guard();
    let temp_dir = TempDir::new().unwrap();

    for (key, value, expected) in [
        ("FAULTS_ERROR_INCLUDE_STACKTRACE", "sometimes", "must be one of never"),
        ("FAULTS_METHOD_VALIDATION_STATUS", "abc", "must be an HTTP status code"),
        ("FAULTS_METHOD_VALIDATION_STATUS", "200", "between 400 and 599"),
        ("FAULTS_AUTH_MESSAGE", "loud", "must be one of reason_phrase"),
        ("FAULTS_LOG_FORMAT", "xml", "log format must be json or pretty"),
    ] {
        clear_env();
        unsafe {
            env::set_var(key, value);
        }

        let err = loader_for(&temp_dir)
            .load()
            .expect_err("invalid setting should fail");
        assert!(
            err.to_string().contains(expected),
            "{} = {} produced '{}'",
            key,
            value,
            err
        );
    }

    clear_env();
}

#[test]
fn security_requires_credentials() {
    let _guard = env_guard();
    clear_env();

    unsafe {
        env::set_var("FAULTS_SECURITY_ENABLED", "true");
    }
    let temp_dir = TempDir::new().unwrap();
    let err = loader_for(&temp_dir)
        .load()
        .expect_err("missing user should fail");
    assert!(err.to_string().contains("FAULTS_SECURITY_USER_NAME"));

    unsafe {
        env::set_var("FAULTS_SECURITY_USER_NAME", "username");
        env::set_var("FAULTS_SECURITY_USER_PASSWORD", "password");
    }
    let cfg = loader_for(&temp_dir).load().expect("secured config loads");
    assert!(cfg.security_enabled);
    assert!(!cfg.redacted_json().unwrap().contains("\"password\""));

    clear_env();
}
