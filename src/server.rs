//! # Server Configuration
//!
//! Router assembly and startup for the fault normalizer service.

use std::sync::Arc;

use axum::{Router, middleware, routing::get};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::auth;
use crate::config::AppConfig;
use crate::error::{self, ErrorNormalizer};
use crate::handlers;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub normalizer: Arc<ErrorNormalizer>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let normalizer = Arc::new(config.error_normalizer());
        Self {
            config: Arc::new(config),
            normalizer,
        }
    }
}

/// Creates and configures the Axum application router.
///
/// With security enabled every demo route, including unmatched paths, sits
/// behind Basic authentication and the security controller replaces the
/// exception controller.
pub fn create_app(state: AppState) -> Router {
    let demo = Router::new().merge(handlers::validation::routes());

    let demo = if state.config.security_enabled {
        demo.merge(handlers::security::routes())
            .fallback(handlers::fallback)
            .layer(middleware::from_fn_with_state(
                state.clone(),
                auth::basic_auth_middleware,
            ))
    } else {
        demo.merge(handlers::exception::routes())
            .fallback(handlers::fallback)
    };

    Router::new()
        .route("/", get(handlers::root))
        .route("/openapi.json", get(handlers::openapi))
        .merge(demo)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            error::error_attributes,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Starts the server with the given configuration
pub async fn run_server(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    // Resolve the configured bind address
    let addr = config
        .bind_addr()
        .map_err(|e| format!("Invalid server address: {}", e))?;

    let profile = config.profile.clone();
    let app = create_app(AppState::new(config));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, %profile, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::exception::get_specific_exception,
        crate::handlers::validation::do_post_without_validation,
        crate::handlers::validation::do_post_with_validation,
        crate::handlers::validation::some_get_method,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::models::TestRequestBody,
            crate::error::ErrorRecord,
            crate::error::FieldError,
        )
    ),
    info(
        title = "Fault Normalizer",
        description = "Demo controllers for the default JSON error-handling pipeline",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
