//! Test utilities for running the service over real sockets.
//!
//! Spawns the full router on an ephemeral port and shuts it down gracefully
//! when the handle is dropped or explicitly shut down.

use anyhow::{Context, Result};
use fault_normalizer::{
    config::AppConfig,
    server::{AppState, create_app},
};
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};

pub struct TestServerHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    join_handle: Option<JoinHandle<Result<()>>>,
}

impl TestServerHandle {
    fn new(shutdown_tx: oneshot::Sender<()>, join_handle: JoinHandle<Result<()>>) -> Self {
        Self {
            shutdown_tx: Some(shutdown_tx),
            join_handle: Some(join_handle),
        }
    }

    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(handle) = self.join_handle.take() {
            let result = handle.await.context("server task join failed")?;
            result?;
        }

        Ok(())
    }
}

impl Drop for TestServerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Spawn the application on `127.0.0.1:0` and return its base URL
pub async fn spawn_test_app(config: AppConfig) -> (String, TestServerHandle) {
    let app = create_app(AppState::new(config));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server_url = format!("http://{}", addr);

    let (ready_tx, ready_rx) = oneshot::channel();
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let server_task = tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });

        let _ = ready_tx.send(());

        server.await.context("axum server error")
    });

    ready_rx.await.expect("server task to signal readiness");

    (server_url, TestServerHandle::new(shutdown_tx, server_task))
}

/// Configuration with Basic authentication for `username` / `password`
#[allow(dead_code)]
pub fn secured_config() -> AppConfig {
    AppConfig {
        security_enabled: true,
        security_user_name: Some("username".to_string()),
        security_user_password: Some("password".to_string()),
        ..Default::default()
    }
}
