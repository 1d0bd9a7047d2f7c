use std::future::Future;
use std::net::SocketAddr;

use anyhow::Context;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;

use super::handlers::{
    handle_cancel_task, handle_clear, handle_get_task, handle_health, handle_queue, handle_run,
    AppState,
};
use super::middleware::request_context;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/run", post(handle_run))
        .route("/task/:id", get(handle_get_task).delete(handle_cancel_task))
        .route("/queue", get(handle_queue).delete(handle_clear))
        .layer(from_fn_with_state(state.clone(), request_context))
        .with_state(state)
}

pub struct QueueServer {
    pub port: u16,
    pub state: AppState,
}

impl QueueServer {
    pub fn new(port: u16, state: AppState) -> Self {
        Self { port, state }
    }

    /// Serves until `shutdown` resolves, then lets in-flight requests finish.
    pub async fn start<F>(&self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = build_router(self.state.clone());
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        axum::Server::try_bind(&addr)
            .with_context(|| format!("failed to bind queue server on {addr}"))?
            .serve(app.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await
            .context("queue server exited unexpectedly")
    }
}
