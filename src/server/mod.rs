//! HTTP surface: the presentation page, the JSON actions and the download
//! endpoints.

pub mod routes_download;
pub mod routes_images;

use crate::app::App;
use crate::models::ActionResponse;
use crate::Error;
use anyhow::{Context, Result};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;

/// Router state: the application, shared by every handler.
pub type SharedApp = Arc<App>;

pub fn create_router(app: SharedApp, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .merge(routes_download::download_routes())
        .merge(routes_images::image_routes(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(app)
}

async fn index() -> Html<&'static str> {
    Html(include_str!("index.html"))
}

async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

/// HTTP status for each error kind.
pub fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        Error::Image(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Error returned by the JSON actions; renders as a failed [`ActionResponse`].
#[derive(Debug)]
pub struct ActionError(pub Error);

impl From<Error> for ActionError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ActionError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!("Action failed: {}", self.0);
        } else {
            tracing::warn!("Action rejected: {}", self.0);
        }
        (status, Json(ActionResponse::<()>::failed(self.0.to_string()))).into_response()
    }
}

pub async fn start_server(bind_addr: &str, app: SharedApp, max_upload_bytes: usize) -> Result<()> {
    let addr: SocketAddr = bind_addr
        .parse()
        .with_context(|| format!("Invalid bind address: {}", bind_addr))?;

    let router = create_router(app, max_upload_bytes);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
