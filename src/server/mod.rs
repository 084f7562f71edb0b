use crate::config::Config;
use crate::conversion::ConversionService;
use crate::media::MediaStore;
use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{services::ServeDir, trace::TraceLayer};

pub mod auth;
pub mod pages;
pub mod routes_browse;
pub mod routes_upload;

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub conversion: Arc<ConversionService>,
    pub media: MediaStore,
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    // Always reachable
    let public_routes = Router::new()
        .route("/healthcheck", get(health_check))
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/logout", post(auth::logout));

    // Everything touching the media directory
    let protected_routes = Router::new()
        .route("/", get(routes_browse::index))
        .route(
            "/upload",
            get(routes_upload::upload_page).post(routes_upload::upload),
        )
        .route("/api/status", get(routes_browse::status))
        .fallback_service(ServeDir::new(ctx.media.root()));

    let protected_routes = if ctx.config.auth.enabled {
        protected_routes.layer(middleware::from_fn_with_state(
            ctx.clone(),
            auth::require_session,
        ))
    } else {
        protected_routes
    };

    public_routes
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(ctx.config.media.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

/// Start the HTTP server and run until Ctrl+C or SIGTERM
pub async fn start_server(ctx: AppContext) -> Result<()> {
    serve(ctx, shutdown_signal()).await
}

/// Start the HTTP server and run until `shutdown` resolves
pub async fn serve<F>(ctx: AppContext, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr: SocketAddr = format!("{}:{}", ctx.config.server.host, ctx.config.server.port)
        .parse()
        .context("Invalid server address")?;

    let app = create_router(ctx);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
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
