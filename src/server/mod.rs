use crate::arr::ArrRegistry;
use crate::config::Config;
use crate::conversion::ConversionService;
use crate::paths::PathTranslator;
use crate::state::JobQueue;
use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderName, Method, StatusCode},
    middleware,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod auth;
pub mod routes_api;
pub mod routes_webhook;

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub queue: Arc<JobQueue>,
    pub service: Arc<ConversionService>,
    pub config: Arc<Config>,
    pub arrs: ArrRegistry,
    pub paths: PathTranslator,
}

impl AppContext {
    pub fn new(queue: Arc<JobQueue>, service: Arc<ConversionService>, arrs: ArrRegistry) -> Self {
        let config = Arc::new(service.config().clone());
        let paths = service.paths().clone();
        Self {
            queue,
            service,
            config,
            arrs,
            paths,
        }
    }
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(auth::API_KEY_HEADER),
        ]);

    let protected_routes = routes_api::api_routes().merge(routes_webhook::webhook_routes());

    // Every route except /health requires the key when one is configured
    let protected_routes = if ctx.config.server.api_key().is_some() {
        protected_routes.layer(middleware::from_fn_with_state(
            ctx.clone(),
            auth::api_key_middleware,
        ))
    } else {
        protected_routes
    };

    Router::new()
        .route("/health", get(health_check))
        .merge(protected_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "remuxcode",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Map a job-store error onto an HTTP status.
pub(crate) fn store_error(error: remuxcode_common::Error) -> (StatusCode, String) {
    use remuxcode_common::Error;

    let status = match &error {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::Conflict(_) => StatusCode::CONFLICT,
        Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
        Error::Unauthorized => StatusCode::UNAUTHORIZED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, error.to_string())
}

/// Start the HTTP server and run until Ctrl-C or SIGTERM
pub async fn start_server(ctx: AppContext) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", ctx.config.server.host, ctx.config.server.port)
        .parse()
        .context("Invalid server address")?;

    if ctx.config.server.api_key().is_none() {
        tracing::warn!("No API key configured, authentication is disabled");
    }

    let app = create_router(ctx);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
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
