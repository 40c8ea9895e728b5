use std::any::Any;
use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::from_fn_with_state;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::errors::{ApiError, MAX_BODY_BYTES};
use crate::middleware::{authenticate, collect_metrics, metrics_handler, rate_limit};
use crate::movies;
use crate::state::AppState;
use crate::tokens;
use crate::users;

/// Builds the full router with the middleware stack applied. Layer order
/// matters: panics are caught outermost, identity is resolved innermost so
/// every earlier layer runs even for unauthenticated requests.
pub fn build_app(state: AppState) -> Router {
    let v1 = Router::new()
        .route("/healthcheck", get(healthcheck))
        .merge(users::router())
        .merge(tokens::router())
        .merge(movies::router(state.clone()));

    Router::new()
        .nest("/v1", v1)
        .route("/debug/metrics", get(metrics_handler))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(
            ServiceBuilder::new()
                .layer(CatchPanicLayer::custom(handle_panic))
                .layer(TraceLayer::new_for_http())
                .layer(from_fn_with_state(state.clone(), collect_metrics))
                .layer(from_fn_with_state(state.clone(), rate_limit))
                .layer(cors_layer(&state.config))
                .layer(from_fn_with_state(state.clone(), authenticate)),
        )
        .with_state(state)
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_trusted_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::OPTIONS,
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Converts a handler panic into the standard 500 envelope. The connection
/// is closed afterwards since its state is unknown.
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    };
    error!(panic = %detail, "request handler panicked");

    let body = json!({
        "error": "the server encountered a problem and could not process your request"
    });
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONNECTION, "close")],
        Json(body),
    )
        .into_response()
}

async fn healthcheck(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "available",
        "system_info": {
            "environment": state.config.env.as_str(),
            "version": env!("CARGO_PKG_VERSION"),
        }
    }))
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

/// Binds the listener and serves until SIGINT or SIGTERM, then drains
/// background tasks with a bounded wait and closes the pool.
pub async fn serve(app: Router, state: AppState) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, env = %state.config.env, "starting server");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("shutting down, waiting for background tasks");
    state.tasks.close();
    if tokio::time::timeout(Duration::from_secs(5), state.tasks.wait())
        .await
        .is_err()
    {
        warn!("background tasks did not finish in time");
    }
    state.db.close().await;
    info!("stopped server");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => error!(error = %err, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
