//! HTTP server implementation using Axum.

use crate::outcome::ExecutionResult;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn bad_request(message: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/execute", post(execute))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run the HTTP server on the given port with the provided state.
pub async fn run_server(port: u16, state: AppState) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    serve(listener, state).await
}

/// Serve on an already bound listener until Ctrl-C.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    info!("Starting HTTP server on {}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

async fn health() -> &'static str {
    "OK"
}

async fn execute(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ExecutionResult>, ApiError> {
    let Json(body) = payload.map_err(|rejection| match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            bad_request("Invalid request: Content-Type must be application/json")
        }
        _ => bad_request("Invalid JSON payload"),
    })?;

    let code = match body.get("code") {
        None | Some(Value::Null) => return Err(bad_request("Missing 'code' field in JSON payload")),
        Some(Value::String(code)) => code.clone(),
        Some(_) => return Err(bad_request("'code' field must be a string")),
    };
    info!("POST /execute - {} bytes of source", code.len());

    // Own task, so a dropped connection cannot abandon a running container.
    let executor = state.executor.clone();
    let result = tokio::spawn(async move { executor.execute(&code).await })
        .await
        .map_err(|e| {
            error!("Execution task failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    error: e.to_string(),
                }),
            )
        })?;

    info!("POST /execute - result: kind={:?}", result.kind);
    Ok(Json(result))
}
