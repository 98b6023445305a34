//! HTTP surface for the dashboard.
//!
//! Routes:
//! - `GET /` - dashboard page
//! - `GET /data` - `[{"Name": ..., "Sales": ...}]`, highest sales first
//! - `GET /health` - liveness and owner cache state

use crate::analysis::{aggregate_sales, SalesRules};
use crate::crm::{CrmSource, Fetched};
use crate::directory::OwnerDirectory;
use crate::models::{Completeness, ReportingPeriod, SalesRow};
use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info, warn};

/// Response header naming how complete the `/data` payload is.
pub const COMPLETENESS_HEADER: &str = "x-data-completeness";

const DASHBOARD_HTML: &str = include_str!("../static/index.html");

/// Shared state handed to every request.
#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn CrmSource>,
    pub directory: Arc<OwnerDirectory>,
    pub rules: Arc<SalesRules>,
    /// Answer 502 instead of `[]` when the deal fetch fails.
    pub surface_upstream_errors: bool,
}

/// Errors returned to HTTP callers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("upstream CRM request failed: {0}")]
    Upstream(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
        };
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (
            status,
            [(COMPLETENESS_HEADER, Completeness::Failed.as_str())],
            Json(body),
        )
            .into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(dashboard))
        .route("/data", get(sales_data))
        .route("/health", get(health))
        .with_state(state)
}

async fn dashboard() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

async fn sales_data(State(state): State<AppState>) -> Result<Response, ApiError> {
    let start = Instant::now();
    let period = ReportingPeriod::current();

    let result = aggregate_sales(
        state.source.as_ref(),
        &state.directory,
        &state.rules,
        period,
    )
    .await;
    let completeness = result.completeness();

    let rows: Vec<SalesRow> = match result {
        Fetched::Complete(rows) => rows,
        Fetched::Partial { data, pages, error } => {
            warn!(
                "Serving partial sales from {} deal pages: {}",
                pages, error
            );
            data
        }
        Fetched::Failed(error) => {
            match error.status() {
                Some(status) => error!("Deal aggregation failed with HTTP {}: {}", status, error),
                None => error!("Deal aggregation failed: {}", error),
            }
            if state.surface_upstream_errors {
                return Err(ApiError::Upstream(error.to_string()));
            }
            Vec::new()
        }
    };

    info!(
        "GET /data -> {} rows ({}) in {}ms",
        rows.len(),
        completeness,
        start.elapsed().as_millis()
    );

    Ok((
        [(COMPLETENESS_HEADER, completeness.as_str())],
        Json(rows),
    )
        .into_response())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    owners_cached: bool,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        owners_cached: state.directory.is_loaded(),
    })
}

/// Bind `host:port` and serve until Ctrl-C.
pub async fn serve(state: AppState, host: &str, port: u16) -> Result<()> {
    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .with_context(|| format!("failed to bind {}:{}", host, port))?;

    let addr = listener.local_addr().context("failed to read bound address")?;
    info!("Dashboard listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
