//! HTTP route handlers.
//!
//! Handlers return [`RouteResult`]; the error side renders as a plain-text body with its status.

pub mod page;
pub mod pdf;

use axum::{Json, http::StatusCode};
use factura_pdf::{QueryParams, Table};
use serde::Serialize;
use tracing::warn;

use crate::state::AppState;

pub type RouteResult<T> = Result<T, (StatusCode, String)>;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Handle GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Ragged tables are padded and logged, or rejected with 400 in strict mode
pub(crate) fn check_table(state: &AppState, query: &QueryParams) -> RouteResult<()> {
    let table = Table::from_params(query);
    let ragged = table.ragged_columns();
    if ragged.is_empty() {
        return Ok(());
    }
    if state.config().strict_tables {
        return table
            .check_rectangular()
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()));
    }
    warn!(
        columns = ?ragged,
        rows = table.row_count(),
        "ragged table columns padded with empty cells"
    );
    Ok(())
}
