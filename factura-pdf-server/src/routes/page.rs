use axum::{
    extract::{RawQuery, State},
    http::StatusCode,
    response::Html,
};
use factura_pdf::{QueryParams, render_page};
use tracing::error;

use super::{RouteResult, check_table};
use crate::state::AppState;

/// Handle GET / - render the invoice page from the query string.
pub async fn invoice_page(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> RouteResult<Html<String>> {
    let query = QueryParams::parse(query.as_deref().unwrap_or(""));
    check_table(&state, &query)?;
    render_page(state.templates(), &query, &state.view_options())
        .map(Html)
        .map_err(|e| {
            error!(error = %e, "failed to render invoice page");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                String::from("An error occurred while rendering the invoice."),
            )
        })
}
