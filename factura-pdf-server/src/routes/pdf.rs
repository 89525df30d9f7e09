//! PDF conversion handlers.
//!
//! Both trigger paths, GET with the page's query string and the page's speculative POST, end in
//! one [`PdfJob`] that prints the page itself with the printing marker set. The job is owned by
//! the handler future, so a client that disconnects cancels the job and its browser session.

use axum::{
    Json,
    body::Body,
    extract::{RawQuery, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header},
    response::Response,
};
use factura_pdf::{PdfJob, QueryParams, sanitize_pdf_filename};
use serde::Deserialize;
use tracing::{error, info};

use super::{RouteResult, check_table};
use crate::state::AppState;

pub const PDF_ERROR_MESSAGE: &str = "An error occurred while generating the PDF.";

/// Body of the speculative generation request.
#[derive(Debug, Deserialize)]
pub struct PdfRequest {
    /// URL-encoded query string of the page
    pub params: Option<String>,
}

/// Handle GET /api/generar-pdf - print the page for this query string.
pub async fn pdf_from_query(
    State(state): State<AppState>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> RouteResult<Response> {
    let query = QueryParams::parse(query.as_deref().unwrap_or(""));
    convert(&state, &headers, &query).await
}

/// Handle POST /api/generar-pdf - print the page for the query string in the JSON body.
pub async fn pdf_from_body(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<PdfRequest>, JsonRejection>,
) -> RouteResult<Response> {
    let params = match body {
        Ok(Json(PdfRequest {
            params: Some(params),
        })) if !params.trim().is_empty() => params,
        Ok(_) => return Err((StatusCode::BAD_REQUEST, String::from("Missing params"))),
        Err(rejection) => return Err((StatusCode::BAD_REQUEST, rejection.body_text())),
    };
    convert(&state, &headers, &QueryParams::parse(&params)).await
}

async fn convert(state: &AppState, headers: &HeaderMap, query: &QueryParams) -> RouteResult<Response> {
    check_table(state, query)?;
    let filename = sanitize_pdf_filename(query.get("filename"));
    let url = page_url(state, headers, query);
    info!(%url, %filename, "generating pdf");

    let pdf = PdfJob::new(state.printer(), url)
        .run()
        .await
        .map_err(|e| {
            error!(error = %e, "pdf generation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                String::from(PDF_ERROR_MESSAGE),
            )
        })?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/pdf")
        .header(
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"{filename}\""),
        )
        .body(Body::from(pdf.to_vec()))
        .map_err(|e| {
            error!(error = %e, "failed to build pdf response");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                String::from(PDF_ERROR_MESSAGE),
            )
        })
}

/// URL of this server's page for `query`, as the headless browser should load it
pub fn page_url(state: &AppState, headers: &HeaderMap, query: &QueryParams) -> String {
    let base = match &state.config().public_base_url {
        Some(url) => url.as_str().trim_end_matches('/').to_string(),
        None => {
            let proto = headers
                .get("x-forwarded-proto")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .unwrap_or("http");
            let host = headers
                .get(header::HOST)
                .and_then(|v| v.to_str().ok())
                .unwrap_or(&state.config().fallback_host);
            format!("{proto}://{host}")
        }
    };
    format!("{base}/?{}", query.for_printing().to_query_string())
}
