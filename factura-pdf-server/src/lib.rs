//! # HTTP server for the invoice page and its PDF endpoint
//!
//! Serves the invoice page rendered from the query string and prints it to PDF on demand.
//!
//! ## Usage
//!
//! ```bash
//! factura-pdf serve --listen 0.0.0.0:3000 --spawn-chromedriver
//! ```
//!
//! Then open `http://localhost:3000/?Factura=Factura:%20001&Total=10` in a browser.

pub mod routes;
pub mod state;

use std::future::Future;

use axum::{Router, routing::get};
use factura_pdf::PDF_ENDPOINT;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

pub use state::{AppState, Clock, ServerConfig};

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::page::invoice_page))
        .route(
            PDF_ENDPOINT,
            get(routes::pdf::pdf_from_query).post(routes::pdf::pdf_from_body),
        )
        .route("/health", get(routes::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the router on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
