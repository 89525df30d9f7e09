//! Render invoices described by URL query parameters and print them to PDF
//!
//! This crate turns a query string such as
//! `Factura=Factura:%20001&columna=Producto&columna=Precio&Producto=Café,Té&Precio=2,1&Total=3`
//! into the invoice page's HTML, and prints a page URL to an A4 PDF using headless Chrome driven
//! through WebDriver (chromedriver). The HTTP surface lives in the `factura-pdf-server` crate.
//!
//! # Example
//!
//! ```rust
//! use factura_pdf::{QueryParams, ViewOptions, render_page, setup_template_env};
//!
//! let env = setup_template_env(None).unwrap();
//! let query = QueryParams::parse("Fecha=01-02-2025&Total=3.48");
//! let html = render_page(&env, &query, &ViewOptions::default()).unwrap();
//! assert!(html.contains("id=\"total-line\""));
//! ```

pub mod chromedriver;
pub mod error;
pub mod filename;
pub mod invoice;
pub mod job;
pub mod params;
pub mod printer;
pub mod template_env;

use std::sync::Arc;

pub use chromedriver::ChromeDriver;
pub use error::{AddContext, Error, ErrorKind};
pub use filename::{DEFAULT_PDF_FILENAME, sanitize_pdf_filename};
pub use invoice::{InvoiceView, ViewOptions, ViewOptionsBuilder, ViewOptionsBuilderError};
pub use job::{Cancellation, Canceller, JobState, PdfJob, cancellation};
pub use params::{DataLine, InvoiceParams, QueryParams, Table};
pub use printer::{
    PdfPrinter, WebDriverConfig, WebDriverConfigBuilder, WebDriverConfigBuilderError,
    WebDriverPrinter,
};
pub use template_env::{PDF_ENDPOINT, setup_template_env};

use minijinja::Environment;
use tracing::debug;

use crate::template_env::{ClientConfig, PageContext, render_template};

/// Render the invoice page for a query string
///
/// # Arguments
///
/// - `env`: template environment from [`setup_template_env`]
/// - `query`: the page's query parameters
/// - `options`: inputs that do not come from the query, such as the print timestamp
///
/// # Errors
///
/// Returns `Err(crate::Error)` if the template fails to render
pub fn render_page(
    env: &Environment<'static>,
    query: &QueryParams,
    options: &ViewOptions,
) -> Result<String, Error> {
    let params = InvoiceParams::from(query);
    let view = InvoiceView::new(&params, options);
    debug!(
        columns = params.table.columns().len(),
        rows = params.table.row_count(),
        printing = params.printing,
        "rendering invoice page"
    );
    render_template(
        env,
        &PageContext {
            view: &view,
            client: ClientConfig::new(query, &params),
        },
    )
    .map_err(Error::from)
    .add_context("rendering invoice page")
}

/// Print the page at `page_url` to PDF bytes
///
/// This runs a [`PdfJob`] to completion. Dropping the returned future cancels the job, which
/// still closes the browser session.
///
/// # Errors
///
/// Returns `Err(crate::Error)` if any step fails:
/// - connecting to the WebDriver server
/// - navigating to the page or waiting for it to settle
/// - printing the page
pub async fn generate_pdf(
    printer: Arc<dyn PdfPrinter>,
    page_url: &str,
) -> Result<Arc<[u8]>, Error> {
    PdfJob::new(printer, page_url)
        .run()
        .await
        .add_context("generating pdf")
}
