//! Page template rendering.
//!
//! The page, its stylesheet and its script are compiled into the binary. An override directory
//! can be given to replace any of them without rebuilding; files missing from that directory
//! still come from the embedded copies.

use std::path::Path;

use minijinja::{Environment, path_loader};
use serde::Serialize;

use crate::{
    filename::sanitize_pdf_filename,
    invoice::InvoiceView,
    params::{InvoiceParams, QueryParams},
};

pub const PAGE_TEMPLATE: &str = "page.html";

/// Path of the PDF endpoint the page's script posts to
pub const PDF_ENDPOINT: &str = "/api/generar-pdf";

fn embedded(name: &str) -> Option<&'static str> {
    match name {
        "page.html" => Some(include_str!("../templates/page.html")),
        "styles.css" => Some(include_str!("../templates/styles.css")),
        "script.js" => Some(include_str!("../templates/script.js")),
        _ => None,
    }
}

pub fn setup_template_env(
    override_dir: Option<&Path>,
) -> Result<Environment<'static>, minijinja::Error> {
    let mut env = Environment::new();
    match override_dir {
        Some(dir) => {
            let from_dir = path_loader(dir.to_path_buf());
            env.set_loader(move |name| match from_dir(name)? {
                Some(source) => Ok(Some(source)),
                None => Ok(embedded(name).map(str::to_string)),
            });
        }
        None => env.set_loader(|name| Ok(embedded(name).map(str::to_string))),
    }
    // Fail at startup rather than on the first request when an override does not parse
    env.get_template(PAGE_TEMPLATE)?;
    Ok(env)
}

/// Settings read by the page's script
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientConfig {
    pub endpoint: &'static str,
    /// Query string posted back for speculative generation
    pub query: String,
    pub filename: String,
    /// Start generating the PDF as soon as the page loads
    pub generate: bool,
    /// Rendered for the PDF endpoint; buttons and script are left out
    pub printing: bool,
    pub scroll_to_buttons: bool,
    pub share: bool,
}

impl ClientConfig {
    pub fn new(query: &QueryParams, params: &InvoiceParams) -> Self {
        Self {
            endpoint: PDF_ENDPOINT,
            query: query.to_query_string(),
            filename: sanitize_pdf_filename(params.filename.as_deref()),
            generate: !query.is_empty() && !params.printing,
            printing: params.printing,
            scroll_to_buttons: params.scroll_to.as_deref() == Some("buttons"),
            share: params.share,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PageContext<'a> {
    pub view: &'a InvoiceView,
    pub client: ClientConfig,
}

pub fn render_template(
    env: &Environment<'static>,
    context: &PageContext<'_>,
) -> Result<String, minijinja::Error> {
    env.get_template(PAGE_TEMPLATE)?.render(context)
}
