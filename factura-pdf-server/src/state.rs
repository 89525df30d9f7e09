//! Server state and configuration.

use std::{path::PathBuf, sync::Arc};

use chrono::{DateTime, FixedOffset, Local};
use factura_pdf::{AddContext, Error, PdfPrinter, ViewOptions, ViewOptionsBuilder, setup_template_env};
use minijinja::Environment;
use url::Url;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Base URL the headless browser uses to reach this server. When unset it is rebuilt from
    /// the request's `X-Forwarded-Proto` and `Host` headers.
    pub public_base_url: Option<Url>,
    /// Host (and port) used when a request carries no `Host` header
    pub fallback_host: String,
    /// Logo shown when `Logo1` is absent
    pub default_logo: Option<String>,
    /// Reject tables whose columns have different lengths instead of padding them
    pub strict_tables: bool,
    /// Directory overriding the embedded page templates
    pub template_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            public_base_url: None,
            fallback_host: String::from("localhost:3000"),
            default_logo: Some(factura_pdf::invoice::DEFAULT_LOGO_URL.to_string()),
            strict_tables: false,
            template_dir: None,
        }
    }
}

/// Source of the print timestamp stamped into each rendered page
pub type Clock = Arc<dyn Fn() -> DateTime<FixedOffset> + Send + Sync>;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    templates: Environment<'static>,
    printer: Arc<dyn PdfPrinter>,
    clock: Clock,
}

impl AppState {
    /// Create the state, loading and checking the page template
    pub fn new(config: ServerConfig, printer: Arc<dyn PdfPrinter>) -> Result<Self, Error> {
        Self::with_clock(config, printer, Arc::new(|| Local::now().fixed_offset()))
    }

    /// Like [`AppState::new`], reading the print timestamp from `clock`
    pub fn with_clock(
        config: ServerConfig,
        printer: Arc<dyn PdfPrinter>,
        clock: Clock,
    ) -> Result<Self, Error> {
        let templates = setup_template_env(config.template_dir.as_deref())
            .map_err(Error::from)
            .add_context("loading page templates")?;
        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                templates,
                printer,
                clock,
            }),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    pub fn templates(&self) -> &Environment<'static> {
        &self.inner.templates
    }

    pub fn printer(&self) -> Arc<dyn PdfPrinter> {
        Arc::clone(&self.inner.printer)
    }

    /// View options for a render happening now. The footer timestamp comes from the state's
    /// clock, so renders of the same query only match while the clock reads the same minute.
    pub fn view_options(&self) -> ViewOptions {
        ViewOptionsBuilder::default()
            .default_logo(self.inner.config.default_logo.clone())
            .printed_at((self.inner.clock)())
            .build()
            .unwrap_or_default()
    }
}
