//! Printing pages to PDF through a WebDriver-controlled headless Chrome.
//!
//! Every call to [`PdfPrinter::print`] opens its own WebDriver session, which makes chromedriver
//! launch a fresh browser process, and closes it again on every exit path.

use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use derive_builder::Builder;
use fantoccini::{
    Client, ClientBuilder,
    wd::{PrintConfiguration, PrintConfigurationBuilder, PrintMargins, PrintSize, TimeoutConfiguration},
};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::{
    error::{AddContext, Error},
    job::Cancellation,
};

/// Reports whether the document and its images have loaded, and how many resources the page
/// has requested so far
const IDLE_PROBE: &str = r#"
return {
    ready: document.readyState === 'complete'
        && Array.from(document.images).every(function (img) { return img.complete; }),
    resources: performance.getEntriesByType('resource').length
};"#;

/// Something that can turn a page URL into PDF bytes
#[async_trait]
pub trait PdfPrinter: Send + Sync {
    /// Print the page at `url`.
    ///
    /// Implementations must stop promptly once `cancel` fires and must release any browser they
    /// acquired before returning, whatever the outcome.
    async fn print(&self, url: &str, cancel: &Cancellation) -> Result<Vec<u8>, Error>;
}

pub fn default_chrome_args() -> Vec<String> {
    [
        "--headless",
        "--no-sandbox",
        "--disable-gpu",
        "--disable-dev-shm-usage",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Connection and print settings for [`WebDriverPrinter`]
#[derive(Debug, Clone, Builder)]
#[builder(setter(into), pattern = "owned")]
pub struct WebDriverConfig {
    #[builder(default = "String::from(\"http://localhost:4444\")")]
    webdriver_url: String,
    /// Chrome executable; chromedriver's own lookup is used when unset
    #[builder(default)]
    chrome_binary: Option<PathBuf>,
    #[builder(default = "default_chrome_args()")]
    chrome_args: Vec<String>,
    /// Upper bound for loading the page and waiting for the network to go idle
    #[builder(default = "Duration::from_secs(30)")]
    navigation_timeout: Duration,
    /// How long the page must stay without new requests to count as idle
    #[builder(default = "Duration::from_millis(500)")]
    idle_window: Duration,
    #[builder(default = "Duration::from_millis(100)")]
    poll_interval: Duration,
}

impl WebDriverConfig {
    pub fn webdriver_url(&self) -> &str {
        &self.webdriver_url
    }

    pub fn navigation_timeout(&self) -> Duration {
        self.navigation_timeout
    }

    fn capabilities(&self) -> Map<String, Value> {
        let mut chrome = Map::new();
        chrome.insert("args".to_string(), json!(self.chrome_args));
        if let Some(binary) = &self.chrome_binary {
            chrome.insert("binary".to_string(), json!(binary.to_string_lossy()));
        }
        let mut caps = Map::new();
        caps.insert("goog:chromeOptions".to_string(), Value::Object(chrome));
        caps
    }
}

/// A4 portrait with backgrounds; page margins in centimetres
pub fn print_configuration() -> Result<PrintConfiguration, Error> {
    PrintConfigurationBuilder::default()
        .size(PrintSize::A4)
        .background(true)
        .margins(PrintMargins {
            top: 1.0,
            left: 1.0,
            right: 1.0,
            bottom: 1.0,
        })
        .build()
        .map_err(Error::from)
        .add_context("configuring printer")
}

/// [`PdfPrinter`] backed by a WebDriver server such as chromedriver
pub struct WebDriverPrinter {
    config: WebDriverConfig,
}

impl WebDriverPrinter {
    pub fn new(config: WebDriverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WebDriverConfig {
        &self.config
    }

    async fn connect(&self) -> Result<Client, fantoccini::error::NewSessionError> {
        ClientBuilder::native()
            .capabilities(self.config.capabilities())
            .connect(&self.config.webdriver_url)
            .await
    }

    async fn navigate(&self, client: &Client, url: &str) -> Result<(), Error> {
        client
            .update_timeouts(TimeoutConfiguration::new(
                None,
                Some(self.config.navigation_timeout),
                None,
            ))
            .await
            .map_err(Error::from)
            .add_context("setting page load timeout")?;
        client
            .goto(url)
            .await
            .map_err(Error::from)
            .add_context("navigating to page")?;
        self.wait_for_network_idle(client)
            .await
            .add_context("waiting for network idle")
    }

    /// Poll the page until it has loaded and no new resources were requested for the idle window
    async fn wait_for_network_idle(&self, client: &Client) -> Result<(), Error> {
        let mut last_count = None;
        let mut quiet_since = Instant::now();
        loop {
            let probe = client.execute(IDLE_PROBE, Vec::new()).await?;
            let ready = probe["ready"].as_bool().unwrap_or(false);
            let count = probe["resources"].as_u64();
            if !ready || count != last_count {
                last_count = if ready { count } else { None };
                quiet_since = Instant::now();
            } else if quiet_since.elapsed() >= self.config.idle_window {
                return Ok(());
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    async fn capture(&self, client: &Client, url: &str) -> Result<Vec<u8>, Error> {
        match tokio::time::timeout(self.config.navigation_timeout, self.navigate(client, url)).await
        {
            Ok(navigated) => navigated?,
            Err(_) => {
                return Err(Error::timeout(&format!(
                    "page did not settle within {:?}",
                    self.config.navigation_timeout
                )));
            }
        }
        client
            .print(print_configuration()?)
            .await
            .map_err(Error::from)
            .add_context("capturing pdf")
    }
}

#[async_trait]
impl PdfPrinter for WebDriverPrinter {
    async fn print(&self, url: &str, cancel: &Cancellation) -> Result<Vec<u8>, Error> {
        debug!(url, webdriver = %self.config.webdriver_url, "opening webdriver session");
        let client = tokio::select! {
            client = self.connect() => client
                .map_err(Error::from)
                .add_context("connecting to webdriver")?,
            _ = cancel.cancelled() => {
                return Err(Error::cancelled().add_context("connecting to webdriver"));
            }
        };

        let result = tokio::select! {
            pdf = self.capture(&client, url) => pdf,
            _ = cancel.cancelled() => Err(Error::cancelled()),
        };

        if let Err(e) = client.close().await {
            warn!(error = %e, "failed to close webdriver session");
        } else {
            debug!("webdriver session closed");
        }
        result.add_context("printing pdf")
    }
}
