use std::{
    fs,
    io::{self, Read},
    net::SocketAddr,
    path::PathBuf,
    time::Duration,
};

use clap::{Args, Parser, Subcommand};
use factura_pdf::{
    AddContext, WebDriverConfig, WebDriverConfigBuilder, invoice::DEFAULT_LOGO_URL,
    printer::default_chrome_args,
};
use factura_pdf_server::ServerConfig;
use url::Url;

fn read_until_eof() -> io::Result<String> {
    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;
    Ok(input)
}

#[derive(Debug, Parser)]
#[command(name = "factura-pdf", version, about = "Invoice page and PDF printing server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server
    Serve(ServeArgs),
    /// Print one invoice to PDF without running a long-lived server
    Print(PrintArgs),
    /// Write the invoice page HTML to stdout
    Render(RenderArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, env = "FACTURA_LISTEN", default_value = "127.0.0.1:3000")]
    pub listen: SocketAddr,

    /// Base URL the headless browser uses to reach this server, e.g. behind a proxy
    #[arg(long, env = "FACTURA_PUBLIC_URL")]
    pub public_url: Option<Url>,

    #[command(flatten)]
    pub page: PageArgs,

    #[command(flatten)]
    pub browser: BrowserArgs,
}

#[derive(Debug, Args)]
pub struct PrintArgs {
    /// Query string of the invoice; read from stdin when omitted
    #[arg(short, long)]
    pub query: Option<String>,

    /// File or directory where the PDF should be saved; stdout when omitted
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    #[command(flatten)]
    pub page: PageArgs,

    #[command(flatten)]
    pub browser: BrowserArgs,
}

#[derive(Debug, Args)]
pub struct RenderArgs {
    /// Query string of the invoice; read from stdin when omitted
    #[arg(short, long)]
    pub query: Option<String>,

    #[command(flatten)]
    pub page: PageArgs,
}

#[derive(Debug, Args)]
pub struct PageArgs {
    /// Directory with page.html, styles.css or script.js overriding the embedded ones
    #[arg(long, env = "FACTURA_TEMPLATE_DIR")]
    pub template_dir: Option<PathBuf>,

    /// Logo shown when the query has no Logo1 parameter
    #[arg(long, env = "FACTURA_DEFAULT_LOGO", default_value = DEFAULT_LOGO_URL)]
    pub default_logo: String,

    /// Show no logo when the query has no Logo1 parameter
    #[arg(long, conflicts_with = "default_logo")]
    pub no_default_logo: bool,

    /// Reject tables whose columns have different lengths
    #[arg(long, env = "FACTURA_STRICT_TABLES")]
    pub strict_tables: bool,
}

#[derive(Debug, Args)]
pub struct BrowserArgs {
    /// WebDriver endpoint to connect to
    #[arg(long, env = "FACTURA_WEBDRIVER_URL", default_value = "http://localhost:4444")]
    pub webdriver_url: String,

    /// Start chromedriver as a child process instead of connecting to a running one
    #[arg(long, env = "FACTURA_SPAWN_CHROMEDRIVER")]
    pub spawn_chromedriver: bool,

    /// chromedriver executable used with --spawn-chromedriver
    #[arg(long, env = "CHROMEDRIVER", default_value = "chromedriver")]
    pub chromedriver_path: PathBuf,

    /// Port for the spawned chromedriver
    #[arg(long, env = "FACTURA_CHROMEDRIVER_PORT", default_value_t = 4444)]
    pub chromedriver_port: u16,

    /// Chrome executable; chromedriver's own lookup is used when unset
    #[arg(long, env = "CHROME_BIN")]
    pub chrome_binary: Option<PathBuf>,

    /// Extra Chrome arguments, comma separated; replaces the headless defaults
    #[arg(
        long,
        env = "FACTURA_CHROME_ARGS",
        value_delimiter = ',',
        allow_hyphen_values = true
    )]
    pub chrome_args: Vec<String>,

    /// Seconds allowed for loading the page and waiting for the network to go idle
    #[arg(long, env = "FACTURA_NAVIGATION_TIMEOUT", default_value_t = 30)]
    pub navigation_timeout: u64,
}

impl PageArgs {
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            default_logo: (!self.no_default_logo).then(|| self.default_logo.clone()),
            strict_tables: self.strict_tables,
            template_dir: self.template_dir.clone(),
            ..ServerConfig::default()
        }
    }
}

impl BrowserArgs {
    /// Printer settings for a WebDriver server at `webdriver_url`
    pub fn printer_config(&self, webdriver_url: String) -> Result<WebDriverConfig, factura_pdf::Error> {
        let chrome_args = if self.chrome_args.is_empty() {
            default_chrome_args()
        } else {
            self.chrome_args.clone()
        };
        WebDriverConfigBuilder::default()
            .webdriver_url(webdriver_url)
            .chrome_binary(self.chrome_binary.clone())
            .chrome_args(chrome_args)
            .navigation_timeout(Duration::from_secs(self.navigation_timeout))
            .build()
            .map_err(|e| factura_pdf::Error::from(e.to_string()))
            .add_context("configuring printer")
    }
}

/// Query string from `--query`, or from stdin
pub fn read_query(query: &Option<String>) -> Result<String, factura_pdf::Error> {
    match query {
        Some(query) => Ok(query.clone()),
        None => Ok(read_until_eof()
            .map_err(factura_pdf::Error::from)
            .add_context("reading query string from stdin")?
            .trim()
            .to_string()),
    }
}

/// Where `print` writes the PDF: a file, a file named after the invoice in a directory, or stdout
pub fn output_path(out: &Option<PathBuf>, filename: &str) -> Option<PathBuf> {
    out.as_ref().map(|out| match fs::metadata(out) {
        Ok(meta) if meta.is_dir() => out.join(filename),
        _ => out.clone(),
    })
}
