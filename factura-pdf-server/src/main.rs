use std::{
    io::Write,
    net::SocketAddr,
    path::PathBuf,
    sync::Arc,
};

use clap::Parser;
use factura_pdf::{
    AddContext, ChromeDriver, Error, PdfJob, PdfPrinter, QueryParams, Table, ViewOptionsBuilder,
    WebDriverPrinter, render_page, sanitize_pdf_filename, setup_template_env,
};
use factura_pdf_server::{AppState, ServerConfig, serve};
use tokio::{net::TcpListener, signal, sync::oneshot};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{BrowserArgs, Cli, Command, PrintArgs, RenderArgs, ServeArgs, output_path, read_query};

mod cli;

/// Spawn chromedriver if asked to, and build the printer that talks to it
fn start_browser(
    browser: &BrowserArgs,
) -> Result<(Option<ChromeDriver>, WebDriverPrinter), Error> {
    let driver = if browser.spawn_chromedriver {
        Some(
            ChromeDriver::start(&browser.chromedriver_path, browser.chromedriver_port)
                .add_context("starting browser")?,
        )
    } else {
        None
    };
    let webdriver_url = driver
        .as_ref()
        .map(ChromeDriver::url)
        .unwrap_or_else(|| browser.webdriver_url.clone());
    info!(webdriver = %webdriver_url, spawned = driver.is_some(), "using webdriver");
    let printer = WebDriverPrinter::new(browser.printer_config(webdriver_url)?);
    Ok((driver, printer))
}

fn stop_browser(driver: Option<ChromeDriver>) -> Result<(), Error> {
    if let Some(driver) = driver {
        driver.stop().add_context("stopping browser")?;
    }
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, starting graceful shutdown"),
        _ = terminate => info!("received SIGTERM, starting graceful shutdown"),
    }
}

async fn bind(addr: SocketAddr) -> Result<(TcpListener, SocketAddr), Error> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(Error::from)
        .add_context(&format!("binding {addr}"))?;
    let local = listener
        .local_addr()
        .map_err(Error::from)
        .add_context("reading bound address")?;
    Ok((listener, local))
}

fn write_output(bytes: &[u8], path: Option<PathBuf>) -> Result<(), Error> {
    match path {
        Some(path) => {
            std::fs::write(&path, bytes)
                .map_err(Error::from)
                .add_context(&format!("writing to '{}'", path.to_string_lossy()))?;
            info!(path = %path.display(), bytes = bytes.len(), "output written");
        }
        None => {
            let mut stdout = std::io::stdout();
            stdout
                .write_all(bytes)
                .map_err(Error::from)
                .add_context("writing to stdout")?;
            stdout
                .flush()
                .map_err(Error::from)
                .add_context("flushing stdout")?;
        }
    }
    Ok(())
}

async fn run_serve(args: ServeArgs) -> Result<(), Error> {
    let (driver, printer) = start_browser(&args.browser)?;
    let (listener, local) = bind(args.listen).await?;
    let config = ServerConfig {
        public_base_url: args.public_url.clone(),
        fallback_host: local.to_string(),
        ..args.page.server_config()
    };
    let state = AppState::new(config, Arc::new(printer)).add_context("building server state")?;

    info!("factura-pdf v{} listening on http://{local}", env!("CARGO_PKG_VERSION"));
    let served = serve(listener, state, shutdown_signal())
        .await
        .map_err(Error::from)
        .add_context("serving http");
    stop_browser(driver)?;
    served?;
    info!("server shutdown complete");
    Ok(())
}

async fn run_print(args: PrintArgs) -> Result<(), Error> {
    let query = QueryParams::parse(&read_query(&args.query)?);
    if args.page.strict_tables {
        Table::from_params(&query)
            .check_rectangular()
            .add_context("checking invoice table")?;
    }
    let filename = sanitize_pdf_filename(query.get("filename"));

    let (driver, printer) = start_browser(&args.browser)?;
    let printer: Arc<dyn PdfPrinter> = Arc::new(printer);
    let (listener, local) = bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
    let config = ServerConfig {
        fallback_host: local.to_string(),
        ..args.page.server_config()
    };
    let state = AppState::new(config, Arc::clone(&printer)).add_context("building server state")?;
    let (stop_server, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(serve(listener, state, async move {
        let _ = stopped.await;
    }));

    let page_url = format!("http://{local}/?{}", query.for_printing().to_query_string());
    let job = PdfJob::new(printer, page_url);
    let canceller = job.canceller();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling pdf job");
            canceller.cancel();
        }
    });
    let result = job.run().await.add_context("printing invoice");

    let _ = stop_server.send(());
    if let Err(e) = server.await {
        warn!(error = %e, "page server task failed");
    }
    stop_browser(driver)?;
    let pdf = result?;
    write_output(&pdf, output_path(&args.out, &filename))
}

fn run_render(args: RenderArgs) -> Result<(), Error> {
    let query = QueryParams::parse(&read_query(&args.query)?);
    let config = args.page.server_config();
    let env = setup_template_env(config.template_dir.as_deref())
        .map_err(Error::from)
        .add_context("loading page templates")?;
    let options = ViewOptionsBuilder::default()
        .default_logo(config.default_logo)
        .build()
        .map_err(|e| Error::from(e.to_string()))
        .add_context("building view options")?;
    let html = render_page(&env, &query, &options)?;
    write_output(html.as_bytes(), None)
}

#[tokio::main]
async fn main() -> Result<(), factura_pdf::Error> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "factura_pdf=info,factura_pdf_server=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => run_serve(args).await.add_context("running server"),
        Command::Print(args) => run_print(args).await.add_context("printing pdf from cli"),
        Command::Render(args) => run_render(args).add_context("rendering page from cli"),
    }
}
