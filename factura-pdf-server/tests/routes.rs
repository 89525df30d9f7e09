use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
};
use chrono::{DateTime, FixedOffset};
use factura_pdf::{Cancellation, Error, PdfPrinter};
use factura_pdf_server::{
    AppState, ServerConfig, router, routes::pdf::PDF_ERROR_MESSAGE,
};
use tower::ServiceExt;
use url::Url;

const PDF_BYTES: &[u8] = b"%PDF-1.4\n%fake\n";

struct FakePrinter {
    fail: bool,
    urls: Mutex<Vec<String>>,
}

impl FakePrinter {
    fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            fail,
            urls: Mutex::new(Vec::new()),
        })
    }

    fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PdfPrinter for FakePrinter {
    async fn print(&self, url: &str, _cancel: &Cancellation) -> Result<Vec<u8>, Error> {
        self.urls.lock().unwrap().push(url.to_string());
        if self.fail {
            Err(Error::from(String::from("chrome exited with status 1")))
        } else {
            Ok(PDF_BYTES.to_vec())
        }
    }
}

fn app_with(config: ServerConfig, printer: Arc<FakePrinter>) -> Router {
    router(AppState::new(config, printer).unwrap())
}

fn app(printer: Arc<FakePrinter>) -> Router {
    app_with(ServerConfig::default(), printer)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::HOST, "facturas.test:8080")
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::HOST, "facturas.test:8080")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_text(response: Response) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

#[tokio::test]
async fn page_renders_sections_from_query() {
    let response = app(FakePrinter::new(false))
        .oneshot(get("/?Factura=Factura:%20001&Cliente=Ana&columna=Producto&Producto=Caf%C3%A9"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    let html = body_text(response).await;
    assert!(html.contains("id=\"factura-line\""));
    assert!(html.contains("id=\"para-section\""));
    assert!(!html.contains("id=\"de-section\""));
    assert!(html.contains("Café"));
}

#[tokio::test]
async fn get_returns_pdf_with_sanitized_filename() {
    let printer = FakePrinter::new(false);
    let response = app(printer.clone())
        .oneshot(get("/api/generar-pdf?Total=10&filename=inv%2Foice%3A1%3F.pdf"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "inline; filename=\"invoice1.pdf\""
    );
    let pdf = body_bytes(response).await;
    assert!(!pdf.is_empty());
    assert_eq!(pdf, PDF_BYTES);

    let urls = printer.urls();
    assert_eq!(urls.len(), 1);
    assert!(urls[0].starts_with("http://facturas.test:8080/?"));
    assert!(urls[0].ends_with("isPrinting=true"));
}

#[tokio::test]
async fn get_without_filename_uses_default() {
    let response = app(FakePrinter::new(false))
        .oneshot(get("/api/generar-pdf?Total=10"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "inline; filename=\"factura.pdf\""
    );
}

#[tokio::test]
async fn post_with_params_returns_pdf() {
    let printer = FakePrinter::new(false);
    let response = app(printer.clone())
        .oneshot(post_json(
            "/api/generar-pdf",
            r#"{"params":"Total=3.48&compartir=true&filename=Factura%20001"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "inline; filename=\"Factura 001.pdf\""
    );
    assert!(!body_bytes(response).await.is_empty());

    let url = Url::parse(&printer.urls()[0]).unwrap();
    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    assert!(pairs.contains(&("Total".to_string(), "3.48".to_string())));
    assert!(!pairs.iter().any(|(k, _)| k == "compartir"));
    assert_eq!(pairs.last().unwrap(), &("isPrinting".to_string(), "true".to_string()));
}

#[tokio::test]
async fn post_without_params_is_bad_request() {
    let printer = FakePrinter::new(false);
    let response = app(printer.clone())
        .oneshot(post_json("/api/generar-pdf", "{}"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(response).await, "Missing params");
    assert!(printer.urls().is_empty());
}

#[tokio::test]
async fn post_with_empty_params_is_bad_request() {
    let printer = FakePrinter::new(false);
    let app = app(printer.clone());
    for body in [r#"{"params":""}"#, r#"{"params":"  "}"#, r#"{"params":null}"#] {
        let response = app
            .clone()
            .oneshot(post_json("/api/generar-pdf", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(body_text(response).await, "Missing params");
    }
    assert!(printer.urls().is_empty());
}

#[tokio::test]
async fn post_with_invalid_json_is_bad_request() {
    let printer = FakePrinter::new(false);
    let response = app(printer.clone())
        .oneshot(post_json("/api/generar-pdf", "{\"params\":"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(printer.urls().is_empty());
}

#[tokio::test]
async fn printer_failure_is_a_generic_500() {
    let response = app(FakePrinter::new(true))
        .oneshot(get("/api/generar-pdf?Total=10"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let text = body_text(response).await;
    assert_eq!(text, PDF_ERROR_MESSAGE);
    assert!(!text.contains("chrome"));
}

#[tokio::test]
async fn forwarded_proto_is_respected() {
    let printer = FakePrinter::new(false);
    let request = Request::builder()
        .uri("/api/generar-pdf?Total=1")
        .header(header::HOST, "facturas.example.com")
        .header("x-forwarded-proto", "https, http")
        .body(Body::empty())
        .unwrap();
    let response = app(printer.clone()).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(printer.urls()[0].starts_with("https://facturas.example.com/?Total=1"));
}

#[tokio::test]
async fn public_base_url_overrides_headers() {
    let printer = FakePrinter::new(false);
    let config = ServerConfig {
        public_base_url: Some(Url::parse("http://factura-pdf.internal:3000/").unwrap()),
        ..ServerConfig::default()
    };
    let response = app_with(config, printer.clone())
        .oneshot(get("/api/generar-pdf?Total=1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        printer.urls()[0],
        "http://factura-pdf.internal:3000/?Total=1&isPrinting=true"
    );
}

#[tokio::test]
async fn ragged_tables_are_padded_by_default() {
    let response = app(FakePrinter::new(false))
        .oneshot(get("/?columna=A&columna=B&A=1,2&B=x"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn strict_tables_reject_ragged_columns() {
    let printer = FakePrinter::new(false);
    let config = ServerConfig {
        strict_tables: true,
        ..ServerConfig::default()
    };
    let app = app_with(config, printer.clone());

    let page = app
        .clone()
        .oneshot(get("/?columna=A&columna=B&A=1,2&B=x"))
        .await
        .unwrap();
    assert_eq!(page.status(), StatusCode::BAD_REQUEST);

    let pdf = app
        .oneshot(get("/api/generar-pdf?columna=A&columna=B&A=1,2&B=x"))
        .await
        .unwrap();
    assert_eq!(pdf.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(pdf).await.contains("B"));
    assert!(printer.urls().is_empty());
}

#[tokio::test]
async fn page_renders_identically_for_a_fixed_clock() {
    let printed_at = DateTime::<FixedOffset>::parse_from_rfc3339("2025-03-15T09:30:00+01:00").unwrap();
    let state = AppState::with_clock(
        ServerConfig::default(),
        FakePrinter::new(false),
        Arc::new(move || printed_at),
    )
    .unwrap();
    let app = router(state);
    let uri = "/?Factura=Factura:%20001&NotaP=Gracias&Total=10";

    let first = body_text(app.clone().oneshot(get(uri)).await.unwrap()).await;
    let second = body_text(app.oneshot(get(uri)).await.unwrap()).await;
    assert_eq!(first, second);
    assert!(first.contains("2025 09:30"));
}

#[tokio::test]
async fn health_reports_version() {
    let response = app(FakePrinter::new(false))
        .oneshot(get("/health"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}
