/// Used when the requested filename is missing or sanitizes to nothing
pub const DEFAULT_PDF_FILENAME: &str = "factura.pdf";

const FORBIDDEN: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Make a user supplied name safe for a `Content-Disposition` header and a download.
///
/// Path separators, characters reserved on Windows and control characters are removed, the
/// result is trimmed and `.pdf` is appended when missing. Empty input falls back to
/// [`DEFAULT_PDF_FILENAME`].
pub fn sanitize_pdf_filename(filename: Option<&str>) -> String {
    let sanitized: String = filename
        .unwrap_or("")
        .chars()
        .filter(|c| !FORBIDDEN.contains(c) && !c.is_control())
        .collect();
    let sanitized = sanitized.trim();
    if sanitized.is_empty() {
        DEFAULT_PDF_FILENAME.to_string()
    } else if sanitized.ends_with(".pdf") {
        sanitized.to_string()
    } else {
        format!("{sanitized}.pdf")
    }
}
