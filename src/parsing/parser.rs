//! Turns the raw bytes of a document version into per-page text.

use pdfium_render::prelude::*;
use thiserror::Error;

use crate::literals::MAX_PAGE_NUMBER;

#[derive(Debug, Error)]
pub enum ParseFailure {
    #[error("unsupported content type: {0}")]
    Unsupported(String),
    #[error("pdfium library unavailable: {0}")]
    BackendUnavailable(String),
    #[error("failed to read PDF: {0}")]
    Pdf(String),
    #[error("document has no pages")]
    Empty,
    #[error("document has {0} pages, more than the supported {max}", max = MAX_PAGE_NUMBER)]
    TooManyPages(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Text,
    Other(String),
}

impl DocumentKind {
    /// Uses the declared content type when present, the file extension otherwise.
    pub fn detect(content_type: Option<&str>, original_name: &str) -> Self {
        let mime = content_type
            .map(|value| value.split(';').next().unwrap_or(value).trim().to_ascii_lowercase())
            .filter(|value| !value.is_empty() && value != "application/octet-stream")
            .or_else(|| {
                mime_guess::from_path(original_name)
                    .first()
                    .map(|mime| mime.essence_str().to_string())
            });

        match mime.as_deref() {
            Some("application/pdf") => Self::Pdf,
            Some(value) if value.starts_with("text/") => Self::Text,
            Some(value) => Self::Other(value.to_string()),
            None => Self::Other("unknown".to_string()),
        }
    }
}

/// Parsed text, one entry per page in page order.
pub fn parse_document(
    content_type: Option<&str>,
    original_name: &str,
    bytes: &[u8],
) -> Result<Vec<String>, ParseFailure> {
    let pages = match DocumentKind::detect(content_type, original_name) {
        DocumentKind::Pdf => extract_pdf_pages(bytes)?,
        DocumentKind::Text => vec![String::from_utf8_lossy(bytes).into_owned()],
        DocumentKind::Other(mime) => return Err(ParseFailure::Unsupported(mime)),
    };

    if pages.is_empty() {
        return Err(ParseFailure::Empty);
    }
    check_page_count(pages.len())?;
    Ok(pages)
}

fn check_page_count(count: usize) -> Result<(), ParseFailure> {
    if count > MAX_PAGE_NUMBER as usize {
        return Err(ParseFailure::TooManyPages(count));
    }
    Ok(())
}

fn extract_pdf_pages(bytes: &[u8]) -> Result<Vec<String>, ParseFailure> {
    let bindings = Pdfium::bind_to_system_library()
        .map_err(|err| ParseFailure::BackendUnavailable(err.to_string()))?;
    let pdfium = Pdfium::new(bindings);
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|err| ParseFailure::Pdf(format!("load pdf: {err}")))?;

    let pages = document.pages();
    check_page_count(pages.len() as usize)?;
    let mut extracted = Vec::with_capacity(pages.len() as usize);
    for page_index in 0..pages.len() {
        let page = pages
            .get(page_index)
            .map_err(|err| ParseFailure::Pdf(format!("load page {page_index}: {err}")))?;
        let mut text = String::new();
        if let Ok(page_text) = page.text() {
            for segment in page_text.segments().iter() {
                text.push_str(&segment.text());
                text.push('\n');
            }
        }
        extracted.push(text);
    }

    Ok(extracted)
}
