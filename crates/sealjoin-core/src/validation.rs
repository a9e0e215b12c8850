//! Upload validation and info extraction
//!
//! Every document entering the object store passes through here, so later
//! stages can rely on it being a parseable, unencrypted PDF with pages.

use lopdf::{Document, Object};
use serde::Serialize;

use crate::store::StoreError;

/// PDF file information extracted during validation
#[derive(Debug, Clone, Serialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PdfInfo {
    /// Number of pages in the document
    pub page_count: u32,
    /// PDF version string (e.g., "1.7")
    pub version: String,
    /// File size in bytes
    pub size_bytes: u64,
    /// Document title from metadata (if available)
    pub title: Option<String>,
    /// Document author from metadata (if available)
    pub author: Option<String>,
}

/// Validate a PDF file and extract basic info
pub fn validate_pdf(bytes: &[u8]) -> Result<PdfInfo, StoreError> {
    if bytes.len() < 8 {
        return Err(StoreError::InvalidDocument(
            "File too small to be a valid PDF".to_string(),
        ));
    }

    if !bytes.starts_with(b"%PDF-") {
        return Err(StoreError::InvalidDocument(
            "Not a valid PDF file (missing %PDF- header)".to_string(),
        ));
    }

    let version = extract_version(bytes);

    let document = Document::load_mem(bytes)
        .map_err(|e| StoreError::InvalidDocument(format!("Failed to parse PDF: {}", e)))?;

    // Stamping rewrites objects, which we cannot do under encryption
    if document.is_encrypted() {
        return Err(StoreError::InvalidDocument(
            "Encrypted PDFs are not supported".to_string(),
        ));
    }

    let page_count = document.get_pages().len() as u32;
    if page_count == 0 {
        return Err(StoreError::InvalidDocument("PDF has no pages".to_string()));
    }

    let (title, author) = extract_metadata(&document);

    Ok(PdfInfo {
        page_count,
        version,
        size_bytes: bytes.len() as u64,
        title,
        author,
    })
}

/// Extract PDF version from header
fn extract_version(bytes: &[u8]) -> String {
    // Header format: %PDF-1.7
    if bytes.len() >= 8 && bytes.starts_with(b"%PDF-") {
        if let Ok(version) = std::str::from_utf8(&bytes[5..8]) {
            return version.trim().to_string();
        }
    }
    "1.4".to_string()
}

fn extract_metadata(doc: &Document) -> (Option<String>, Option<String>) {
    let info = match doc.trailer.get(b"Info") {
        Ok(Object::Reference(id)) => doc.get_object(*id).ok().and_then(|o| o.as_dict().ok()),
        Ok(Object::Dictionary(dict)) => Some(dict),
        _ => None,
    };

    let Some(info) = info else {
        return (None, None);
    };

    let read = |key: &[u8]| match info.get(key) {
        Ok(Object::String(bytes, _)) => decode_text_string(bytes),
        _ => None,
    };

    (read(b"Title"), read(b"Author"))
}

/// Decode a PDF text string (UTF-16BE with BOM, or PDFDocEncoding as Latin-1)
fn decode_text_string(bytes: &[u8]) -> Option<String> {
    if bytes.starts_with(&[0xFE, 0xFF]) {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16(&units).ok();
    }
    Some(bytes.iter().map(|&b| b as char).collect())
}
