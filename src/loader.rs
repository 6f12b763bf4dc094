//! PDF page extraction.
//!
//! Failures here are soft: a corrupt, encrypted or image-only PDF produces an
//! empty page list and a warning in the log. Callers check for emptiness and
//! report "text extraction failed" to the user.

use std::io::Write;
use std::path::Path;

use tracing::{debug, warn};

use crate::models::PageRecord;

/// Extract one [`PageRecord`] per page of the PDF at `path`.
///
/// Returns an empty vector when the file cannot be parsed or when no page
/// yields any non-whitespace text.
pub fn load_pdf(path: &Path) -> Vec<PageRecord> {
    let source = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    // pdf-extract panics on some malformed inputs.
    match std::panic::catch_unwind(|| pdf_extract::extract_text_by_pages(path)) {
        Ok(Ok(pages)) => into_records(pages, &source),
        Ok(Err(e)) => {
            warn!(path = %path.display(), error = %e, "PDF text extraction failed");
            Vec::new()
        }
        Err(_) => {
            warn!(path = %path.display(), "PDF parser panicked");
            Vec::new()
        }
    }
}

/// Extract pages from uploaded bytes.
///
/// The bytes are spooled to a temporary `.pdf` file for the duration of the
/// extraction; the file is removed before this function returns. `name` is
/// recorded as each page's `source`.
pub fn load_pdf_bytes(bytes: &[u8], name: &str) -> Vec<PageRecord> {
    load_pdf_bytes_in(bytes, name, &std::env::temp_dir())
}

/// Like [`load_pdf_bytes`], spooling into `dir` instead of the system
/// temporary directory.
pub fn load_pdf_bytes_in(bytes: &[u8], name: &str, dir: &Path) -> Vec<PageRecord> {
    let tmp = match spool_to_tempfile(bytes, dir) {
        Ok(tmp) => tmp,
        Err(e) => {
            warn!(file = name, error = %e, "could not write upload to a temporary file");
            return Vec::new();
        }
    };
    debug!(file = name, tmp = %tmp.path().display(), bytes = bytes.len(), "spooled upload");

    let mut pages = load_pdf(tmp.path());
    for page in &mut pages {
        page.source = name.to_string();
    }
    pages
}

fn spool_to_tempfile(bytes: &[u8], dir: &Path) -> std::io::Result<tempfile::NamedTempFile> {
    let mut tmp = tempfile::Builder::new()
        .prefix("resume-upload-")
        .suffix(".pdf")
        .tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    Ok(tmp)
}

fn into_records(pages: Vec<String>, source: &str) -> Vec<PageRecord> {
    if pages.iter().all(|p| p.trim().is_empty()) {
        warn!(source, pages = pages.len(), "PDF contains no extractable text");
        return Vec::new();
    }

    pages
        .into_iter()
        .enumerate()
        .map(|(i, text)| PageRecord {
            text,
            page_number: i as u32 + 1,
            source: source.to_string(),
        })
        .collect()
}
