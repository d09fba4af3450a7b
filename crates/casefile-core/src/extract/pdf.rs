use crate::error::ExtractionError;

/// Text pulled out of a PDF.
#[derive(Debug, Clone)]
pub struct PdfText {
    pub text: String,
    pub page_count: usize,
}

/// Extract text from in-memory PDF bytes, page by page.
///
/// CPU-bound; call from a blocking task.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<PdfText, ExtractionError> {
    let doc =
        lopdf::Document::load_mem(bytes).map_err(|e| ExtractionError::Pdf(e.to_string()))?;

    let mut pages: Vec<u32> = doc.get_pages().keys().cloned().collect();
    pages.sort();

    let mut text = String::new();
    for page_num in &pages {
        // A single unreadable page should not sink the whole document
        let page_text = match doc.extract_text(&[*page_num]) {
            Ok(t) => t,
            Err(e) => {
                tracing::debug!(page = page_num, error = %e, "Skipping unreadable page");
                continue;
            }
        };
        text.push_str(&page_text);
        if !page_text.is_empty() && !page_text.ends_with('\n') {
            text.push('\n');
        }
    }

    tracing::debug!(
        "Extracted {} chars from {} pages",
        text.len(),
        pages.len()
    );

    Ok(PdfText {
        text,
        page_count: pages.len(),
    })
}
