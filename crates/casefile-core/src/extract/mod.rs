//! Text extraction from raw document bytes.

mod pdf;

pub use pdf::{extract_pdf_text, PdfText};

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ExtractionError;

/// Turns raw document content into plain text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extract text from `raw`, interpreted according to `mime_type`.
    ///
    /// Implementations should return `ExtractionError::Cancelled` instead of
    /// starting expensive work once `cancel` is set.
    async fn extract(
        &self,
        raw: &[u8],
        mime_type: &str,
        cancel: &CancellationToken,
    ) -> Result<String, ExtractionError>;
}

/// Extractor for the formats the importer accepts: PDF and plain text.
#[derive(Debug, Clone, Default)]
pub struct DefaultExtractor;

impl DefaultExtractor {
    pub fn new() -> Self {
        Self
    }
}

fn is_plain_text(mime_type: &str) -> bool {
    mime_type.starts_with("text/")
        || matches!(
            mime_type,
            "application/json" | "application/xml" | "application/x-markdown"
        )
}

#[async_trait]
impl TextExtractor for DefaultExtractor {
    async fn extract(
        &self,
        raw: &[u8],
        mime_type: &str,
        cancel: &CancellationToken,
    ) -> Result<String, ExtractionError> {
        if cancel.is_cancelled() {
            return Err(ExtractionError::Cancelled);
        }

        let mime_type = mime_type.trim().to_ascii_lowercase();

        if mime_type == "application/pdf" {
            let bytes = raw.to_vec();
            let extracted = tokio::task::spawn_blocking(move || extract_pdf_text(&bytes))
                .await
                .map_err(|e| ExtractionError::Task(e.to_string()))??;
            return Ok(extracted.text);
        }

        if is_plain_text(&mime_type) {
            return Ok(String::from_utf8_lossy(raw).into_owned());
        }

        Err(ExtractionError::Unsupported(mime_type))
    }
}

/// Run an extraction bounded by `timeout`.
pub async fn extract_with_timeout(
    extractor: &dyn TextExtractor,
    raw: &[u8],
    mime_type: &str,
    cancel: &CancellationToken,
    timeout: Duration,
) -> Result<String, ExtractionError> {
    match tokio::time::timeout(timeout, extractor.extract(raw, mime_type, cancel)).await {
        Ok(result) => result,
        Err(_) => Err(ExtractionError::Timeout(timeout.as_secs())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_plain_text() {
        let text = DefaultExtractor::new()
            .extract(b"Motion to compel", "text/plain", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(text, "Motion to compel");
    }

    #[tokio::test]
    async fn test_markdown_and_mime_case() {
        let text = DefaultExtractor::new()
            .extract(b"# Exhibit A", "Text/Markdown", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(text, "# Exhibit A");
    }

    #[tokio::test]
    async fn test_pdf_runs_through_lopdf() {
        let bytes = pdf::tests::create_test_pdf(&["Order of protection"]);

        let text = DefaultExtractor::new()
            .extract(&bytes, "application/pdf", &CancellationToken::new())
            .await
            .unwrap();
        assert!(text.contains("Order") || text.contains("protection"), "got '{text}'");
    }

    #[tokio::test]
    async fn test_unsupported_type() {
        let err = DefaultExtractor::new()
            .extract(b"PK\x03\x04", "application/zip", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Unsupported(ref m) if m == "application/zip"));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = DefaultExtractor::new()
            .extract(b"text", "text/plain", &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Cancelled));
    }

    struct SlowExtractor;

    #[async_trait]
    impl TextExtractor for SlowExtractor {
        async fn extract(
            &self,
            _raw: &[u8],
            _mime_type: &str,
            _cancel: &CancellationToken,
        ) -> Result<String, ExtractionError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(String::new())
        }
    }

    #[tokio::test]
    async fn test_timeout() {
        let err = extract_with_timeout(
            &SlowExtractor,
            b"",
            "text/plain",
            &CancellationToken::new(),
            Duration::from_millis(20),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ExtractionError::Timeout(_)));
    }
}
