//! Command error types for CLI and embedding callers
//!
//! Provides structured errors that serialize to `{"code": "...", "message": "..."}`.

use casefile_core::ReprocessError;
use serde::Serialize;

/// Errors returned by commands
///
/// Each variant serializes with a snake_case `code` field for caller matching.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum CommandError {
    // Not found errors
    DocumentNotFound { message: String, doc_id: String },

    // State errors
    Busy { message: String },

    // Operation errors
    StorageError { message: String },
    InternalError { message: String },
}

impl CommandError {
    pub fn document_not_found(doc_id: impl Into<String>) -> Self {
        let doc_id = doc_id.into();
        Self::DocumentNotFound {
            message: format!("Document not found: {}", doc_id),
            doc_id,
        }
    }

    pub fn busy() -> Self {
        Self::Busy {
            message: "A reprocess run is already in progress".to_string(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::StorageError {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::DocumentNotFound { .. } => "document_not_found",
            Self::Busy { .. } => "busy",
            Self::StorageError { .. } => "storage_error",
            Self::InternalError { .. } => "internal_error",
        }
    }
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DocumentNotFound { message, .. } => write!(f, "{}", message),
            Self::Busy { message } => write!(f, "{}", message),
            Self::StorageError { message } => write!(f, "{}", message),
            Self::InternalError { message } => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for CommandError {}

// Conversion from anyhow::Error (used by casefile-core glue)
impl From<anyhow::Error> for CommandError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(err.to_string())
    }
}

impl From<std::io::Error> for CommandError {
    fn from(err: std::io::Error) -> Self {
        Self::storage(err.to_string())
    }
}

impl From<ReprocessError> for CommandError {
    fn from(err: ReprocessError) -> Self {
        match err {
            ReprocessError::NotFound(doc_id) => Self::document_not_found(doc_id),
            other => Self::storage(other.to_string()),
        }
    }
}

/// Result type alias for commands
pub type CommandResult<T> = Result<T, CommandError>;

/// Extension trait for converting Results to CommandResult
pub trait ResultExt<T> {
    fn storage_err(self) -> CommandResult<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn storage_err(self) -> CommandResult<T> {
        self.map_err(|e| CommandError::storage(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_with_code_tag() {
        let json = serde_json::to_value(CommandError::document_not_found("doc-9")).unwrap();
        assert_eq!(json["code"], "document_not_found");
        assert_eq!(json["doc_id"], "doc-9");
        assert_eq!(json["message"], "Document not found: doc-9");

        let json = serde_json::to_value(CommandError::busy()).unwrap();
        assert_eq!(json["code"], CommandError::busy().code());
    }

    #[test]
    fn test_reprocess_error_mapping() {
        let err: CommandError = ReprocessError::NotFound("doc-1".to_string()).into();
        assert!(matches!(err, CommandError::DocumentNotFound { .. }));
    }
}
