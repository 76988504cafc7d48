//! Generation error types

use std::time::Duration;
use thiserror::Error;

/// Longest error text a panel displays
pub const MAX_ERROR_MESSAGE: usize = 100;

/// Errors that can occur while generating text
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("Generator command failed: {0}")]
    Command(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Document is empty")]
    EmptyDocument,

    #[error("No context available")]
    NoContext,

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GenerateError {
    /// Text for a panel's error line, cut to [`MAX_ERROR_MESSAGE`] characters
    pub fn display_message(&self) -> String {
        truncate_message(&self.to_string())
    }
}

/// Cut `message` to at most [`MAX_ERROR_MESSAGE`] characters
pub fn truncate_message(message: &str) -> String {
    message.chars().take(MAX_ERROR_MESSAGE).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_message() {
        assert_eq!(GenerateError::EmptyDocument.display_message(), "Document is empty");
        assert_eq!(GenerateError::NoContext.display_message(), "No context available");
    }

    #[test]
    fn test_display_message_is_truncated() {
        let err = GenerateError::Command("x".repeat(500));
        assert_eq!(err.display_message().chars().count(), MAX_ERROR_MESSAGE);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let message = "é".repeat(150);
        let truncated = truncate_message(&message);
        assert_eq!(truncated.chars().count(), MAX_ERROR_MESSAGE);
    }
}
