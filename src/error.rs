//! Error type shared by every pipeline stage and tool.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PhotoError {
    /// Unreadable, corrupt, or zero-dimension bitmap.
    #[error("invalid image: {0}")]
    InvalidImage(String),
    /// Bytes are not a PDF, or the PDF has no pages.
    #[error("unsupported document: {0}")]
    UnsupportedDocument(String),
    #[error("payload of {len} bytes exceeds QR capacity")]
    PayloadTooLarge { len: usize },
    #[error("encoding failed: {0}")]
    Encode(String),
    /// Segmentation or detection model failed to load or run.
    #[error("model error: {0}")]
    Model(String),
    #[error("{tool} expects {expected} input")]
    InputMismatch {
        tool: &'static str,
        expected: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_mismatch_names_tool_and_variant() {
        let err = PhotoError::InputMismatch {
            tool: "pdf-to-image",
            expected: "document",
        };
        assert_eq!(err.to_string(), "pdf-to-image expects document input");
    }

    #[test]
    fn payload_too_large_reports_length() {
        let err = PhotoError::PayloadTooLarge { len: 9000 };
        assert!(err.to_string().contains("9000"));
    }
}
