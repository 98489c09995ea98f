//! Error types surfaced per uploaded file.

use thiserror::Error;

/// Why an uploaded file could not be read as session logs.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("file is empty")]
    Empty,

    #[error("file is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("top-level JSON {0} is not a session or a list of sessions")]
    UnsupportedShape(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(IngestError::Empty.to_string(), "file is empty");
        assert_eq!(
            IngestError::UnsupportedShape("number").to_string(),
            "top-level JSON number is not a session or a list of sessions"
        );

        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(IngestError::from(json_err)
            .to_string()
            .starts_with("invalid JSON:"));
    }
}
