//! Error types for vitrine.

use thiserror::Error;

/// Result type alias using vitrine's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for vitrine operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Document not found
    #[error("Document not found: {0}")]
    DocumentNotFound(i64),

    /// Media record not found in the catalog
    #[error("Media not found: {0}")]
    MediaNotFound(i64),

    /// Gallery record not found in the catalog
    #[error("Gallery not found: {0}")]
    GalleryNotFound(i64),

    /// Blob storage failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Caller lacks edit rights on the target document
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Document conversion was rejected; earlier substitutions are kept.
    #[error("Conversion rejected: {message}")]
    Rejected {
        message: String,
        edit_url: Option<String>,
    },

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for the not-found family of errors.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_)
                | Error::DocumentNotFound(_)
                | Error::MediaNotFound(_)
                | Error::GalleryNotFound(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("test resource".to_string());
        assert_eq!(err.to_string(), "Not found: test resource");
    }

    #[test]
    fn test_error_display_document_not_found() {
        let err = Error::DocumentNotFound(42);
        assert_eq!(err.to_string(), "Document not found: 42");
    }

    #[test]
    fn test_error_display_media_not_found() {
        let err = Error::MediaNotFound(7);
        assert_eq!(err.to_string(), "Media not found: 7");
    }

    #[test]
    fn test_error_display_rejected() {
        let err = Error::Rejected {
            message: "gallery import failed".to_string(),
            edit_url: Some("/documents/3/edit".to_string()),
        };
        assert_eq!(err.to_string(), "Conversion rejected: gallery import failed");
    }

    #[test]
    fn test_error_display_forbidden() {
        let err = Error::Forbidden("cannot edit document 9".to_string());
        assert_eq!(err.to_string(), "Forbidden: cannot edit document 9");
    }

    #[test]
    fn test_is_not_found_family() {
        assert!(Error::NotFound("x".into()).is_not_found());
        assert!(Error::DocumentNotFound(1).is_not_found());
        assert!(Error::MediaNotFound(1).is_not_found());
        assert!(Error::GalleryNotFound(1).is_not_found());
        assert!(!Error::Internal("x".into()).is_not_found());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("access denied"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
