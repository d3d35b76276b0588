use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for temploader operations
#[derive(Error, Debug)]
pub enum TemploaderError {
    /// IO error when reading templates or configuration
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// File not found error with specific path
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    /// A delimiter pattern supplied through options failed to compile
    #[error("Malformed {name} delimiter pattern '{pattern}': {source}")]
    MalformedDelimiter {
        name: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// An option carried a value of the wrong shape
    #[error("Invalid option '{name}': {message}")]
    InvalidOption { name: String, message: String },

    /// The loader query string could not be parsed
    #[error("Invalid query '{query}': {message}")]
    InvalidQuery { query: String, message: String },

    /// The build host could not resolve an asset reference
    #[error("Cannot resolve asset '{request}': {message}")]
    AssetResolution { request: String, message: String },

    /// Regex compilation error for internal patterns
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TemploaderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TemploaderError::FileNotFound {
            path: PathBuf::from("/test/page.html"),
        };
        assert_eq!(format!("{err}"), "File not found: /test/page.html");

        let err = TemploaderError::InvalidOption {
            name: "attributes".to_string(),
            message: "expected a string".to_string(),
        };
        assert_eq!(
            format!("{err}"),
            "Invalid option 'attributes': expected a string"
        );

        let err = TemploaderError::AssetResolution {
            request: "./logo.png".to_string(),
            message: "no such file".to_string(),
        };
        assert_eq!(
            format!("{err}"),
            "Cannot resolve asset './logo.png': no such file"
        );
    }

    #[test]
    fn test_malformed_delimiter_display() {
        let source = regex::Regex::new("(unclosed").unwrap_err();
        let err = TemploaderError::MalformedDelimiter {
            name: "interpolate",
            pattern: "(unclosed".to_string(),
            source,
        };
        let msg = format!("{err}");
        assert!(msg.starts_with("Malformed interpolate delimiter pattern '(unclosed'"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "test");
        let err: TemploaderError = io_err.into();
        assert!(matches!(err, TemploaderError::Io(_)));
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: TemploaderError = json_err.into();
        assert!(matches!(err, TemploaderError::Json(_)));
    }
}
