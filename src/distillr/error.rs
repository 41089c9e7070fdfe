use serde_json::Value;
use thiserror::Error;

/// Errors that can occur when interacting with the DataDistillr API
#[derive(Debug, Error)]
pub enum DistillrError {
    /// Rejected credentials (401/403) or a call made without a live login
    #[error("Authorization error: {message} ({url})")]
    Authorization { url: String, message: String },

    /// A name or token did not resolve to anything
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    /// Query results were still running after the last allowed poll
    #[error("Timed out waiting for {url} after {attempts} polls")]
    Timeout { url: String, attempts: u32 },

    /// Unexpected run status, unclassified non-2xx, or a malformed payload
    #[error("Server error from {url}: {message}")]
    Server {
        url: String,
        message: String,
        payload: Option<Value>,
    },

    /// A pre-signed upload target rejected the file
    #[error("Upload of '{path}' failed with HTTP {status} ({url})")]
    FileUpload {
        url: String,
        path: String,
        status: u16,
    },

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body could not be decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Local file error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// DataFrame construction or export error
    #[error("Table error: {0}")]
    Table(#[from] polars::prelude::PolarsError),

    /// Excel workbook export error
    #[error("Excel error: {0}")]
    Excel(#[from] rust_xlsxwriter::XlsxError),

    /// Configuration error (bad env vars, unreadable config file, etc.)
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DistillrError {
    pub(crate) fn server(url: &str, message: impl Into<String>, payload: Option<Value>) -> Self {
        DistillrError::Server {
            url: url.to_string(),
            message: message.into(),
            payload,
        }
    }

    pub(crate) fn not_found(kind: &'static str, name: impl ToString) -> Self {
        DistillrError::NotFound {
            kind,
            name: name.to_string(),
        }
    }

    /// URL of the request that failed, when the error carries one
    pub fn url(&self) -> Option<&str> {
        match self {
            DistillrError::Authorization { url, .. }
            | DistillrError::Timeout { url, .. }
            | DistillrError::Server { url, .. }
            | DistillrError::FileUpload { url, .. } => Some(url),
            _ => None,
        }
    }
}

/// Type alias for Results using DistillrError
pub type Result<T> = std::result::Result<T, DistillrError>;
