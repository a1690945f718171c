use thiserror::Error;

/// Failures raised by a single extraction call
///
/// Every variant is terminal for the call that produced it. The browser
/// session has already been torn down by the time one of these reaches
/// the caller.
#[derive(Error, Debug)]
pub enum CatalogueError {
    /// Browser (or its executable) could not be started
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    /// A required selector never appeared
    #[error("Element not found (timeout after {timeout_ms}ms): '{selector}'")]
    ElementNotFound { selector: String, timeout_ms: u64 },

    /// The download did not start (or finish) in time
    #[error("Download did not {phase} within {timeout_ms}ms")]
    DownloadTimeout { phase: &'static str, timeout_ms: u64 },

    #[error("New tab did not open within {timeout_ms}ms")]
    NewTabTimeout { timeout_ms: u64 },

    #[error("Navigation failed for URL {url}: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Extraction call exceeded {timeout_ms}ms")]
    SessionTimeout { timeout_ms: u64 },

    #[error("Malformed RSS feed: {0}")]
    Feed(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type CatalogueResult<T> = Result<T, CatalogueError>;

impl From<chromiumoxide::error::CdpError> for CatalogueError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        CatalogueError::Browser(err.to_string())
    }
}

impl From<std::io::Error> for CatalogueError {
    fn from(err: std::io::Error) -> Self {
        CatalogueError::Io(err.to_string())
    }
}

impl From<quick_xml::Error> for CatalogueError {
    fn from(err: quick_xml::Error) -> Self {
        CatalogueError::Feed(err.to_string())
    }
}

impl From<serde_json::Error> for CatalogueError {
    fn from(err: serde_json::Error) -> Self {
        CatalogueError::InvalidArgument(err.to_string())
    }
}

impl From<serde_yaml::Error> for CatalogueError {
    fn from(err: serde_yaml::Error) -> Self {
        CatalogueError::Config(err.to_string())
    }
}
