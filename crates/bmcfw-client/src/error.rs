//! Error types for firmware update operations

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for firmware update operations
pub type Result<T> = std::result::Result<T, FirmwareError>;

/// Errors that can occur while resolving inventory or pushing firmware
///
/// Every variant is fatal to the operation that raised it. Individual inventory
/// members that fail to resolve are not errors; they are reported as
/// [`ResolutionGap`](crate::firmware::ResolutionGap)s instead.
#[derive(Error, Debug)]
pub enum FirmwareError {
    /// The inventory collection (or the service documents leading to it)
    /// could not be fetched
    #[error("Failed to fetch {what} from {uri}: {message}")]
    Fetch {
        what: &'static str,
        uri: String,
        message: String,
    },

    /// A local image or signature file could not be opened
    #[error("Failed to open {role} file {}: {source}", .path.display())]
    LocalIo {
        role: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No usable session token
    #[error("Authentication error: {0}")]
    Auth(String),

    /// The firmware POST failed in transport or returned a non-success status
    #[error("Upload failed during {step} ({uri}): {message}")]
    Upload {
        step: &'static str,
        uri: String,
        status: Option<u16>,
        message: String,
    },

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid request supplied by the caller
    #[error("Invalid update request: {0}")]
    InvalidRequest(String),
}

impl FirmwareError {
    /// Create a fetch error for a document at `uri`
    pub fn fetch(what: &'static str, uri: impl Into<String>, message: impl ToString) -> Self {
        Self::Fetch {
            what,
            uri: uri.into(),
            message: message.to_string(),
        }
    }

    /// Create an upload error without an HTTP status
    pub fn upload(step: &'static str, uri: impl Into<String>, message: impl ToString) -> Self {
        Self::Upload {
            step,
            uri: uri.into(),
            status: None,
            message: message.to_string(),
        }
    }

    /// Create a local IO error for the given file role ("image" or "signature")
    pub fn local_io(role: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::LocalIo {
            role,
            path: path.into(),
            source,
        }
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Upload { status, .. } => *status,
            _ => None,
        }
    }

    /// Whether the error came from the caller's request or local files
    pub fn is_local(&self) -> bool {
        matches!(self, Self::LocalIo { .. } | Self::InvalidRequest(_))
    }
}
