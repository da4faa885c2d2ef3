//! Error types for Confluence synchronization.

use std::fmt;
use std::io;
use std::path::PathBuf;

use cfmd_convert::ConvertError;

/// Failure to complete an HTTP exchange at all.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// HTTP request failed after a connection was made, or timed out.
    #[error("HTTP request failed")]
    Http(#[source] ureq::Error),

    /// Request body could not be encoded.
    #[error("invalid request body")]
    Body(#[from] serde_json::Error),

    /// Server could not be reached.
    #[error("connection failed: {0}")]
    Connection(String),
}

impl From<ureq::Error> for TransportError {
    fn from(error: ureq::Error) -> Self {
        if is_connection_failure(&error) {
            Self::Connection(error.to_string())
        } else {
            Self::Http(error)
        }
    }
}

fn is_connection_failure(error: &ureq::Error) -> bool {
    match error {
        ureq::Error::HostNotFound | ureq::Error::ConnectionFailed => true,
        ureq::Error::Io(e) => matches!(
            e.kind(),
            io::ErrorKind::ConnectionRefused
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::NotConnected
        ),
        _ => false,
    }
}

/// Error from Confluence API operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfluenceError {
    /// Credentials were rejected.
    #[error("authentication failed (HTTP {status})")]
    AuthFailed {
        /// 401 or 403.
        status: u16,
    },

    /// Resource is missing or not visible to the user.
    #[error("not found: {resource}")]
    NotFound {
        /// What was requested.
        resource: String,
    },

    /// Listing returned no items at all.
    #[error("no results from {endpoint}")]
    EmptyResult {
        /// Listing endpoint path.
        endpoint: String,
    },

    /// Listing request failed part way; accumulated items are discarded.
    #[error("fetch failed at offset {offset}")]
    FetchFailed {
        /// `start` offset of the failed request.
        offset: usize,
        /// Underlying failure.
        #[source]
        source: Box<ConfluenceError>,
    },

    /// Content could not be converted.
    #[error("content conversion failed")]
    ConversionFailed(#[from] ConvertError),

    /// Server rejected a write because the page moved on.
    #[error("version conflict on page {page_id}: expected version {expected}, server has {}", actual.map_or_else(|| "a newer version".to_owned(), |v| format!("version {v}")))]
    VersionConflict {
        /// Page being written.
        page_id: String,
        /// Version the write was based on.
        expected: u32,
        /// Server's current version, when it could be determined.
        actual: Option<u32>,
    },

    /// Page version cannot be incremented any further.
    #[error("page {page_id} is at version {version}, which cannot be incremented")]
    VersionExhausted {
        /// Page being written.
        page_id: String,
        /// Version the write was based on.
        version: u32,
    },

    /// HTTP response error (server returned error status).
    #[error("HTTP error: {status} - {body}")]
    HttpResponse {
        /// HTTP status code.
        status: u16,
        /// Response body (may contain error details).
        body: String,
    },

    /// HTTP exchange failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// JSON serialization/deserialization error.
    #[error("JSON error")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    /// Editor could not be started.
    #[error("editor failed: {0}")]
    Editor(String),

    /// Argument is neither a page id nor a page URL.
    #[error("invalid page reference: {0}")]
    InvalidPageRef(String),
}

impl ConfluenceError {
    /// Whether the server answered with `status` and a body containing
    /// `needle`.
    pub(crate) fn is_http_with(&self, status: u16, needle: &str) -> bool {
        matches!(self, Self::HttpResponse { status: s, body } if *s == status && body.contains(needle))
    }
}

/// Scratch file could not be removed. Logged, never returned.
#[derive(Debug, thiserror::Error)]
#[error("failed to remove scratch file {}", path.display())]
pub struct ResourceCleanupFailed {
    /// Scratch file path.
    pub path: PathBuf,
    /// Underlying failure.
    #[source]
    pub source: std::io::Error,
}

/// Logical step of a sync operation, named in user-facing errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStep {
    ListingSpaces,
    ListingPages,
    Searching,
    ReadingPage,
    ConvertingContent,
    EditingContent,
    WritingPage,
    CreatingPage,
}

impl fmt::Display for SyncStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ListingSpaces => "listing spaces",
            Self::ListingPages => "listing pages",
            Self::Searching => "searching",
            Self::ReadingPage => "reading page",
            Self::ConvertingContent => "converting content",
            Self::EditingContent => "editing content",
            Self::WritingPage => "writing page",
            Self::CreatingPage => "creating page",
        })
    }
}

/// Error tagged with the step that failed.
#[derive(Debug, thiserror::Error)]
#[error("{step} failed: {source}")]
pub struct SyncError {
    /// Step in progress.
    pub step: SyncStep,
    /// Underlying failure.
    #[source]
    pub source: ConfluenceError,
}

/// Attach a [`SyncStep`] to a result.
pub(crate) trait StepContext<T> {
    fn step(self, step: SyncStep) -> Result<T, SyncError>;
}

impl<T, E: Into<ConfluenceError>> StepContext<T> for Result<T, E> {
    fn step(self, step: SyncStep) -> Result<T, SyncError> {
        self.map_err(|e| SyncError {
            step,
            source: e.into(),
        })
    }
}
