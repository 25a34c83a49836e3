/// Error types for the event codec and store client
use thiserror::Error;

/// Main error type for event document and remote store operations
#[derive(Error, Debug)]
pub enum EventError {
    /// The document is not well-formed XML
    #[error("Failed to parse event XML: {0}")]
    XmlParse(String),

    /// Writing the document failed
    #[error("Failed to write event XML: {0}")]
    XmlWrite(String),

    /// The document root is not an event
    #[error("Unexpected document root: {0}")]
    UnexpectedRoot(String),

    /// HTTP request failed
    #[cfg(feature = "api")]
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// The event store answered with an unexpected status
    #[error("Unexpected HTTP status {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    /// No event matched the requested time window
    #[error("No events between {start} and {end}")]
    NoEvents { start: String, end: String },
}

/// Type alias for Results using EventError
pub type Result<T> = std::result::Result<T, EventError>;
