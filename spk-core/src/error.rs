/// Error types for the core library
use thiserror::Error;

/// Main error type for catalog and store operations
#[derive(Error, Debug)]
pub enum CoreError {
    /// Failed to parse a JSON station manifest
    #[error("Failed to parse station manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    /// Station manifest is structurally invalid
    #[error("Invalid station catalog: {0}")]
    InvalidCatalog(String),

    /// Station code not present in the catalog
    #[error("Station not found: {0}")]
    StationNotFound(String),
}

/// Type alias for Results using CoreError
pub type Result<T> = std::result::Result<T, CoreError>;
