//! Custom error types for opinion-miner

use thiserror::Error;

/// Main error type for opinion-miner operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Transport error fetching {url}: {message}")]
    Transport { url: String, message: String },

    #[error("HTTP {code} fetching {url}")]
    HttpStatus { code: u16, url: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Malformed review record: {0}")]
    MalformedRecord(String),

    #[error("Pagination loop detected at {url} after {pages} pages")]
    PaginationLoop { url: String, pages: u32 },

    #[error("Could not save extraction: {0}")]
    StorageConflict(String),

    #[error("Extraction timed out after {0}s")]
    Timeout(u64),

    #[error("Extraction cancelled")]
    Cancelled,

    #[error("Invalid product code: {0}")]
    InvalidProductCode(String),

    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("User '{user}' has no access to product {product}")]
    AccessDenied { user: String, product: String },

    #[error("Chart rendering error: {0}")]
    Chart(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Not initialized: run 'opinion-miner init' first")]
    NotInitialized,

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for failures while fetching, parsing or normalizing pages.
    /// Nothing was persisted when one of these surfaces.
    pub fn is_extraction_failure(&self) -> bool {
        matches!(
            self,
            Error::Transport { .. }
                | Error::HttpStatus { .. }
                | Error::Parse(_)
                | Error::UrlParse(_)
                | Error::MalformedRecord(_)
                | Error::PaginationLoop { .. }
                | Error::Timeout(_)
                | Error::Cancelled
                | Error::InvalidProductCode(_)
        )
    }

    /// True when the reviews were extracted but could not be written
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, Error::StorageConflict(_) | Error::Database(_))
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Chart(err.to_string())
    }
}

/// Result type alias for opinion-miner
pub type Result<T> = std::result::Result<T, Error>;
