//! SheetStore errors

use thiserror::Error;

/// Errors from sheet operations
#[derive(Debug, Error)]
pub enum SheetError {
    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    #[error("Row {row} out of range for sheet '{sheet}'")]
    RowOutOfRange { sheet: String, row: usize },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Missing credentials: {0}")]
    Credentials(String),
}
