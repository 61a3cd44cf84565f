//! Proposal store errors

use sheetstore::SheetError;
use thiserror::Error;

/// Errors from proposal store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Proposal not found: {0}")]
    NotFound(String),

    #[error("Sheet error: {0}")]
    Sheet(#[from] SheetError),
}

/// Why a row could not be decoded into a proposal
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("row has no id")]
    MissingId,

    #[error("unreadable date in column {column}: {value:?}")]
    BadDate { column: &'static str, value: String },
}
