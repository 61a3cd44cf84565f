//! SheetStore - row-oriented spreadsheet storage
//!
//! A workbook is a set of named sheets, each a list of rows of string cells.
//! Rows are addressed by their 1-based row number (A1 notation), so a row
//! keeps its number even after the rows around it are cleared.
//!
//! # Backends
//!
//! - [`MemorySheets`] - in-memory workbook, optionally persisted to a JSON file
//! - [`GoogleSheets`] - Google Sheets API v4 over HTTPS
//!
//! # Example
//!
//! ```ignore
//! use sheetstore::{MemorySheets, Sheets};
//!
//! let sheets = MemorySheets::with_headers(&["In Progress"], 2);
//! sheets.append("In Progress", vec!["id-1".into(), "Station".into()]).await?;
//! let rows = sheets.read("In Progress").await?;
//! ```

mod error;
mod google;
mod memory;

use async_trait::async_trait;

pub use error::SheetError;
pub use google::{GoogleSheets, GoogleSheetsConfig};
pub use memory::MemorySheets;

/// A row of cell values
pub type Row = Vec<String>;

/// Widest row any caller writes (columns A..N)
pub const MAX_COLUMNS: usize = 14;

/// Storage operations over a workbook of named sheets
///
/// A cell starting with `=` is a formula; any other cell is literal text.
/// Implementations never interpret cell contents beyond that: formulas are
/// stored and returned as their source text, and text comes back exactly as
/// written.
#[async_trait]
pub trait Sheets: Send + Sync {
    /// Read every row of a sheet, header rows included, in sheet order
    ///
    /// Cleared rows come back as empty vectors so that the index of a row
    /// in the returned vector is always `row_number - 1`.
    async fn read(&self, sheet: &str) -> Result<Vec<Row>, SheetError>;

    /// Append a row after the last row of the sheet
    async fn append(&self, sheet: &str, row: Row) -> Result<(), SheetError>;

    /// Overwrite the row at `row_number` (1-based)
    async fn write_row(&self, sheet: &str, row_number: usize, row: Row) -> Result<(), SheetError>;

    /// Clear every cell of the row at `row_number` (1-based)
    async fn clear_row(&self, sheet: &str, row_number: usize) -> Result<(), SheetError>;
}

/// Column letter for a 0-based column index (0 -> A, 25 -> Z, 26 -> AA)
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// A1 range covering one full row of a sheet, e.g. `'In Progress'!A3:N3`
pub fn row_range(sheet: &str, row_number: usize) -> String {
    format!(
        "'{}'!A{}:{}{}",
        sheet.replace('\'', "''"),
        row_number,
        column_letter(MAX_COLUMNS - 1),
        row_number
    )
}
