//! In-memory workbook with optional JSON file persistence
//!
//! A file-backed workbook may be shared by several processes (the daemon and
//! `gb propose`, say). Every operation takes an advisory lock on a sibling
//! `.lock` file, reloads the workbook from disk, and for mutations writes it
//! back before the lock is released, so no process works from a stale copy.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fs2::FileExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{Row, SheetError, Sheets};

type Workbook = BTreeMap<String, Vec<Row>>;

/// Workbook held in memory
///
/// When opened with a path, the JSON file is the source of truth: reads see
/// rows written by other processes and mutations are written back (to a temp
/// file, then renamed) while the file lock is held.
pub struct MemorySheets {
    book: Mutex<Workbook>,
    file: Option<BookFile>,
}

/// On-disk location of a file-backed workbook
struct BookFile {
    path: PathBuf,
    lock_path: PathBuf,
    sheets: Vec<String>,
    header_rows: usize,
}

impl BookFile {
    /// Open the lock file and take a shared or exclusive lock; it is released when the handle drops
    fn lock(&self, exclusive: bool) -> Result<File, SheetError> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_path)?;
        if exclusive {
            FileExt::lock_exclusive(&file)?;
        } else {
            FileExt::lock_shared(&file)?;
        }
        Ok(file)
    }

    /// Replace `book` with the file's contents, seeding any missing sheets
    fn load(&self, book: &mut Workbook) -> Result<(), SheetError> {
        if self.path.exists() {
            let content = fs::read_to_string(&self.path)?;
            *book = serde_json::from_str(&content)?;
        }
        let names: Vec<&str> = self.sheets.iter().map(String::as_str).collect();
        for (name, rows) in seed(&names, self.header_rows) {
            book.entry(name).or_insert(rows);
        }
        Ok(())
    }

    fn save(&self, book: &Workbook) -> Result<(), SheetError> {
        let tmp = sibling(&self.path, ".tmp");
        fs::write(&tmp, serde_json::to_string_pretty(book)?)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), "save: workbook written");
        Ok(())
    }
}

impl MemorySheets {
    /// Create an empty workbook with no sheets
    pub fn new() -> Self {
        Self {
            book: Mutex::new(Workbook::new()),
            file: None,
        }
    }

    /// Create a workbook whose sheets each start with `header_rows` title rows
    pub fn with_headers(sheets: &[&str], header_rows: usize) -> Self {
        debug!(?sheets, header_rows, "MemorySheets::with_headers: called");
        Self {
            book: Mutex::new(seed(sheets, header_rows)),
            file: None,
        }
    }

    /// Open a file-backed workbook, seeding missing sheets with header rows
    pub fn open(path: impl AsRef<Path>, sheets: &[&str], header_rows: usize) -> Result<Self, SheetError> {
        let path = path.as_ref().to_path_buf();
        debug!(path = %path.display(), "MemorySheets::open: called");

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = BookFile {
            lock_path: sibling(&path, ".lock"),
            path,
            sheets: sheets.iter().map(|s| s.to_string()).collect(),
            header_rows,
        };
        let mut book = Workbook::new();
        {
            let _lock = file.lock(true)?;
            file.load(&mut book)?;
            file.save(&book)?;
        }

        info!(path = %file.path.display(), sheets = book.len(), "Opened workbook");
        Ok(Self {
            book: Mutex::new(book),
            file: Some(file),
        })
    }

    /// Run `op` against the current workbook
    ///
    /// For a file-backed workbook the file is reloaded under the lock first,
    /// and written back before the lock is released when `write` is set.
    async fn transact<T>(
        &self,
        write: bool,
        op: impl FnOnce(&mut Workbook) -> Result<T, SheetError>,
    ) -> Result<T, SheetError> {
        let mut book = self.book.lock().await;
        let Some(file) = &self.file else {
            return op(&mut *book);
        };

        let _lock = file.lock(write)?;
        file.load(&mut *book)?;
        let out = op(&mut *book)?;
        if write {
            file.save(&*book)?;
        }
        Ok(out)
    }
}

impl Default for MemorySheets {
    fn default() -> Self {
        Self::new()
    }
}

fn seed(sheets: &[&str], header_rows: usize) -> Workbook {
    sheets
        .iter()
        .map(|name| {
            let headers = (0..header_rows).map(|i| vec![format!("{} header {}", name, i + 1)]).collect();
            (name.to_string(), headers)
        })
        .collect()
}

/// `path` with `suffix` appended to its file name (`book.json` -> `book.json.lock`)
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

fn sheet_mut<'a>(book: &'a mut Workbook, sheet: &str) -> Result<&'a mut Vec<Row>, SheetError> {
    book.get_mut(sheet)
        .ok_or_else(|| SheetError::SheetNotFound(sheet.to_string()))
}

#[async_trait]
impl Sheets for MemorySheets {
    async fn read(&self, sheet: &str) -> Result<Vec<Row>, SheetError> {
        debug!(%sheet, "MemorySheets::read: called");
        self.transact(false, |book| {
            book.get(sheet)
                .cloned()
                .ok_or_else(|| SheetError::SheetNotFound(sheet.to_string()))
        })
        .await
    }

    async fn append(&self, sheet: &str, row: Row) -> Result<(), SheetError> {
        debug!(%sheet, cells = row.len(), "MemorySheets::append: called");
        self.transact(true, |book| {
            sheet_mut(book, sheet)?.push(row);
            Ok(())
        })
        .await
    }

    async fn write_row(&self, sheet: &str, row_number: usize, row: Row) -> Result<(), SheetError> {
        debug!(%sheet, row_number, "MemorySheets::write_row: called");
        if row_number == 0 {
            return Err(SheetError::RowOutOfRange {
                sheet: sheet.to_string(),
                row: row_number,
            });
        }
        self.transact(true, |book| {
            let rows = sheet_mut(book, sheet)?;
            if rows.len() < row_number {
                rows.resize(row_number, Vec::new());
            }
            rows[row_number - 1] = row;
            Ok(())
        })
        .await
    }

    async fn clear_row(&self, sheet: &str, row_number: usize) -> Result<(), SheetError> {
        debug!(%sheet, row_number, "MemorySheets::clear_row: called");
        self.transact(true, |book| match sheet_mut(book, sheet)?.get_mut(row_number.wrapping_sub(1)) {
            Some(row) => {
                row.clear();
                Ok(())
            }
            None => Err(SheetError::RowOutOfRange {
                sheet: sheet.to_string(),
                row: row_number,
            }),
        })
        .await
    }
}
