//! Google Sheets API v4 backend
//!
//! Values are read with `FORMULA` rendering so date formulas come back as
//! their source text, and written with `USER_ENTERED` so formulas are
//! evaluated by the sheet. Every other non-empty cell is sent with a leading
//! `'` so the sheet keeps it as text instead of parsing numbers, booleans or
//! dates out of it; the quote is not part of the stored value and does not
//! come back on read.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{Row, SheetError, Sheets, row_range};

/// Maximum number of retries for transient errors
const MAX_RETRIES: u32 = 3;

/// Initial backoff delay for retries
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Check if an HTTP status code is retryable
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

/// Connection settings for a spreadsheet
#[derive(Debug, Clone)]
pub struct GoogleSheetsConfig {
    /// Spreadsheet ID (from the sheet URL)
    pub spreadsheet_id: String,

    /// OAuth2 bearer token with the spreadsheets scope
    pub access_token: String,

    /// API base URL, e.g. `https://sheets.googleapis.com/v4`
    pub base_url: String,

    /// Per-request timeout
    pub timeout: Duration,
}

/// Response body of `values.get`
#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Google Sheets client
pub struct GoogleSheets {
    config: GoogleSheetsConfig,
    http: Client,
}

impl GoogleSheets {
    /// Create a new client
    pub fn new(config: GoogleSheetsConfig) -> Result<Self, SheetError> {
        debug!(spreadsheet_id = %config.spreadsheet_id, base_url = %config.base_url, "GoogleSheets::new: called");
        if config.access_token.is_empty() {
            return Err(SheetError::Credentials("Google Sheets access token is empty".to_string()));
        }
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, http })
    }

    /// Build `{base}/spreadsheets/{id}/values/{segment}` with each part percent-encoded
    fn values_url(&self, segment: &str) -> Result<Url, SheetError> {
        let mut url = Url::parse(&self.config.base_url).map_err(|e| SheetError::Api {
            status: 0,
            message: format!("Invalid base URL '{}': {}", self.config.base_url, e),
        })?;
        url.path_segments_mut()
            .map_err(|_| SheetError::Api {
                status: 0,
                message: format!("Base URL cannot be a base: {}", self.config.base_url),
            })?
            .pop_if_empty()
            .push("spreadsheets")
            .push(&self.config.spreadsheet_id)
            .push("values")
            .push(segment);
        Ok(url)
    }

    /// `values.append` URL; OVERWRITE writes below the last row instead of inserting, so row numbers never shift
    fn append_url(&self, sheet: &str) -> Result<Url, SheetError> {
        let mut url = self.values_url(&format!("{}:append", quoted(sheet)))?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED")
            .append_pair("insertDataOption", "OVERWRITE");
        Ok(url)
    }

    /// Send a request, retrying transient failures with exponential backoff
    async fn send<F>(&self, build: F) -> Result<reqwest::Response, SheetError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            let response = build().bearer_auth(&self.config.access_token).send().await?;
            let status = response.status().as_u16();

            if response.status().is_success() {
                return Ok(response);
            }

            if is_retryable_status(status) && attempt < MAX_RETRIES {
                let backoff = Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt));
                warn!(status, attempt, ?backoff, "Sheets API transient error, retrying");
                tokio::time::sleep(backoff).await;
                attempt += 1;
                continue;
            }

            let message = response.text().await.unwrap_or_default();
            debug!(status, %message, "send: API error");
            return Err(SheetError::Api { status, message });
        }
    }
}

/// Render a cell as the string the sheet would display in formula mode
fn cell_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Cell as sent under `USER_ENTERED`: formulas as-is, anything else forced to text
fn input_cell(cell: &str) -> String {
    if cell.is_empty() || cell.starts_with('=') {
        cell.to_string()
    } else {
        format!("'{}", cell)
    }
}

fn input_row(row: &[String]) -> Vec<String> {
    row.iter().map(|c| input_cell(c)).collect()
}

fn quoted(sheet: &str) -> String {
    format!("'{}'", sheet.replace('\'', "''"))
}

#[async_trait]
impl Sheets for GoogleSheets {
    async fn read(&self, sheet: &str) -> Result<Vec<Row>, SheetError> {
        debug!(%sheet, "GoogleSheets::read: called");
        let mut url = self.values_url(&quoted(sheet))?;
        url.query_pairs_mut().append_pair("valueRenderOption", "FORMULA");

        let response = self.send(|| self.http.get(url.clone())).await?;
        let body: ValueRange = response.json().await?;

        let rows: Vec<Row> = body
            .values
            .iter()
            .map(|row| row.iter().map(cell_to_string).collect())
            .collect();
        debug!(%sheet, rows = rows.len(), "GoogleSheets::read: done");
        Ok(rows)
    }

    async fn append(&self, sheet: &str, row: Row) -> Result<(), SheetError> {
        debug!(%sheet, cells = row.len(), "GoogleSheets::append: called");
        let url = self.append_url(sheet)?;
        let body = serde_json::json!({
            "majorDimension": "ROWS",
            "values": [input_row(&row)],
        });
        self.send(|| self.http.post(url.clone()).json(&body)).await?;
        Ok(())
    }

    async fn write_row(&self, sheet: &str, row_number: usize, row: Row) -> Result<(), SheetError> {
        debug!(%sheet, row_number, "GoogleSheets::write_row: called");
        if row_number == 0 {
            return Err(SheetError::RowOutOfRange {
                sheet: sheet.to_string(),
                row: row_number,
            });
        }
        let range = row_range(sheet, row_number);
        let mut url = self.values_url(&range)?;
        url.query_pairs_mut().append_pair("valueInputOption", "USER_ENTERED");

        let body = serde_json::json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": [input_row(&row)],
        });
        self.send(|| self.http.put(url.clone()).json(&body)).await?;
        Ok(())
    }

    async fn clear_row(&self, sheet: &str, row_number: usize) -> Result<(), SheetError> {
        debug!(%sheet, row_number, "GoogleSheets::clear_row: called");
        if row_number == 0 {
            return Err(SheetError::RowOutOfRange {
                sheet: sheet.to_string(),
                row: row_number,
            });
        }
        let url = self.values_url(&format!("{}:clear", row_range(sheet, row_number)))?;
        self.send(|| self.http.post(url.clone()).json(&serde_json::json!({}))).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GoogleSheets {
        GoogleSheets::new(GoogleSheetsConfig {
            spreadsheet_id: "sheet123".to_string(),
            access_token: "token".to_string(),
            base_url: "https://sheets.googleapis.com/v4".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn test_empty_token_rejected() {
        let result = GoogleSheets::new(GoogleSheetsConfig {
            spreadsheet_id: "sheet123".to_string(),
            access_token: String::new(),
            base_url: "https://sheets.googleapis.com/v4".to_string(),
            timeout: Duration::from_secs(5),
        });
        assert!(matches!(result, Err(SheetError::Credentials(_))));
    }

    #[test]
    fn test_values_url_encodes_sheet_name() {
        let url = client().values_url(&quoted("Denied/Postponed")).unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/sheet123/values/'Denied%2FPostponed'"
        );
    }

    #[test]
    fn test_append_url_overwrites() {
        let url = client().append_url("Approved").unwrap();
        assert_eq!(url.path(), "/v4/spreadsheets/sheet123/values/'Approved':append");
        assert_eq!(
            url.query(),
            Some("valueInputOption=USER_ENTERED&insertDataOption=OVERWRITE")
        );
    }

    #[test]
    fn test_cell_to_string() {
        assert_eq!(cell_to_string(&serde_json::json!("abc")), "abc");
        assert_eq!(cell_to_string(&serde_json::json!(3)), "3");
        assert_eq!(cell_to_string(&serde_json::json!(true)), "true");
        assert_eq!(cell_to_string(&Value::Null), "");
    }

    #[test]
    fn test_input_cells_forced_to_text() {
        assert_eq!(input_cell("=1/1000 + DATE(1970,1,1)"), "=1/1000 + DATE(1970,1,1)");
        assert_eq!(input_cell(""), "");
        assert_eq!(input_cell("0012"), "'0012");
        assert_eq!(input_cell("TRUE"), "'TRUE");
        assert_eq!(input_cell("'=x"), "''=x");
    }

    #[test]
    fn test_retryable_status() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(404));
    }
}
