//! Row codec: one proposal per sheet row
//!
//! Column layout (A..N):
//!
//! | col | field            | encoding                                   |
//! |-----|------------------|--------------------------------------------|
//! | A   | id               | text                                       |
//! | B   | name             | text                                       |
//! | C   | proposed_by      | text                                       |
//! | D   | kind             | text                                       |
//! | E   | description      | text                                       |
//! | F   | coordinates      | text, empty = none                         |
//! | G   | image_link       | text, empty = none                         |
//! | H   | thread_link      | text                                       |
//! | I   | date_proposed    | date formula                               |
//! | J   | action_date      | date formula, empty = none                 |
//! | K   | objections       | JSON array (comma-separated also read)     |
//! | L   | num_extensions   | integer, unreadable = 0                    |
//! | M   | context          | JSON, empty or unreadable = none           |
//! | N   | pending move     | source sheet name while a move is underway |
//!
//! Dates are written as a spreadsheet formula so the sheet displays them as
//! dates while the exact millisecond value stays recoverable.
//!
//! Text cells are stored verbatim. One that would read as a formula (leading
//! `=`) or that starts with the escape quote itself gets a leading `'`, which
//! decoding strips again.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use sheetstore::{MAX_COLUMNS, Row};
use tracing::warn;

use super::DecodeError;
use crate::domain::{Partition, Proposal, VoteContext};

const COL_ID: usize = 0;
const COL_NAME: usize = 1;
const COL_PROPOSED_BY: usize = 2;
const COL_KIND: usize = 3;
const COL_DESCRIPTION: usize = 4;
const COL_COORDINATES: usize = 5;
const COL_IMAGE_LINK: usize = 6;
const COL_THREAD_LINK: usize = 7;
const COL_DATE_PROPOSED: usize = 8;
const COL_ACTION_DATE: usize = 9;
const COL_OBJECTIONS: usize = 10;
const COL_NUM_EXTENSIONS: usize = 11;
const COL_CONTEXT: usize = 12;
const COL_PENDING_MOVE: usize = 13;

static FORMULA_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^=\s*(-?\d+)").expect("valid regex"));

static LITERAL_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})(?:\s+(\d{1,2}):(\d{2})(?::(\d{2}))?)?$").expect("valid regex")
});

/// Encode a proposal as a settled row (no pending-move marker)
pub fn encode(proposal: &Proposal) -> Row {
    let mut row = vec![String::new(); MAX_COLUMNS];
    row[COL_ID] = proposal.id.clone();
    row[COL_NAME] = escape_text(&proposal.name);
    row[COL_PROPOSED_BY] = escape_text(&proposal.proposed_by);
    row[COL_KIND] = escape_text(&proposal.kind);
    row[COL_DESCRIPTION] = escape_text(&proposal.description);
    row[COL_COORDINATES] = proposal.coordinates.as_deref().map(escape_text).unwrap_or_default();
    row[COL_IMAGE_LINK] = proposal.image_link.as_deref().map(escape_text).unwrap_or_default();
    row[COL_THREAD_LINK] = escape_text(&proposal.thread_link);
    row[COL_DATE_PROPOSED] = date_formula(proposal.date_proposed);
    row[COL_ACTION_DATE] = proposal.action_date.map(date_formula).unwrap_or_default();
    row[COL_OBJECTIONS] = encode_objections(&proposal.objections);
    row[COL_NUM_EXTENSIONS] = proposal.num_extensions.to_string();
    row[COL_CONTEXT] = proposal
        .context
        .as_ref()
        .and_then(|ctx| serde_json::to_string(ctx).ok())
        .unwrap_or_default();
    row
}

/// Encode a proposal as the in-flight copy of a partition move from `source`
pub fn encode_marked(proposal: &Proposal, source: Partition) -> Row {
    let mut row = encode(proposal);
    row[COL_PENDING_MOVE] = source.sheet_name().to_string();
    row
}

/// Decode a row into a proposal
///
/// Rows written before the pending-move column existed (13 cells) decode the
/// same way; missing trailing cells read as empty. Only the id, date, count,
/// and context cells are trimmed; text cells come back exactly as written.
pub fn decode(row: &[String]) -> Result<Proposal, DecodeError> {
    let cell = |i: usize| row.get(i).map(|s| s.trim()).unwrap_or("");
    let text = |i: usize| unescape_text(row.get(i).map(String::as_str).unwrap_or(""));

    let id = cell(COL_ID);
    if id.is_empty() {
        return Err(DecodeError::MissingId);
    }

    let date_proposed = parse_date(cell(COL_DATE_PROPOSED)).ok_or_else(|| DecodeError::BadDate {
        column: "dateProposed",
        value: cell(COL_DATE_PROPOSED).to_string(),
    })?;

    let action_date = match cell(COL_ACTION_DATE) {
        "" => None,
        raw => Some(parse_date(raw).ok_or_else(|| DecodeError::BadDate {
            column: "actionDate",
            value: raw.to_string(),
        })?),
    };

    Ok(Proposal {
        id: id.to_string(),
        name: text(COL_NAME),
        description: text(COL_DESCRIPTION),
        proposed_by: text(COL_PROPOSED_BY),
        kind: text(COL_KIND),
        coordinates: non_empty(text(COL_COORDINATES)),
        image_link: non_empty(text(COL_IMAGE_LINK)),
        thread_link: text(COL_THREAD_LINK),
        date_proposed,
        action_date,
        num_extensions: parse_count(cell(COL_NUM_EXTENSIONS)),
        objections: decode_objections(cell(COL_OBJECTIONS)),
        context: parse_context(id, cell(COL_CONTEXT)),
    })
}

/// The source partition named by a row's pending-move marker, if any
pub fn pending_move(row: &[String]) -> Option<Partition> {
    row.get(COL_PENDING_MOVE)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .and_then(Partition::from_sheet_name)
}

/// The id cell of a row, without decoding the rest
pub fn row_id(row: &[String]) -> Option<&str> {
    row.get(COL_ID).map(|s| s.trim()).filter(|s| !s.is_empty())
}

/// Whether a row has been cleared (every cell empty)
pub fn is_blank(row: &[String]) -> bool {
    row.iter().all(|c| c.trim().is_empty())
}

/// Spreadsheet formula that evaluates to the date for `ms`
pub fn date_formula(ms: i64) -> String {
    format!("={}/1000/60/60/24 + DATE(1970,1,1)", ms)
}

/// Parse a date cell: our formula, a literal `M/D/YYYY[ H:MM[:SS]]` (UTC), or raw milliseconds
pub fn parse_date(raw: &str) -> Option<i64> {
    let raw = raw.trim();

    if raw.starts_with('=') {
        return FORMULA_RE.captures(raw)?.get(1)?.as_str().parse().ok();
    }

    if let Some(caps) = LITERAL_DATE_RE.captures(raw) {
        let num = |i: usize| caps.get(i).map_or(Some(0), |m| m.as_str().parse::<u32>().ok());
        let year = caps.get(3)?.as_str().parse::<i32>().ok()?;
        let date = NaiveDate::from_ymd_opt(year, num(1)?, num(2)?)?;
        let time = date.and_hms_opt(num(4)?, num(5)?, num(6)?)?;
        return Some(time.and_utc().timestamp_millis());
    }

    raw.parse().ok()
}

fn parse_count(raw: &str) -> u32 {
    raw.parse::<u32>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().filter(|f| *f >= 0.0).map(|f| f as u32))
        .unwrap_or(0)
}

fn parse_context(id: &str, raw: &str) -> Option<VoteContext> {
    if raw.is_empty() {
        return None;
    }
    match serde_json::from_str(raw) {
        Ok(ctx) => Some(ctx),
        Err(e) => {
            warn!(%id, error = %e, "parse_context: unreadable context, ignoring");
            None
        }
    }
}

fn non_empty(s: String) -> Option<String> {
    (!s.is_empty()).then_some(s)
}

fn escape_text(s: &str) -> String {
    if s.starts_with('=') || s.starts_with('\'') {
        format!("'{}", s)
    } else {
        s.to_string()
    }
}

fn unescape_text(s: &str) -> String {
    s.strip_prefix('\'').unwrap_or(s).to_string()
}

fn encode_objections(objections: &[String]) -> String {
    if objections.is_empty() {
        return String::new();
    }
    serde_json::to_string(objections).unwrap_or_default()
}

/// JSON array as written by `encode`; older rows hold a comma-separated list
fn decode_objections(raw: &str) -> Vec<String> {
    if raw.starts_with('[')
        && let Ok(list) = serde_json::from_str::<Vec<String>>(raw)
    {
        return list;
    }
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
