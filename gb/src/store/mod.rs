//! Proposal store adapter
//!
//! Maps proposals onto a three-sheet workbook, one sheet per partition. A
//! proposal's partition is the sheet its row lives in.
//!
//! Moving a proposal between partitions is not atomic on a spreadsheet, so
//! moves follow a marker protocol:
//!
//! 1. append the updated row to the target sheet, marked with the source partition
//! 2. clear the source row
//! 3. rewrite the target row without the marker
//!
//! A crash at any point leaves the proposal in one or two sheets, never zero.
//! Readers prefer the marked copy, and [`ProposalStore::repair`] settles
//! whatever a crash left behind.

pub mod codec;
mod error;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use sheetstore::Sheets;
use tracing::{debug, info, warn};

pub use error::{DecodeError, StoreError};

use crate::domain::{AllProposals, Partition, Proposal};

/// Title rows at the top of every sheet
pub const DEFAULT_HEADER_ROWS: usize = 2;

/// One decoded row and where it lives
#[derive(Debug, Clone)]
struct StoredRow {
    partition: Partition,
    row_number: usize,
    proposal: Proposal,
    pending_move: Option<Partition>,
}

/// Durable proposal storage over a [`Sheets`] workbook
#[derive(Clone)]
pub struct ProposalStore {
    sheets: Arc<dyn Sheets>,
    header_rows: usize,
}

impl ProposalStore {
    pub fn new(sheets: Arc<dyn Sheets>, header_rows: usize) -> Self {
        debug!(header_rows, "ProposalStore::new: called");
        Self { sheets, header_rows }
    }

    /// Append a proposal to a partition (no uniqueness check)
    pub async fn insert(&self, proposal: &Proposal, partition: Partition) -> Result<(), StoreError> {
        debug!(id = %proposal.id, %partition, "insert: called");
        self.sheets
            .append(partition.sheet_name(), codec::encode(proposal))
            .await?;
        info!(id = %proposal.id, name = %proposal.name, %partition, "Inserted proposal");
        Ok(())
    }

    /// Every proposal, grouped by partition, with duplicate copies resolved
    pub async fn list_all(&self) -> Result<AllProposals, StoreError> {
        debug!("list_all: called");
        let rows = self.scan().await?;
        let keep: HashSet<usize> = winners(&rows).into_values().collect();

        let mut all = AllProposals::default();
        for (i, row) in rows.into_iter().enumerate() {
            if keep.contains(&i) {
                all.push(row.partition, row.proposal);
            }
        }
        debug!(
            approved = all.approved.len(),
            in_progress = all.in_progress.len(),
            denied = all.denied.len(),
            "list_all: done"
        );
        Ok(all)
    }

    /// Find one proposal and its partition
    pub async fn find(&self, id: &str) -> Result<Option<(Partition, Proposal)>, StoreError> {
        debug!(%id, "find: called");
        Ok(self
            .locate(id)
            .await?
            .map(|(winner, _)| (winner.partition, winner.proposal)))
    }

    /// Remove every row carrying `id`
    ///
    /// Sheets are scanned Approved, Denied, then In Progress; the partition
    /// of the first match is returned.
    pub async fn remove(&self, id: &str) -> Result<Partition, StoreError> {
        debug!(%id, "remove: called");
        let mut found = None;

        for partition in Partition::REMOVAL_ORDER {
            let sheet = partition.sheet_name();
            let rows = self.sheets.read(sheet).await?;
            for (index, row) in rows.iter().enumerate().skip(self.header_rows) {
                if codec::row_id(row) == Some(id) {
                    self.sheets.clear_row(sheet, index + 1).await?;
                    found.get_or_insert(partition);
                }
            }
        }

        match found {
            Some(partition) => {
                info!(%id, %partition, "Removed proposal");
                Ok(partition)
            }
            None => {
                debug!(%id, "remove: not found");
                Err(StoreError::NotFound(id.to_string()))
            }
        }
    }

    /// Overwrite a proposal's row in place
    pub async fn update(&self, proposal: &Proposal) -> Result<(), StoreError> {
        debug!(id = %proposal.id, "update: called");
        let (winner, _) = self
            .locate(&proposal.id)
            .await?
            .ok_or_else(|| StoreError::NotFound(proposal.id.clone()))?;

        self.sheets
            .write_row(
                winner.partition.sheet_name(),
                winner.row_number,
                codec::encode(proposal),
            )
            .await?;
        debug!(id = %proposal.id, partition = %winner.partition, row = winner.row_number, "update: written");
        Ok(())
    }

    /// Move a proposal to `target`, writing its updated fields
    pub async fn move_to(&self, proposal: &Proposal, target: Partition) -> Result<(), StoreError> {
        debug!(id = %proposal.id, %target, "move_to: called");
        let (winner, copies) = self
            .locate(&proposal.id)
            .await?
            .ok_or_else(|| StoreError::NotFound(proposal.id.clone()))?;

        let source = winner.partition;
        if source == target && copies.len() == 1 {
            debug!(id = %proposal.id, "move_to: already in target, updating in place");
            return self.update(proposal).await;
        }

        let target_sheet = target.sheet_name();
        self.sheets
            .append(target_sheet, codec::encode_marked(proposal, source))
            .await?;

        for copy in &copies {
            self.sheets
                .clear_row(copy.partition.sheet_name(), copy.row_number)
                .await?;
        }

        let rows = self.sheets.read(target_sheet).await?;
        let marked = rows
            .iter()
            .enumerate()
            .skip(self.header_rows)
            .rev()
            .find(|(_, row)| codec::row_id(row) == Some(proposal.id.as_str()) && codec::pending_move(row).is_some())
            .map(|(index, _)| index + 1);

        match marked {
            Some(row_number) => {
                self.sheets
                    .write_row(target_sheet, row_number, codec::encode(proposal))
                    .await?;
            }
            None => {
                warn!(id = %proposal.id, %target, "move_to: marked copy not found after append, leaving for repair");
            }
        }

        info!(id = %proposal.id, from = %source, to = %target, "Moved proposal");
        Ok(())
    }

    /// Settle interrupted moves and collapse duplicate copies
    ///
    /// Returns the number of rows changed.
    pub async fn repair(&self) -> Result<usize, StoreError> {
        debug!("repair: called");
        let rows = self.scan().await?;
        let winners = winners(&rows);
        let mut changed = 0;

        for (i, row) in rows.iter().enumerate() {
            let sheet = row.partition.sheet_name();
            if winners.get(row.proposal.id.as_str()) != Some(&i) {
                debug!(id = %row.proposal.id, partition = %row.partition, row = row.row_number, "repair: clearing stale copy");
                self.sheets.clear_row(sheet, row.row_number).await?;
                changed += 1;
            } else if row.pending_move.is_some() {
                debug!(id = %row.proposal.id, partition = %row.partition, "repair: settling pending move");
                self.sheets
                    .write_row(sheet, row.row_number, codec::encode(&row.proposal))
                    .await?;
                changed += 1;
            }
        }

        if changed > 0 {
            info!(changed, "Repaired store");
        }
        Ok(changed)
    }

    /// The winning copy of `id` plus every copy (winner included)
    async fn locate(&self, id: &str) -> Result<Option<(StoredRow, Vec<StoredRow>)>, StoreError> {
        let rows = self.scan().await?;
        let winner = winners(&rows).get(id).map(|&i| rows[i].clone());
        Ok(winner.map(|w| (w, rows.into_iter().filter(|r| r.proposal.id == id).collect())))
    }

    /// Decode every data row of every partition, in store order
    async fn scan(&self) -> Result<Vec<StoredRow>, StoreError> {
        let mut out = Vec::new();
        for partition in Partition::ALL {
            let sheet = partition.sheet_name();
            let rows = self.sheets.read(sheet).await?;
            for (index, row) in rows.iter().enumerate().skip(self.header_rows) {
                if codec::is_blank(row) {
                    continue;
                }
                match codec::decode(row) {
                    Ok(proposal) => out.push(StoredRow {
                        partition,
                        row_number: index + 1,
                        proposal,
                        pending_move: codec::pending_move(row),
                    }),
                    Err(e) => warn!(%sheet, row = index + 1, error = %e, "scan: skipping malformed row"),
                }
            }
        }
        Ok(out)
    }
}

/// Index of the winning copy for each id
///
/// A marked copy beats an unmarked one; otherwise the higher renewal count
/// wins, then the later deadline, then the first copy in store order.
fn winners(rows: &[StoredRow]) -> HashMap<&str, usize> {
    let mut best: HashMap<&str, usize> = HashMap::new();
    for (i, row) in rows.iter().enumerate() {
        let id = row.proposal.id.as_str();
        match best.get(id) {
            Some(&j) if !outranks(row, &rows[j]) => {}
            _ => {
                best.insert(id, i);
            }
        }
    }
    best
}

fn outranks(a: &StoredRow, b: &StoredRow) -> bool {
    match (a.pending_move.is_some(), b.pending_move.is_some()) {
        (true, false) => true,
        (false, true) => false,
        _ => (a.proposal.num_extensions, a.proposal.action_date) > (b.proposal.num_extensions, b.proposal.action_date),
    }
}
