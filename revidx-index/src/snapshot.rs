// Copyright 2025 Revidx Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Snapshot queries: what changed at a revision, and what is live as of it.
//!
//! The full-tree view is never recomputed here. Ingestion materializes the
//! live-file association (carry-forward), and these operations only filter
//! the materialized rows, so cost is proportional to the live-file count of
//! one revision rather than the history length.

use revidx_core::{FileEntry, HistoryError, Result, RevisionRecord};
use revidx_storage::HistoryStore;
use std::sync::Arc;

/// Snapshot composition queries for ingested revisions.
///
/// Holds an explicit store handle; there is no ambient store singleton.
pub struct SnapshotIndex {
    store: Arc<HistoryStore>,
}

impl SnapshotIndex {
    pub fn new(store: Arc<HistoryStore>) -> Self {
        Self { store }
    }

    /// Entries changed AT the revision: the commit's own delta, nothing
    /// carried forward.
    pub fn version_files(&self, revision: &RevisionRecord) -> Result<Vec<FileEntry>> {
        let txn = self.store.read();
        let rows = txn
            .changed_files(revision.project, revision.order)
            .ok_or_else(|| unknown_revision(revision))?;
        Ok(rows.iter().map(|row| FileEntry::clone(row)).collect())
    }

    /// All regular files live as of the revision: entries whose most recent
    /// change at or before it is not a deletion. Possibly empty, never an
    /// error for an ingested revision.
    pub fn files_for_version(&self, revision: &RevisionRecord) -> Result<Vec<FileEntry>> {
        self.live_filtered(revision, false)
    }

    /// All directories live as of the revision.
    pub fn directories_for_version(&self, revision: &RevisionRecord) -> Result<Vec<FileEntry>> {
        self.live_filtered(revision, true)
    }

    fn live_filtered(&self, revision: &RevisionRecord, directories: bool) -> Result<Vec<FileEntry>> {
        let txn = self.store.read();
        let rows = txn
            .live_files(revision.project, revision.order)
            .ok_or_else(|| unknown_revision(revision))?;
        Ok(rows
            .iter()
            .filter(|row| row.is_directory == directories)
            .map(|row| FileEntry::clone(row))
            .collect())
    }
}

/// A revision that was never ingested into this store is a programmer
/// error, distinct from a valid empty result.
fn unknown_revision(revision: &RevisionRecord) -> HistoryError {
    HistoryError::InvalidArgument(format!("revision {revision} was never ingested"))
}
