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

//! Ordinal navigation and revision lookups.
//!
//! Every lookup runs inside one read transaction and returns `Ok(None)` for
//! "not found"; a missing revision is an expected outcome, never an error.

use revidx_core::{ProjectId, Result, RevisionRecord};
use revidx_storage::HistoryStore;
use std::sync::Arc;

/// Navigation over a project's revision history.
///
/// Holds an explicit store handle; there is no ambient store singleton.
pub struct HistoryNavigator {
    store: Arc<HistoryStore>,
}

impl HistoryNavigator {
    pub fn new(store: Arc<HistoryStore>) -> Self {
        Self { store }
    }

    /// The most recent revision before `revision` in its project, or `None`
    /// if it is the first.
    pub fn previous(&self, revision: &RevisionRecord) -> Result<Option<RevisionRecord>> {
        let txn = self.store.read();
        Ok(txn.revision_before(revision.project, revision.order).cloned())
    }

    /// The earliest revision after `revision` in its project, or `None` if
    /// it is the last.
    pub fn next(&self, revision: &RevisionRecord) -> Result<Option<RevisionRecord>> {
        let txn = self.store.read();
        Ok(txn.revision_after(revision.project, revision.order).cloned())
    }

    /// Look up a revision by its SCM-provided identifier.
    ///
    /// This is a lookup, not a creation: ingestion may lag the SCM, so an
    /// unknown id simply yields `None`.
    pub fn by_revision_id(
        &self,
        project: ProjectId,
        revision_id: &str,
    ) -> Result<Option<RevisionRecord>> {
        let txn = self.store.read();
        Ok(txn.revision_by_external_id(project, revision_id).cloned())
    }

    /// Look up a revision by commit timestamp.
    ///
    /// Clock resolution or rapid commits can leave several revisions on the
    /// same timestamp; the one with the smallest order is returned, so
    /// repeated calls agree.
    pub fn by_timestamp(
        &self,
        project: ProjectId,
        timestamp_ms: i64,
    ) -> Result<Option<RevisionRecord>> {
        let txn = self.store.read();
        Ok(txn.revision_by_timestamp(project, timestamp_ms).cloned())
    }

    /// The oldest recorded revision (order 1), or `None` if no history has
    /// been ingested.
    pub fn first(&self, project: ProjectId) -> Result<Option<RevisionRecord>> {
        let txn = self.store.read();
        Ok(txn.first_revision(project).cloned())
    }

    /// The revision with the maximal order; unambiguous even when orders
    /// have gaps.
    pub fn last(&self, project: ProjectId) -> Result<Option<RevisionRecord>> {
        let txn = self.store.read();
        Ok(txn.last_revision(project).cloned())
    }
}
