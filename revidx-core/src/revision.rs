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

//! Revision records and their total order.
//!
//! A revision's `order` is assigned by the ingester and is the only reliable
//! ordering signal: timestamps can collide or regress under clock skew, and
//! external revision ids carry no ordering at all. The order is strictly
//! increasing within a project; gaps are allowed, ties are not.

use crate::error::{HistoryError, Result};
use crate::project::ProjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A typed developer identifier (the committer reference).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct DeveloperId(pub u64);

impl std::fmt::Display for DeveloperId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "developer:{}", self.0)
    }
}

/// One committed change-set of a project, immutable after ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionRecord {
    /// The project this revision belongs to.
    pub project: ProjectId,

    /// The SCM-provided revision identifier, unique within the project.
    pub revision_id: String,

    /// Position in the project's history order. Strictly increasing,
    /// ingester-assigned; may have gaps, never ties.
    pub order: u64,

    /// Commit time in milliseconds since the epoch.
    pub timestamp_ms: i64,

    /// The developer who made this revision.
    pub committer: DeveloperId,

    /// The commit message as recorded by the SCM.
    pub message: String,

    /// Opaque SCM properties attached to this revision.
    pub properties: serde_json::Value,
}

impl RevisionRecord {
    /// Commit time as a UTC datetime, if the timestamp is representable.
    pub fn date(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp_ms)
    }

    /// Compare two revisions by their history order.
    ///
    /// Both revisions must belong to the same project; comparing across
    /// projects is a programmer error and fails with `InvalidComparison`
    /// naming both projects.
    pub fn cmp_order(&self, other: &RevisionRecord) -> Result<Ordering> {
        if self.project != other.project {
            return Err(HistoryError::InvalidComparison {
                left: self.project,
                right: other.project,
            });
        }
        Ok(self.order.cmp(&other.order))
    }

    /// Less-than-or-equal (operator `<=`) in terms of revision order.
    pub fn lte(&self, other: &RevisionRecord) -> Result<bool> {
        Ok(self.cmp_order(other)? != Ordering::Greater)
    }

    /// Less-than (operator `<`) in terms of revision order.
    pub fn lt(&self, other: &RevisionRecord) -> Result<bool> {
        Ok(self.cmp_order(other)? == Ordering::Less)
    }

    /// Greater-than-or-equal (operator `>=`) in terms of revision order.
    pub fn gte(&self, other: &RevisionRecord) -> Result<bool> {
        Ok(self.cmp_order(other)? != Ordering::Less)
    }

    /// Greater-than (operator `>`) in terms of revision order.
    pub fn gt(&self, other: &RevisionRecord) -> Result<bool> {
        Ok(self.cmp_order(other)? == Ordering::Greater)
    }

    /// Semantic equality: external id and order both match.
    ///
    /// Intentionally narrower than object identity, so two loaded copies of
    /// the same persisted revision compare equal.
    pub fn same_revision(&self, other: &RevisionRecord) -> Result<bool> {
        // Same project guard as the ordering predicates.
        self.cmp_order(other)?;
        Ok(self.revision_id == other.revision_id && self.order == other.order)
    }
}

impl std::fmt::Display for RevisionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} r{} (order {})", self.project, self.revision_id, self.order)
    }
}

/// An optional named marker on a revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub project: ProjectId,
    pub name: String,
    pub revision_order: u64,
}
