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

//! File entries: the state a path took at one revision.

use crate::project::ProjectId;
use serde::{Deserialize, Serialize};

/// Status a file took at a revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
    /// Deleted and re-added within one revision (SVN-style replace).
    Replaced,
}

impl FileStatus {
    /// All statuses, in a stable order. Useful for per-status aggregation.
    pub const ALL: [FileStatus; 4] = [
        FileStatus::Added,
        FileStatus::Modified,
        FileStatus::Deleted,
        FileStatus::Replaced,
    ];

    /// Stable string form, as recorded by the ingester.
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Added => "ADDED",
            FileStatus::Modified => "MODIFIED",
            FileStatus::Deleted => "DELETED",
            FileStatus::Replaced => "REPLACED",
        }
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One file's state as of one revision.
///
/// An entry is created by the revision that changed the path and carried
/// forward, unchanged, into the live set of later revisions until the path
/// is changed again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub project: ProjectId,

    /// Project-relative path.
    pub path: String,

    /// Whether this entry names a directory rather than a regular file.
    pub is_directory: bool,

    pub status: FileStatus,

    /// Order of the revision that introduced this state.
    pub revision_order: u64,
}

impl FileEntry {
    /// Whether this entry removes the path from the live set.
    pub fn is_deleted(&self) -> bool {
        self.status == FileStatus::Deleted
    }

    /// Final component of the path.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}
