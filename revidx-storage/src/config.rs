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

//! Store configuration.

use std::path::PathBuf;

/// When snapshots are written to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Persist only on an explicit [`crate::HistoryStore::save`] call.
    #[default]
    Manual,
    /// Persist after every committed ingestion unit.
    OnIngest,
}

/// Configuration for a [`crate::HistoryStore`].
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    /// Snapshot file location. `None` keeps the store in memory only.
    pub path: Option<PathBuf>,
    pub sync: SyncMode,
}

impl StoreConfig {
    /// In-memory store, no persistence.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Store backed by a snapshot file, persisted on every ingest.
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            sync: SyncMode::OnIngest,
        }
    }
}
