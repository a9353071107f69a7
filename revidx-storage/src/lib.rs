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

//! Revidx Storage Layer
//!
//! Embedded transactional store for the revision history index.
//!
//! ## Architecture
//!
//! - **Atomic ingestion units**: a revision row, its file entries, its
//!   live-file association rows and the secondary indexes are written under
//!   one write guard. Readers observe the pre- or post-state of a unit,
//!   never a partial one.
//! - **Read transactions**: [`HistoryStore::read`] hands out a [`ReadTxn`]
//!   holding the read guard; every query on it sees one consistent state.
//! - **Materialized live sets**: the "files live as of revision v" relation
//!   is computed incrementally at ingest by carrying forward the previous
//!   revision's live set, so query cost is proportional to the live-file
//!   count, not the history length.
//! - **Persistence**: optional bincode snapshot on disk, re-linked on load
//!   so carried-forward rows keep sharing one allocation per entry.

pub mod config;
mod persist;
pub mod store;

pub use config::{StoreConfig, SyncMode};
pub use store::{CommitDelta, FileChange, HistoryStore, ReadTxn, StoreStats};
