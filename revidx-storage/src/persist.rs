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

//! On-disk snapshot format.
//!
//! A magic/version header followed by a bincode-encoded [`Snapshot`]. The
//! live-file association is not serialized row by row: each live row is
//! written as a `(introducing order, slot)` reference into the changed-file
//! table and re-linked on load, so a carried-forward entry deserializes back
//! into the same shared allocation instead of one copy per revision it is
//! live in.

use revidx_core::{FileEntry, Measurement, Project, RevisionRecord, StoreError, Tag};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

use crate::store::{RevisionKey, Tables};

/// Format marker; bump the trailing digit on incompatible changes.
const STORE_MAGIC: &[u8; 8] = b"RVXHIST1";

/// Reference to a row of the changed-file table.
#[derive(Debug, Serialize, Deserialize)]
struct LiveRef {
    /// Order of the revision that introduced the entry.
    introduced: u64,
    /// Position within that revision's (path-sorted) changed rows.
    slot: u32,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    projects: Vec<Project>,
    revisions: Vec<RevisionRecord>,
    changed: Vec<(RevisionKey, Vec<FileEntry>)>,
    live: Vec<(RevisionKey, Vec<LiveRef>)>,
    measurements: Vec<Measurement>,
    tags: Vec<Tag>,
}

fn encode(tables: &Tables) -> Result<Snapshot, StoreError> {
    let mut live = Vec::with_capacity(tables.live_files.len());
    for (key, rows) in &tables.live_files {
        let mut refs = Vec::with_capacity(rows.len());
        for entry in rows {
            let introduced = entry.revision_order;
            let home = tables
                .changed_files
                .get(&(key.0, introduced))
                .ok_or_else(|| {
                    StoreError::Corrupted(format!(
                        "live row {} references missing revision {introduced}",
                        entry.path
                    ))
                })?;
            // Changed rows are path-sorted at ingest.
            let slot = home
                .binary_search_by(|row| row.path.as_str().cmp(entry.path.as_str()))
                .map_err(|_| {
                    StoreError::Corrupted(format!(
                        "live row {} missing from its home revision {introduced}",
                        entry.path
                    ))
                })?;
            refs.push(LiveRef {
                introduced,
                slot: slot as u32,
            });
        }
        live.push((*key, refs));
    }

    Ok(Snapshot {
        projects: tables.projects.values().cloned().collect(),
        revisions: tables.revisions.values().cloned().collect(),
        changed: tables
            .changed_files
            .iter()
            .map(|(key, rows)| {
                (
                    *key,
                    rows.iter().map(|row| FileEntry::clone(row)).collect(),
                )
            })
            .collect(),
        live,
        measurements: tables.measurements.values().cloned().collect(),
        tags: tables.tags.values().flatten().cloned().collect(),
    })
}

fn decode(snapshot: Snapshot) -> Result<Tables, StoreError> {
    let mut tables = Tables::default();

    for project in snapshot.projects {
        tables.projects.insert(project.id, project);
    }
    for record in snapshot.revisions {
        tables
            .by_revision_id
            .entry(record.project)
            .or_default()
            .insert(record.revision_id.clone(), record.order);
        tables
            .by_timestamp
            .insert((record.project, record.timestamp_ms, record.order), ());
        tables
            .revisions
            .insert((record.project, record.order), record);
    }
    for (key, rows) in snapshot.changed {
        tables
            .changed_files
            .insert(key, rows.into_iter().map(Arc::new).collect());
    }
    for (key, refs) in snapshot.live {
        let mut rows = Vec::with_capacity(refs.len());
        for live_ref in refs {
            let row = tables
                .changed_files
                .get(&(key.0, live_ref.introduced))
                .and_then(|home| home.get(live_ref.slot as usize))
                .ok_or_else(|| {
                    StoreError::Corrupted(format!(
                        "dangling live reference (order {}, slot {})",
                        live_ref.introduced, live_ref.slot
                    ))
                })?;
            rows.push(row.clone());
        }
        tables.live_files.insert(key, rows);
    }
    for measurement in snapshot.measurements {
        tables.measurements.insert(
            (
                measurement.project,
                measurement.metric,
                measurement.revision_order,
            ),
            measurement,
        );
    }
    let mut tags: BTreeMap<RevisionKey, Vec<Tag>> = BTreeMap::new();
    for tag in snapshot.tags {
        tags.entry((tag.project, tag.revision_order))
            .or_default()
            .push(tag);
    }
    tables.tags = tags;

    Ok(tables)
}

/// Write a snapshot of the tables to `path`.
pub(crate) fn save(tables: &Tables, path: &Path) -> Result<(), StoreError> {
    let snapshot = encode(tables)?;
    let mut buf = Vec::from(*STORE_MAGIC);
    bincode::serialize_into(&mut buf, &snapshot)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    std::fs::write(path, buf)?;
    Ok(())
}

/// Load tables from a snapshot file at `path`.
pub(crate) fn load(path: &Path) -> Result<Tables, StoreError> {
    let data = std::fs::read(path)?;
    if data.len() < STORE_MAGIC.len() || &data[..STORE_MAGIC.len()] != STORE_MAGIC {
        warn!(path = %path.display(), "snapshot file has a foreign header");
        return Err(StoreError::Corrupted(format!(
            "{} is not a history store snapshot",
            path.display()
        )));
    }
    let snapshot: Snapshot = bincode::deserialize(&data[STORE_MAGIC.len()..])
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    decode(snapshot)
}
