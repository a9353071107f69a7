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

//! The embedded history store.
//!
//! Tables are keyed by `(ProjectId, order)` so every navigation query is an
//! ordered range scan with limit 1. All writes for one revision go through
//! [`HistoryStore::ingest`] as a single atomic unit.

use parking_lot::{RwLock, RwLockReadGuard};
use revidx_core::{
    DeveloperId, FileEntry, FileStatus, Measurement, MetricId, Project, ProjectId,
    RevisionRecord, StoreError, Tag,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{StoreConfig, SyncMode};
use crate::persist;

/// Composite key of the per-project ordered tables.
pub(crate) type RevisionKey = (ProjectId, u64);

#[derive(Debug, Default)]
pub(crate) struct Tables {
    pub(crate) projects: BTreeMap<ProjectId, Project>,
    pub(crate) revisions: BTreeMap<RevisionKey, RevisionRecord>,
    /// Secondary index: external revision id -> order.
    pub(crate) by_revision_id: HashMap<ProjectId, HashMap<String, u64>>,
    /// Secondary index over timestamps. Ordered by (timestamp, order) so a
    /// timestamp lookup picks the smallest order among ties.
    pub(crate) by_timestamp: BTreeMap<(ProjectId, i64, u64), ()>,
    /// Entries changed AT a revision.
    pub(crate) changed_files: BTreeMap<RevisionKey, Vec<Arc<FileEntry>>>,
    /// Materialized live-file association: entries live AS OF a revision.
    /// Rows are shared with `changed_files`; a carried-forward entry is the
    /// same allocation as the row of the revision that introduced it.
    pub(crate) live_files: BTreeMap<RevisionKey, Vec<Arc<FileEntry>>>,
    /// Keyed by (project, metric, order) so "last measured" is a range scan.
    pub(crate) measurements: BTreeMap<(ProjectId, MetricId, u64), Measurement>,
    pub(crate) tags: BTreeMap<RevisionKey, Vec<Tag>>,
}

/// One file's delta within a [`CommitDelta`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: String,
    pub is_directory: bool,
    pub status: FileStatus,
}

impl FileChange {
    pub fn file(path: impl Into<String>, status: FileStatus) -> Self {
        Self {
            path: path.into(),
            is_directory: false,
            status,
        }
    }

    pub fn directory(path: impl Into<String>, status: FileStatus) -> Self {
        Self {
            path: path.into(),
            is_directory: true,
            status,
        }
    }
}

/// Everything the ingester discovered about one commit.
///
/// The ingester assigns `order`; the store only checks that it moves strictly
/// forward within the project.
#[derive(Debug, Clone)]
pub struct CommitDelta {
    pub project: ProjectId,
    pub revision_id: String,
    pub order: u64,
    pub timestamp_ms: i64,
    pub committer: DeveloperId,
    pub message: String,
    pub properties: serde_json::Value,
    pub changes: Vec<FileChange>,
}

/// Store statistics.
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    pub projects: usize,
    pub revisions: usize,
    pub changed_rows: usize,
    pub live_rows: usize,
    pub measurements: usize,
}

/// Embedded transactional store for revision history.
///
/// Many readers, one writer: a single `RwLock` over all tables gives readers
/// a cross-table-consistent view and makes each ingestion unit atomic. One
/// ingestion pipeline per project is enforced by the caller; the lock only
/// serializes whatever writes arrive.
pub struct HistoryStore {
    tables: RwLock<Tables>,
    config: StoreConfig,
}

impl HistoryStore {
    /// In-memory store with no persistence.
    pub fn in_memory() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            config: StoreConfig::in_memory(),
        }
    }

    /// Open a store. If the configured snapshot file exists it is loaded;
    /// otherwise the store starts empty.
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        let tables = match &config.path {
            Some(path) if path.exists() => {
                let tables = persist::load(path)?;
                info!(
                    path = %path.display(),
                    projects = tables.projects.len(),
                    revisions = tables.revisions.len(),
                    "history store loaded"
                );
                tables
            }
            Some(path) => {
                info!(path = %path.display(), "no snapshot file, starting empty");
                Tables::default()
            }
            None => Tables::default(),
        };
        Ok(Self {
            tables: RwLock::new(tables),
            config,
        })
    }

    /// Begin a read transaction. Every query on the returned handle sees the
    /// same committed state; ingestion units committed later are invisible
    /// to it.
    pub fn read(&self) -> ReadTxn<'_> {
        ReadTxn {
            tables: self.tables.read(),
        }
    }

    /// Register a project, assigning the next free id.
    pub fn register_project(&self, name: impl Into<String>) -> Result<Project, StoreError> {
        let name = name.into();
        let mut tables = self.tables.write();
        let next = tables
            .projects
            .keys()
            .next_back()
            .map(|id| id.raw() + 1)
            .unwrap_or(1);
        let project = Project::new(ProjectId(next), name);
        tables.projects.insert(project.id, project.clone());
        if let Err(e) = self.maybe_flush(&tables) {
            tables.projects.remove(&project.id);
            return Err(e);
        }
        Ok(project)
    }

    /// Ingest one commit as an atomic unit: the revision row, its file
    /// entries, its live-file association rows and both secondary indexes.
    ///
    /// The live set of the new revision is the previous revision's live set
    /// minus the paths changed here, plus the non-deleted changed entries
    /// (carry-forward materialization).
    pub fn ingest(&self, delta: CommitDelta) -> Result<RevisionRecord, StoreError> {
        let mut tables = self.tables.write();

        // Validate the whole unit before touching any table, so a rejected
        // delta leaves no partial state behind.
        if !tables.projects.contains_key(&delta.project) {
            return Err(StoreError::Constraint(format!(
                "unknown project {}",
                delta.project
            )));
        }
        if delta.order == 0 {
            return Err(StoreError::Constraint(
                "revision order must be >= 1".to_string(),
            ));
        }
        let last_order = tables
            .revisions
            .range((delta.project, u64::MIN)..=(delta.project, u64::MAX))
            .next_back()
            .map(|((_, order), _)| *order);
        if let Some(last) = last_order {
            if delta.order <= last {
                return Err(StoreError::Constraint(format!(
                    "revision order {} does not advance past {} in {}",
                    delta.order, last, delta.project
                )));
            }
        }
        if tables
            .by_revision_id
            .get(&delta.project)
            .is_some_and(|ids| ids.contains_key(&delta.revision_id))
        {
            return Err(StoreError::Constraint(format!(
                "duplicate revision id {} in {}",
                delta.revision_id, delta.project
            )));
        }
        let mut seen = HashSet::new();
        for change in &delta.changes {
            if !seen.insert(change.path.as_str()) {
                return Err(StoreError::Constraint(format!(
                    "path {} changed twice in one revision",
                    change.path
                )));
            }
        }

        let record = RevisionRecord {
            project: delta.project,
            revision_id: delta.revision_id,
            order: delta.order,
            timestamp_ms: delta.timestamp_ms,
            committer: delta.committer,
            message: delta.message,
            properties: delta.properties,
        };
        let key = (record.project, record.order);

        // Carry forward the previous live set, dropping every path this
        // revision touches.
        let mut live: Vec<Arc<FileEntry>> = {
            let changed_paths: HashSet<&str> =
                delta.changes.iter().map(|c| c.path.as_str()).collect();
            let prev_live =
                last_order.and_then(|last| tables.live_files.get(&(record.project, last)));
            match prev_live {
                Some(prev) => prev
                    .iter()
                    .filter(|entry| !changed_paths.contains(entry.path.as_str()))
                    .cloned()
                    .collect(),
                None => Vec::new(),
            }
        };

        let mut changed_rows = Vec::with_capacity(delta.changes.len());
        for change in delta.changes {
            let entry = Arc::new(FileEntry {
                project: record.project,
                path: change.path,
                is_directory: change.is_directory,
                status: change.status,
                revision_order: record.order,
            });
            if !entry.is_deleted() {
                live.push(entry.clone());
            }
            changed_rows.push(entry);
        }
        changed_rows.sort_by(|a, b| a.path.cmp(&b.path));
        live.sort_by(|a, b| a.path.cmp(&b.path));

        debug!(
            project = %record.project,
            order = record.order,
            changed = changed_rows.len(),
            live = live.len(),
            "ingesting revision"
        );

        tables
            .by_revision_id
            .entry(record.project)
            .or_default()
            .insert(record.revision_id.clone(), record.order);
        tables
            .by_timestamp
            .insert((record.project, record.timestamp_ms, record.order), ());
        tables.changed_files.insert(key, changed_rows);
        tables.live_files.insert(key, live);
        tables.revisions.insert(key, record.clone());

        // A failed flush unwinds the whole unit; memory never runs ahead of
        // the snapshot file.
        if let Err(e) = self.maybe_flush(&tables) {
            if let Some(ids) = tables.by_revision_id.get_mut(&record.project) {
                ids.remove(&record.revision_id);
            }
            tables
                .by_timestamp
                .remove(&(record.project, record.timestamp_ms, record.order));
            tables.changed_files.remove(&key);
            tables.live_files.remove(&key);
            tables.revisions.remove(&key);
            return Err(e);
        }
        Ok(record)
    }

    /// Attach a measurement to an ingested revision. Re-recording the same
    /// metric for the same revision replaces the value.
    pub fn record_measurement(&self, measurement: Measurement) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        let key = (measurement.project, measurement.revision_order);
        if !tables.revisions.contains_key(&key) {
            return Err(StoreError::Constraint(format!(
                "no revision at order {} in {}",
                measurement.revision_order, measurement.project
            )));
        }
        let mkey = (
            measurement.project,
            measurement.metric,
            measurement.revision_order,
        );
        let previous = tables.measurements.insert(mkey, measurement);
        if let Err(e) = self.maybe_flush(&tables) {
            match previous {
                Some(old) => {
                    tables.measurements.insert(mkey, old);
                }
                None => {
                    tables.measurements.remove(&mkey);
                }
            }
            return Err(e);
        }
        Ok(())
    }

    /// Attach a named tag to an ingested revision.
    pub fn tag_revision(
        &self,
        project: ProjectId,
        order: u64,
        name: impl Into<String>,
    ) -> Result<Tag, StoreError> {
        let mut tables = self.tables.write();
        if !tables.revisions.contains_key(&(project, order)) {
            return Err(StoreError::Constraint(format!(
                "no revision at order {order} in {project}"
            )));
        }
        let tag = Tag {
            project,
            name: name.into(),
            revision_order: order,
        };
        tables
            .tags
            .entry((project, order))
            .or_default()
            .push(tag.clone());
        if let Err(e) = self.maybe_flush(&tables) {
            if let Some(list) = tables.tags.get_mut(&(project, order)) {
                list.pop();
            }
            if tables
                .tags
                .get(&(project, order))
                .is_some_and(Vec::is_empty)
            {
                tables.tags.remove(&(project, order));
            }
            return Err(e);
        }
        Ok(tag)
    }

    /// Write a snapshot to the configured path.
    pub fn save(&self) -> Result<(), StoreError> {
        let tables = self.tables.read();
        match &self.config.path {
            Some(path) => persist::save(&tables, path),
            None => Ok(()),
        }
    }

    pub fn stats(&self) -> StoreStats {
        let tables = self.tables.read();
        StoreStats {
            projects: tables.projects.len(),
            revisions: tables.revisions.len(),
            changed_rows: tables.changed_files.values().map(Vec::len).sum(),
            live_rows: tables.live_files.values().map(Vec::len).sum(),
            measurements: tables.measurements.len(),
        }
    }

    fn maybe_flush(&self, tables: &Tables) -> Result<(), StoreError> {
        if let (Some(path), SyncMode::OnIngest) = (&self.config.path, self.config.sync) {
            persist::save(tables, path)?;
            debug!(path = %path.display(), "snapshot flushed");
        }
        Ok(())
    }
}

/// A read transaction over the store.
///
/// Holds the read guard for its lifetime; all queries observe the state as
/// of [`HistoryStore::read`]. Drop it promptly, it blocks the writer.
pub struct ReadTxn<'a> {
    tables: RwLockReadGuard<'a, Tables>,
}

impl ReadTxn<'_> {
    pub fn project(&self, id: ProjectId) -> Option<&Project> {
        self.tables.projects.get(&id)
    }

    pub fn revision(&self, project: ProjectId, order: u64) -> Option<&RevisionRecord> {
        self.tables.revisions.get(&(project, order))
    }

    /// Greatest order strictly below `order` within the project.
    pub fn revision_before(&self, project: ProjectId, order: u64) -> Option<&RevisionRecord> {
        self.tables
            .revisions
            .range((project, u64::MIN)..(project, order))
            .next_back()
            .map(|(_, record)| record)
    }

    /// Smallest order strictly above `order` within the project.
    pub fn revision_after(&self, project: ProjectId, order: u64) -> Option<&RevisionRecord> {
        self.tables
            .revisions
            .range((
                Bound::Excluded((project, order)),
                Bound::Included((project, u64::MAX)),
            ))
            .next()
            .map(|(_, record)| record)
    }

    /// The revision with order 1, if ingested.
    pub fn first_revision(&self, project: ProjectId) -> Option<&RevisionRecord> {
        self.tables.revisions.get(&(project, 1))
    }

    /// The revision with the maximal order. Unambiguous even when orders
    /// have gaps.
    pub fn last_revision(&self, project: ProjectId) -> Option<&RevisionRecord> {
        self.tables
            .revisions
            .range((project, u64::MIN)..=(project, u64::MAX))
            .next_back()
            .map(|(_, record)| record)
    }

    /// Lookup by external SCM revision id.
    pub fn revision_by_external_id(
        &self,
        project: ProjectId,
        revision_id: &str,
    ) -> Option<&RevisionRecord> {
        let order = *self.tables.by_revision_id.get(&project)?.get(revision_id)?;
        self.tables.revisions.get(&(project, order))
    }

    /// Lookup by timestamp. Among revisions sharing the timestamp this
    /// returns the one with the smallest order, deterministically.
    pub fn revision_by_timestamp(
        &self,
        project: ProjectId,
        timestamp_ms: i64,
    ) -> Option<&RevisionRecord> {
        let ((_, _, order), _) = self
            .tables
            .by_timestamp
            .range((project, timestamp_ms, u64::MIN)..=(project, timestamp_ms, u64::MAX))
            .next()?;
        self.tables.revisions.get(&(project, *order))
    }

    /// Entries changed AT the revision, or `None` if the revision was never
    /// ingested here.
    pub fn changed_files(&self, project: ProjectId, order: u64) -> Option<&[Arc<FileEntry>]> {
        self.tables
            .changed_files
            .get(&(project, order))
            .map(Vec::as_slice)
    }

    /// Materialized live rows AS OF the revision, or `None` if the revision
    /// was never ingested here.
    pub fn live_files(&self, project: ProjectId, order: u64) -> Option<&[Arc<FileEntry>]> {
        self.tables
            .live_files
            .get(&(project, order))
            .map(Vec::as_slice)
    }

    /// Count of entries changed AT the revision with the given status.
    /// 0 when there are none (or the revision is unknown).
    pub fn file_count(&self, project: ProjectId, order: u64, status: FileStatus) -> u64 {
        self.changed_files(project, order)
            .map(|rows| rows.iter().filter(|e| e.status == status).count() as u64)
            .unwrap_or(0)
    }

    /// Greatest order carrying a measurement for the metric.
    pub fn last_measured_order(&self, project: ProjectId, metric: MetricId) -> Option<u64> {
        self.tables
            .measurements
            .range((project, metric, u64::MIN)..=(project, metric, u64::MAX))
            .next_back()
            .map(|((_, _, order), _)| *order)
    }

    pub fn tags_of(&self, project: ProjectId, order: u64) -> &[Tag] {
        self.tables
            .tags
            .get(&(project, order))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn revision_count(&self, project: ProjectId) -> usize {
        self.tables
            .revisions
            .range((project, u64::MIN)..=(project, u64::MAX))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(project: ProjectId, id: &str, order: u64, changes: Vec<FileChange>) -> CommitDelta {
        CommitDelta {
            project,
            revision_id: id.to_string(),
            order,
            timestamp_ms: 1_000 + order as i64,
            committer: DeveloperId(1),
            message: format!("commit {id}"),
            properties: serde_json::Value::Null,
            changes,
        }
    }

    fn store_with_project() -> (HistoryStore, ProjectId) {
        let store = HistoryStore::in_memory();
        let project = store.register_project("test").unwrap();
        (store, project.id)
    }

    #[test]
    fn test_ingest_and_lookup() {
        let (store, p) = store_with_project();
        store
            .ingest(delta(
                p,
                "r1",
                1,
                vec![FileChange::file("a.txt", FileStatus::Added)],
            ))
            .unwrap();

        let txn = store.read();
        let rev = txn.revision(p, 1).unwrap();
        assert_eq!(rev.revision_id, "r1");
        assert_eq!(txn.revision_by_external_id(p, "r1").unwrap().order, 1);
        assert_eq!(txn.revision_by_timestamp(p, 1_001).unwrap().order, 1);
        assert_eq!(txn.changed_files(p, 1).unwrap().len(), 1);
        assert_eq!(txn.live_files(p, 1).unwrap().len(), 1);
    }

    #[test]
    fn test_carry_forward_live_set() {
        let (store, p) = store_with_project();
        store
            .ingest(delta(
                p,
                "r1",
                1,
                vec![
                    FileChange::directory("src", FileStatus::Added),
                    FileChange::file("src/a.txt", FileStatus::Added),
                ],
            ))
            .unwrap();
        store
            .ingest(delta(
                p,
                "r2",
                2,
                vec![FileChange::file("src/b.txt", FileStatus::Added)],
            ))
            .unwrap();
        store
            .ingest(delta(
                p,
                "r3",
                3,
                vec![
                    FileChange::file("src/a.txt", FileStatus::Deleted),
                    FileChange::file("src/b.txt", FileStatus::Modified),
                ],
            ))
            .unwrap();

        let txn = store.read();
        let live2: Vec<&str> = txn
            .live_files(p, 2)
            .unwrap()
            .iter()
            .map(|e| e.path.as_str())
            .collect();
        assert_eq!(live2, vec!["src", "src/a.txt", "src/b.txt"]);

        let live3: Vec<&str> = txn
            .live_files(p, 3)
            .unwrap()
            .iter()
            .map(|e| e.path.as_str())
            .collect();
        assert_eq!(live3, vec!["src", "src/b.txt"]);

        // The modified entry was re-introduced at r3; the carried-forward
        // directory still points at its r1 row.
        let b = txn
            .live_files(p, 3)
            .unwrap()
            .iter()
            .find(|e| e.path == "src/b.txt")
            .unwrap();
        assert_eq!(b.revision_order, 3);
        assert_eq!(b.status, FileStatus::Modified);
        let src = txn
            .live_files(p, 3)
            .unwrap()
            .iter()
            .find(|e| e.path == "src")
            .unwrap();
        assert_eq!(src.revision_order, 1);
    }

    #[test]
    fn test_replaced_entry_stays_live() {
        let (store, p) = store_with_project();
        store
            .ingest(delta(
                p,
                "r1",
                1,
                vec![FileChange::file("a.txt", FileStatus::Added)],
            ))
            .unwrap();
        store
            .ingest(delta(
                p,
                "r2",
                2,
                vec![FileChange::file("a.txt", FileStatus::Replaced)],
            ))
            .unwrap();

        let txn = store.read();
        let live = txn.live_files(p, 2).unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].status, FileStatus::Replaced);
        assert_eq!(live[0].revision_order, 2);
    }

    #[test]
    fn test_carried_rows_share_allocation() {
        let (store, p) = store_with_project();
        store
            .ingest(delta(
                p,
                "r1",
                1,
                vec![FileChange::file("a.txt", FileStatus::Added)],
            ))
            .unwrap();
        store.ingest(delta(p, "r2", 2, vec![])).unwrap();

        let txn = store.read();
        let introduced = &txn.changed_files(p, 1).unwrap()[0];
        let carried = &txn.live_files(p, 2).unwrap()[0];
        assert!(Arc::ptr_eq(introduced, carried));
    }

    #[test]
    fn test_order_must_advance() {
        let (store, p) = store_with_project();
        store.ingest(delta(p, "r5", 5, vec![])).unwrap();

        let err = store.ingest(delta(p, "r5b", 5, vec![])).unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
        let err = store.ingest(delta(p, "r4", 4, vec![])).unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));

        // Gaps are fine.
        store.ingest(delta(p, "r9", 9, vec![])).unwrap();
    }

    #[test]
    fn test_rejected_ingest_leaves_no_partial_state() {
        let (store, p) = store_with_project();
        store.ingest(delta(p, "r1", 1, vec![])).unwrap();

        // Duplicate path in one delta is rejected up front.
        let err = store
            .ingest(delta(
                p,
                "r2",
                2,
                vec![
                    FileChange::file("a.txt", FileStatus::Added),
                    FileChange::file("a.txt", FileStatus::Deleted),
                ],
            ))
            .unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));

        let txn = store.read();
        assert!(txn.revision(p, 2).is_none());
        assert!(txn.revision_by_external_id(p, "r2").is_none());
        assert!(txn.changed_files(p, 2).is_none());
    }

    #[test]
    fn test_flush_failure_rolls_back_the_unit() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("store");
        std::fs::create_dir(&sub).unwrap();

        let store = HistoryStore::open(StoreConfig::at_path(sub.join("history.db"))).unwrap();
        let p = store.register_project("flush").unwrap().id;
        store
            .ingest(delta(
                p,
                "r1",
                1,
                vec![FileChange::file("a.txt", FileStatus::Added)],
            ))
            .unwrap();

        // Make the snapshot path unwritable.
        std::fs::remove_dir_all(&sub).unwrap();

        let err = store.ingest(delta(p, "r2", 2, vec![])).unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));

        let txn = store.read();
        assert!(txn.revision(p, 2).is_none());
        assert!(txn.revision_by_external_id(p, "r2").is_none());
        assert!(txn.changed_files(p, 2).is_none());
        assert!(txn.live_files(p, 2).is_none());
        assert_eq!(txn.revision_count(p), 1);
        drop(txn);

        // Once the path is writable again the same delta goes through.
        std::fs::create_dir(&sub).unwrap();
        let r2 = store.ingest(delta(p, "r2", 2, vec![])).unwrap();
        assert_eq!(r2.order, 2);
    }

    #[test]
    fn test_flush_failure_rolls_back_measurements_and_tags() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("store");
        std::fs::create_dir(&sub).unwrap();

        let store = HistoryStore::open(StoreConfig::at_path(sub.join("history.db"))).unwrap();
        let p = store.register_project("flush").unwrap().id;
        store.ingest(delta(p, "r1", 1, vec![])).unwrap();
        let metric = MetricId(1);
        store
            .record_measurement(Measurement {
                project: p,
                metric,
                revision_order: 1,
                value: "old".to_string(),
            })
            .unwrap();

        std::fs::remove_dir_all(&sub).unwrap();

        // A failed re-record keeps the previously stored value.
        let err = store
            .record_measurement(Measurement {
                project: p,
                metric,
                revision_order: 1,
                value: "new".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
        assert_eq!(
            store.tables.read().measurements[&(p, metric, 1)].value,
            "old"
        );

        // A failed first record for another metric leaves no row at all.
        let err = store
            .record_measurement(Measurement {
                project: p,
                metric: MetricId(2),
                revision_order: 1,
                value: "x".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
        assert_eq!(store.read().last_measured_order(p, MetricId(2)), None);

        let err = store.tag_revision(p, 1, "v1").unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
        assert!(store.read().tags_of(p, 1).is_empty());
    }

    #[test]
    fn test_duplicate_external_id_rejected() {
        let (store, p) = store_with_project();
        store.ingest(delta(p, "r1", 1, vec![])).unwrap();
        let err = store.ingest(delta(p, "r1", 2, vec![])).unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
    }

    #[test]
    fn test_unknown_project_rejected() {
        let store = HistoryStore::in_memory();
        let err = store
            .ingest(delta(ProjectId(99), "r1", 1, vec![]))
            .unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
    }

    #[test]
    fn test_navigation_scans() {
        let (store, p) = store_with_project();
        for (id, order) in [("r1", 1), ("r4", 4), ("r9", 9)] {
            store.ingest(delta(p, id, order, vec![])).unwrap();
        }

        let txn = store.read();
        assert_eq!(txn.first_revision(p).unwrap().order, 1);
        assert_eq!(txn.last_revision(p).unwrap().order, 9);
        assert_eq!(txn.revision_before(p, 9).unwrap().order, 4);
        assert_eq!(txn.revision_after(p, 1).unwrap().order, 4);
        assert!(txn.revision_before(p, 1).is_none());
        assert!(txn.revision_after(p, 9).is_none());
        assert_eq!(txn.revision_count(p), 3);
    }

    #[test]
    fn test_scans_stay_within_project() {
        let store = HistoryStore::in_memory();
        let p1 = store.register_project("one").unwrap().id;
        let p2 = store.register_project("two").unwrap().id;
        store.ingest(delta(p1, "a", 3, vec![])).unwrap();
        store.ingest(delta(p2, "b", 7, vec![])).unwrap();

        let txn = store.read();
        assert_eq!(txn.last_revision(p1).unwrap().order, 3);
        assert!(txn.revision_after(p1, 3).is_none());
        assert!(txn.revision_before(p2, 7).is_none());
    }

    #[test]
    fn test_timestamp_tie_break() {
        let (store, p) = store_with_project();
        let mut d1 = delta(p, "r1", 1, vec![]);
        let mut d2 = delta(p, "r2", 2, vec![]);
        d1.timestamp_ms = 5_000;
        d2.timestamp_ms = 5_000;
        store.ingest(d1).unwrap();
        store.ingest(d2).unwrap();

        let txn = store.read();
        for _ in 0..10 {
            assert_eq!(txn.revision_by_timestamp(p, 5_000).unwrap().order, 1);
        }
    }

    #[test]
    fn test_file_count_by_status() {
        let (store, p) = store_with_project();
        store
            .ingest(delta(
                p,
                "r1",
                1,
                vec![
                    FileChange::file("a", FileStatus::Added),
                    FileChange::file("b", FileStatus::Added),
                    FileChange::file("c", FileStatus::Modified),
                ],
            ))
            .unwrap();

        let txn = store.read();
        assert_eq!(txn.file_count(p, 1, FileStatus::Added), 2);
        assert_eq!(txn.file_count(p, 1, FileStatus::Modified), 1);
        assert_eq!(txn.file_count(p, 1, FileStatus::Deleted), 0);
        assert_eq!(txn.file_count(p, 42, FileStatus::Added), 0);
    }

    #[test]
    fn test_measurements_and_last_measured() {
        let (store, p) = store_with_project();
        for (id, order) in [("r1", 1), ("r2", 2), ("r3", 3)] {
            store.ingest(delta(p, id, order, vec![])).unwrap();
        }
        let metric = MetricId(7);
        for order in [1, 2] {
            store
                .record_measurement(Measurement {
                    project: p,
                    metric,
                    revision_order: order,
                    value: "42".to_string(),
                })
                .unwrap();
        }

        let txn = store.read();
        assert_eq!(txn.last_measured_order(p, metric), Some(2));
        assert_eq!(txn.last_measured_order(p, MetricId(8)), None);
    }

    #[test]
    fn test_measurement_requires_revision() {
        let (store, p) = store_with_project();
        let err = store
            .record_measurement(Measurement {
                project: p,
                metric: MetricId(1),
                revision_order: 1,
                value: "x".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
    }

    #[test]
    fn test_tags() {
        let (store, p) = store_with_project();
        store.ingest(delta(p, "r1", 1, vec![])).unwrap();
        store.tag_revision(p, 1, "v0.1.0").unwrap();

        let txn = store.read();
        assert_eq!(txn.tags_of(p, 1).len(), 1);
        assert_eq!(txn.tags_of(p, 1)[0].name, "v0.1.0");
        assert!(txn.tags_of(p, 2).is_empty());

        drop(txn);
        assert!(store.tag_revision(p, 2, "nope").is_err());
    }

    #[test]
    fn test_read_txn_is_a_snapshot() {
        let (store, p) = store_with_project();
        store.ingest(delta(p, "r1", 1, vec![])).unwrap();

        let store = Arc::new(store);
        let txn = store.read();
        assert_eq!(txn.revision_count(p), 1);

        let writer = {
            let store = store.clone();
            std::thread::spawn(move || {
                // Blocks until the read transaction is dropped.
                store.ingest(delta(p, "r2", 2, vec![])).unwrap();
            })
        };

        // Still one revision from this transaction's point of view.
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert_eq!(txn.revision_count(p), 1);
        drop(txn);

        writer.join().unwrap();
        assert_eq!(store.read().revision_count(p), 2);
    }
}
