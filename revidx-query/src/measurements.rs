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

//! Measurement-to-revision association queries.

use revidx_core::{FileStatus, MetricId, ProjectId, Result, RevisionRecord};
use revidx_storage::HistoryStore;
use std::sync::Arc;

/// Queries linking metric measurements to revisions.
pub struct MeasurementLinkage {
    store: Arc<HistoryStore>,
}

impl MeasurementLinkage {
    pub fn new(store: Arc<HistoryStore>) -> Self {
        Self { store }
    }

    /// The latest revision of the project that was actually measured for the
    /// metric, or `None` if no measurement exists. "Latest" means greatest
    /// order; order is a total order per project, so there are no ties.
    pub fn last_measured_version(
        &self,
        metric: MetricId,
        project: ProjectId,
    ) -> Result<Option<RevisionRecord>> {
        let txn = self.store.read();
        match txn.last_measured_order(project, metric) {
            Some(order) => Ok(txn.revision(project, order).cloned()),
            None => Ok(None),
        }
    }

    /// Number of file entries changed AT the revision with the given status.
    /// Not cumulative; 0 when none match.
    pub fn file_count_by_status(
        &self,
        revision: &RevisionRecord,
        status: FileStatus,
    ) -> Result<u64> {
        let txn = self.store.read();
        Ok(txn.file_count(revision.project, revision.order, status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revidx_core::{DeveloperId, Measurement};
    use revidx_storage::{CommitDelta, FileChange};

    fn delta(project: ProjectId, id: &str, order: u64, changes: Vec<FileChange>) -> CommitDelta {
        CommitDelta {
            project,
            revision_id: id.to_string(),
            order,
            timestamp_ms: order as i64,
            committer: DeveloperId(1),
            message: String::new(),
            properties: serde_json::Value::Null,
            changes,
        }
    }

    fn measure(project: ProjectId, metric: MetricId, order: u64) -> Measurement {
        Measurement {
            project,
            metric,
            revision_order: order,
            value: "1".to_string(),
        }
    }

    fn setup() -> (Arc<HistoryStore>, ProjectId, MeasurementLinkage) {
        let store = Arc::new(HistoryStore::in_memory());
        let project = store.register_project("meas").unwrap().id;
        let linkage = MeasurementLinkage::new(store.clone());
        (store, project, linkage)
    }

    #[test]
    fn test_last_measured_version() {
        let (store, p, linkage) = setup();
        for (id, order) in [("a", 1), ("b", 2), ("c", 3)] {
            store.ingest(delta(p, id, order, vec![])).unwrap();
        }
        let metric = MetricId(1);
        assert!(linkage.last_measured_version(metric, p).unwrap().is_none());

        store.record_measurement(measure(p, metric, 1)).unwrap();
        store.record_measurement(measure(p, metric, 2)).unwrap();

        let last = linkage.last_measured_version(metric, p).unwrap().unwrap();
        assert_eq!(last.order, 2);

        // A different metric is unaffected.
        assert!(linkage
            .last_measured_version(MetricId(2), p)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_file_count_by_status_is_per_revision() {
        let (store, p, linkage) = setup();
        let r1 = store
            .ingest(delta(
                p,
                "a",
                1,
                vec![
                    FileChange::file("x", FileStatus::Added),
                    FileChange::file("y", FileStatus::Added),
                ],
            ))
            .unwrap();
        let r2 = store
            .ingest(delta(
                p,
                "b",
                2,
                vec![
                    FileChange::file("x", FileStatus::Modified),
                    FileChange::file("y", FileStatus::Deleted),
                    FileChange::file("z", FileStatus::Replaced),
                ],
            ))
            .unwrap();

        // Counts are at the exact revision, not cumulative.
        assert_eq!(linkage.file_count_by_status(&r1, FileStatus::Added).unwrap(), 2);
        assert_eq!(linkage.file_count_by_status(&r2, FileStatus::Added).unwrap(), 0);
        assert_eq!(
            linkage.file_count_by_status(&r2, FileStatus::Modified).unwrap(),
            1
        );
        assert_eq!(
            linkage.file_count_by_status(&r2, FileStatus::Deleted).unwrap(),
            1
        );
        assert_eq!(
            linkage.file_count_by_status(&r2, FileStatus::Replaced).unwrap(),
            1
        );
    }

    #[test]
    fn test_status_counts_sum_to_changed_total() {
        let (store, p, linkage) = setup();
        let rev = store
            .ingest(delta(
                p,
                "a",
                1,
                vec![
                    FileChange::file("a", FileStatus::Added),
                    FileChange::file("b", FileStatus::Modified),
                    FileChange::file("c", FileStatus::Modified),
                    FileChange::file("d", FileStatus::Deleted),
                    FileChange::directory("e", FileStatus::Replaced),
                ],
            ))
            .unwrap();

        let sum: u64 = FileStatus::ALL
            .iter()
            .map(|s| linkage.file_count_by_status(&rev, *s).unwrap())
            .sum();
        let total = store.read().changed_files(p, rev.order).unwrap().len() as u64;
        assert_eq!(sum, total);
    }
}
