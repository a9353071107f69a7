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

//! Revidx Core
//!
//! Domain records for the revision history index: projects, revisions,
//! file entries, tags, measurements, and the error taxonomy shared by the
//! storage and query layers.

pub mod error;
pub mod file_entry;
pub mod measurement;
pub mod project;
pub mod revision;

pub use error::{HistoryError, Result, StoreError};
pub use file_entry::{FileEntry, FileStatus};
pub use measurement::{Measurement, MetricId};
pub use project::{Project, ProjectId};
pub use revision::{DeveloperId, RevisionRecord, Tag};
