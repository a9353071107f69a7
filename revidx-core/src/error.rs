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

//! Error taxonomy for the history index.
//!
//! Programmer errors (`InvalidComparison`, `InvalidArgument`) surface
//! immediately; a failed lookup is `Ok(None)` everywhere, never an error.
//! Persistence failures propagate unchanged through `HistoryError::Store`.

use crate::project::ProjectId;
use thiserror::Error;

/// Failures raised by the persistence collaborator.
///
/// These are neither retried nor masked by the index layers; they bubble up
/// to the caller as-is.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupted store file: {0}")]
    Corrupted(String),

    #[error("constraint violation: {0}")]
    Constraint(String),
}

/// Errors surfaced by the history index operations.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Ordering predicate applied across two different projects.
    #[error("cannot compare revisions across projects {left} and {right}")]
    InvalidComparison { left: ProjectId, right: ProjectId },

    /// A required revision or project argument is missing or unknown.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, HistoryError>;
