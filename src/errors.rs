/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::category::Category;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reshaping or averaging results. Anything that is plain I/O is reported
/// through `anyhow` with context instead.
#[derive(Debug, Error, PartialEq)]
pub enum DigestError {
    #[error("no record store for {unit}")]
    MissingSource { unit: String },

    #[error("shape mismatch in {what}: expected {expected}, found {found}")]
    ShapeMismatch {
        what: String,
        expected: usize,
        found: usize,
    },

    #[error("unable to parse {path:?} line {line:?}: {reason}")]
    ParseFailure {
        path: PathBuf,
        line: String,
        reason: String,
    },

    #[error("batch {batch} refers to unknown datacenter slot {slot}")]
    InvalidSlot { batch: usize, slot: i64 },

    #[error("batch {batch} lists datacenter slot {slot} more than once")]
    DuplicateSlot { batch: usize, slot: i64 },

    #[error("{category} rows have {width} columns, column {column} is out of range")]
    MissingColumn {
        category: Category,
        column: usize,
        width: usize,
    },
}
