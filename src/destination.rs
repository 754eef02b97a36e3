/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::{
    category::Category,
    errors::DigestError,
    result_set::{Row, Series},
};
use itertools::Itertools;
use tracing::trace;

/// Number of real datacenters a batch can be routed to.
pub const DATACENTERS: usize = 10;

/// Slot id marking an instance group that no datacenter accepted.
pub const FAIL_SLOT: i64 = -1;

const SUBMIT_TIME: usize = 0;
const SLOT: usize = 1;
const PERCENTAGE: usize = 3;

/// Where the instance groups of one submit-time batch ended up, as percentages.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseDestinationRow {
    pub batch: usize,
    pub slots: [f64; DATACENTERS],
    pub fail: f64,
}
impl DenseDestinationRow {
    /// Sum over every datacenter slot plus the failure slot.
    pub fn total(&self) -> f64 {
        self.slots.iter().sum::<f64>() + self.fail
    }

    /// Flattens into `batch, DC1..DC10, Fail`.
    pub fn to_row(&self) -> Row {
        let mut row = Vec::with_capacity(DATACENTERS + 2);
        row.push(self.batch as f64);
        row.extend_from_slice(&self.slots);
        row.push(self.fail);
        row
    }

    pub fn try_from_row(row: &[f64]) -> Result<Self, DigestError> {
        if row.len() != DATACENTERS + 2 {
            return Err(DigestError::ShapeMismatch {
                what: "dense destination row".to_string(),
                expected: DATACENTERS + 2,
                found: row.len(),
            });
        }

        let mut slots = [0.0; DATACENTERS];
        slots.copy_from_slice(&row[1..=DATACENTERS]);
        Ok(Self {
            batch: row[0] as usize,
            slots,
            fail: row[DATACENTERS + 1],
        })
    }
}

/// State of the batch currently being filled.
struct BatchState {
    submit_time: f64,
    index: usize,
    last_slot: i64,
    fail: Option<f64>,
    slots: Vec<f64>,
}
impl BatchState {
    fn new(submit_time: f64, index: usize) -> Self {
        Self {
            submit_time,
            index,
            last_slot: 0,
            fail: None,
            slots: Vec::with_capacity(DATACENTERS),
        }
    }

    fn push(&mut self, slot: i64, percentage: f64) -> Result<(), DigestError> {
        match slot {
            FAIL_SLOT => {
                if self.fail.is_some() {
                    return Err(DigestError::DuplicateSlot {
                        batch: self.index,
                        slot,
                    });
                }
                self.fail = Some(percentage);
            }

            1..=10 => {
                if slot <= self.last_slot {
                    return Err(DigestError::DuplicateSlot {
                        batch: self.index,
                        slot,
                    });
                }

                // datacenters that received nothing have no row
                while self.last_slot + 1 < slot {
                    self.slots.push(0.0);
                    self.last_slot += 1;
                }
                self.slots.push(percentage);
                self.last_slot = slot;
            }

            _ => {
                return Err(DigestError::InvalidSlot {
                    batch: self.index,
                    slot,
                })
            }
        }

        Ok(())
    }

    fn finish(mut self) -> DenseDestinationRow {
        self.slots.resize(DATACENTERS, 0.0);

        let mut slots = [0.0; DATACENTERS];
        slots.copy_from_slice(&self.slots);
        DenseDestinationRow {
            batch: self.index,
            slots,
            fail: self.fail.unwrap_or(0.0),
        }
    }
}

fn parse_slot(value: f64, batch: usize) -> Result<i64, DigestError> {
    if value.fract() != 0.0 || !value.is_finite() {
        return Err(DigestError::InvalidSlot {
            batch,
            slot: value as i64,
        });
    }
    Ok(value as i64)
}

/// Rebuilds one dense row per submit-time batch from the sparse `destination` rows
/// `(submitTime, datacenterId, count, percentage)` of a single algorithm.
///
/// Rows are ordered by submit time and then slot before the pass, so the failure slot (`-1`)
/// always opens its batch. Datacenters without a row get `0`. A batch that produced no row at
/// all cannot be seen and is therefore absent from the output.
pub fn reconstruct(rows: &[Row]) -> Result<Vec<DenseDestinationRow>, DigestError> {
    if let Some(short) = rows.iter().find(|row| row.len() <= PERCENTAGE) {
        return Err(DigestError::MissingColumn {
            category: Category::Destination,
            column: PERCENTAGE,
            width: short.len(),
        });
    }

    let sorted = rows.iter().sorted_by(|a, b| {
        a[SUBMIT_TIME]
            .total_cmp(&b[SUBMIT_TIME])
            .then(a[SLOT].total_cmp(&b[SLOT]))
    });

    let mut dense = vec![];
    let mut current: Option<BatchState> = None;
    for row in sorted {
        let submit_time = row[SUBMIT_TIME];

        let mut batch = match current.take() {
            Some(batch) if batch.submit_time == submit_time => batch,
            Some(batch) => {
                let index = batch.index + 1;
                dense.push(batch.finish());
                BatchState::new(submit_time, index)
            }
            None => BatchState::new(submit_time, 1),
        };

        let slot = parse_slot(row[SLOT], batch.index)?;
        batch.push(slot, row[PERCENTAGE])?;
        current = Some(batch);
    }

    if let Some(batch) = current {
        dense.push(batch.finish());
    }

    trace!("reconstructed {} destination batches", dense.len());
    Ok(dense)
}

/// Dense rows flattened back into a series, as stored in a result set.
pub fn to_series(dense: &[DenseDestinationRow]) -> Series {
    dense.iter().map(|row| row.to_row()).collect()
}
