/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::category::Category;
use itertools::Itertools;
use std::{collections::BTreeMap, fmt};

/// One row of a category. Every category stores homogeneous numeric tuples.
pub type Row = Vec<f64>;

/// Ordered rows of one category for one algorithm.
pub type Series = Vec<Row>;

/// Identifies which pass produced a set of results: one of the repeated trials or the
/// cross-trial summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TrialId {
    Trial(u32),
    Summary,
}
impl fmt::Display for TrialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrialId::Trial(n) => write!(f, "trial {}", n),
            TrialId::Summary => write!(f, "summary"),
        }
    }
}

/// A single algorithm run inside one trial of one experiment. Threaded through every call that
/// needs to locate files or report a failure.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunUnit {
    pub trial: TrialId,
    pub experiment: String,
    pub algorithm: String,
}
impl RunUnit {
    pub fn new(trial: TrialId, experiment: &str, algorithm: &str) -> Self {
        Self {
            trial,
            experiment: experiment.to_string(),
            algorithm: algorithm.to_string(),
        }
    }
}
impl fmt::Display for RunUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {} / {}", self.trial, self.experiment, self.algorithm)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResultKey {
    pub experiment: String,
    pub algorithm: String,
    pub category: Category,
}
impl ResultKey {
    pub fn new(experiment: &str, algorithm: &str, category: Category) -> Self {
        Self {
            experiment: experiment.to_string(),
            algorithm: algorithm.to_string(),
            category,
        }
    }
}
impl fmt::Display for ResultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.experiment, self.algorithm, self.category)
    }
}

/// All series captured for one trial (or the averaged summary), keyed by
/// (experiment, algorithm, category).
///
/// The destination category holds dense rows (`batch, DC1..DC10, Fail`) rather than the sparse
/// rows returned by the record store.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    trial: TrialId,
    data: BTreeMap<ResultKey, Series>,
}
impl ResultSet {
    pub fn new(trial: TrialId) -> Self {
        Self {
            trial,
            data: BTreeMap::new(),
        }
    }

    pub fn trial(&self) -> TrialId {
        self.trial
    }

    pub fn insert(&mut self, key: ResultKey, series: Series) {
        self.data.insert(key, series);
    }

    pub fn get(&self, experiment: &str, algorithm: &str, category: Category) -> Option<&Series> {
        self.data
            .get(&ResultKey::new(experiment, algorithm, category))
    }

    pub fn keys(&self) -> impl Iterator<Item = &ResultKey> {
        self.data.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Result sets of every completed trial, in trial order. Read-only once every trial has been
/// added.
#[derive(Debug, Default)]
pub struct TrialCollection {
    trials: BTreeMap<u32, ResultSet>,
}
impl TrialCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a trial's result set. Summary sets are not trials and are ignored.
    pub fn add(&mut self, result_set: ResultSet) {
        match result_set.trial() {
            TrialId::Trial(n) => {
                self.trials.insert(n, result_set);
            }
            TrialId::Summary => {
                tracing::warn!("Refusing to add a summary result set to the trial collection");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    /// Every key present in at least one trial.
    pub fn keys(&self) -> Vec<&ResultKey> {
        self.trials
            .values()
            .flat_map(|set| set.keys())
            .sorted()
            .dedup()
            .collect()
    }

    /// The series stored under `key` by every trial that has it, in trial order.
    pub fn series_for(&self, key: &ResultKey) -> Vec<&Series> {
        self.trials
            .values()
            .filter_map(|set| set.data.get(key))
            .collect()
    }
}
