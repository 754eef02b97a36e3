/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::{
    errors::DigestError,
    result_set::{ResultKey, ResultSet, Series, TrialCollection, TrialId},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// What to do when trials disagree on the shape of a series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ShapePolicy {
    /// Reject the series with a `ShapeMismatch`.
    #[default]
    Strict,

    /// Keep the rows and columns every trial has.
    Truncate,
}

/// The averaged summary plus every key that could not be averaged.
#[derive(Debug)]
pub struct AveragedResults {
    pub result_set: ResultSet,
    pub rejected: Vec<(ResultKey, DigestError)>,
}

fn agreed_len(
    what: String,
    lengths: impl Iterator<Item = usize> + Clone,
    policy: ShapePolicy,
) -> Result<usize, DigestError> {
    let mut all = lengths.clone();
    let expected = match all.next() {
        Some(len) => len,
        None => return Ok(0),
    };

    match policy {
        ShapePolicy::Strict => match all.find(|len| *len != expected) {
            Some(found) => Err(DigestError::ShapeMismatch {
                what,
                expected,
                found,
            }),
            None => Ok(expected),
        },
        ShapePolicy::Truncate => Ok(lengths.min().unwrap_or(0)),
    }
}

/// Element-wise mean of the same series taken from several trials.
///
/// The mean divides by the number of series given, so callers pass only the trials that
/// actually produced this series.
pub fn average_series(
    key: &ResultKey,
    series: &[&Series],
    policy: ShapePolicy,
) -> Result<Series, DigestError> {
    let rows = agreed_len(
        format!("{} row count", key),
        series.iter().map(|s| s.len()),
        policy,
    )?;
    let count = series.len() as f64;

    let mut averaged = Vec::with_capacity(rows);
    for i in 0..rows {
        let width = agreed_len(
            format!("{} row {} width", key, i + 1),
            series.iter().map(|s| s[i].len()),
            policy,
        )?;

        let row = (0..width)
            .map(|j| series.iter().map(|s| s[i][j]).sum::<f64>() / count)
            .collect();
        averaged.push(row);
    }

    Ok(averaged)
}

/// Averages every series of every trial into a single summary result set.
///
/// A key missing from some trials is averaged over the trials that have it. Keys whose shapes
/// disagree under `policy` are left out of the summary and reported in `rejected`.
pub fn average_trials(trials: &TrialCollection, policy: ShapePolicy) -> AveragedResults {
    let mut result_set = ResultSet::new(TrialId::Summary);
    let mut rejected = vec![];

    for key in trials.keys() {
        let series = trials.series_for(key);
        match average_series(key, &series, policy) {
            Ok(averaged) => {
                debug!("averaged {} over {} trials", key, series.len());
                result_set.insert(key.clone(), averaged);
            }
            Err(err) => {
                warn!("Unable to average {}: {}", key, err);
                rejected.push((key.clone(), err));
            }
        }
    }

    AveragedResults {
        result_set,
        rejected,
    }
}
