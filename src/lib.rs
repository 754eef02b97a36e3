/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

pub mod averaging;
pub mod category;
pub mod clap_args;
pub mod config;
pub mod destination;
pub mod errors;
pub mod output;
pub mod pivot;
pub mod provider;
pub mod report;
pub mod result_set;

use averaging::average_trials;
use category::Category;
use chrono::{DateTime, Utc};
use colored::*;
use config::Config;
use errors::DigestError;
use output::CsvOutput;
use pivot::{build_tables, PivotTable, TableId};
use provider::ResultProvider;
use result_set::{ResultKey, ResultSet, RunUnit, Series, TrialCollection, TrialId};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Something that was left out of the output, and why.
#[derive(Debug, Clone, PartialEq)]
pub struct Skipped {
    pub what: String,
    pub reason: String,
}
impl Skipped {
    fn new(what: impl ToString, reason: impl ToString) -> Self {
        Self {
            what: what.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Outcome of a full digest pass over every trial plus the summary.
#[derive(Debug)]
pub struct RunReport {
    pub started: DateTime<Utc>,
    pub finished: DateTime<Utc>,
    pub trials_processed: usize,
    pub tables_written: Vec<PathBuf>,
    pub skipped: Vec<Skipped>,
    pub summary: Vec<(TableId, PivotTable)>,
}
impl RunReport {
    fn new() -> Self {
        let now = Utc::now();
        Self {
            started: now,
            finished: now,
            trials_processed: 0,
            tables_written: vec![],
            skipped: vec![],
            summary: vec![],
        }
    }
}

/// Writes the per-run export of one category when the provider asks for it. A failed write is
/// recorded and the rows are digested anyway.
fn export(
    provider: &dyn ResultProvider,
    output: &CsvOutput<'_>,
    unit: &RunUnit,
    category: Category,
    series: &Series,
    report: &mut RunReport,
) {
    if !provider.exports() {
        return;
    }

    if let Err(err) = output.write_series(unit, category, series) {
        warn!("Unable to export {} of {}: {:#}", category, unit, err);
        report.skipped.push(Skipped::new(
            format!("{} export of {}", category, unit),
            format!("{:#}", err),
        ));
    }
}

/// Fetches one category of one run and brings it into the shape kept in the result set.
/// Destination rows are exported as fetched and stored reconstructed.
async fn fetch_category(
    provider: &dyn ResultProvider,
    output: &CsvOutput<'_>,
    unit: &RunUnit,
    category: Category,
    report: &mut RunReport,
) -> anyhow::Result<Option<Series>> {
    let Some(series) = provider.fetch(unit, category).await? else {
        return Ok(None);
    };

    export(provider, output, unit, category, &series, report);

    match category {
        Category::Destination => {
            let dense = destination::reconstruct(&series)?;
            Ok(Some(destination::to_series(&dense)))
        }
        _ => Ok(Some(series)),
    }
}

/// Collects every category of every configured run of one trial. Nothing here fails the pass,
/// every problem is recorded in the report.
async fn collect_trial(
    config: &Config,
    provider: &dyn ResultProvider,
    output: &CsvOutput<'_>,
    trial: TrialId,
    report: &mut RunReport,
) -> ResultSet {
    let mut result_set = ResultSet::new(trial);

    for experiment in config.experiments.iter() {
        for algorithm in experiment.algorithms.iter() {
            let unit = RunUnit::new(trial, &experiment.name, algorithm);
            if !provider.has_source(&unit).await {
                let err = DigestError::MissingSource {
                    unit: unit.to_string(),
                };
                warn!("{}", err);
                report.skipped.push(Skipped::new(&unit, err));
                continue;
            }

            println!("> digesting {}", unit.to_string().green());
            for category in Category::QUERIED {
                let key = ResultKey::new(&experiment.name, algorithm, category);
                match fetch_category(provider, output, &unit, category, report).await {
                    Ok(Some(series)) => result_set.insert(key, series),
                    Ok(None) => debug!("{} has no {}", unit, category),
                    Err(err) => {
                        warn!("Skipping {} of {}: {:#}", category, unit, err);
                        report.skipped.push(Skipped::new(
                            format!("{} of {}", category, unit),
                            format!("{:#}", err),
                        ));
                    }
                }
            }

            match provider.fetch_cost(&unit).await {
                Ok(Some(cost)) => {
                    let series = vec![vec![cost]];
                    export(provider, output, &unit, Category::Tco, &series, report);
                    let key = ResultKey::new(&experiment.name, algorithm, Category::Tco);
                    result_set.insert(key, series);
                }
                Ok(None) => debug!("{} reported no cost", unit),
                Err(err) => {
                    warn!("Skipping cost of {}: {:#}", unit, err);
                    report.skipped.push(Skipped::new(
                        format!("cost of {}", unit),
                        format!("{:#}", err),
                    ));
                }
            }
        }
    }

    result_set
}

/// Builds and writes the comparison tables of every experiment for one trial or the summary.
fn write_tables(
    config: &Config,
    output: &CsvOutput<'_>,
    result_set: &ResultSet,
    report: &mut RunReport,
) -> anyhow::Result<Vec<(TableId, PivotTable)>> {
    let mut written = vec![];

    for experiment in config.experiments.iter() {
        let built = build_tables(experiment, result_set);
        for (id, err) in built.failures {
            report
                .skipped
                .push(Skipped::new(format!("{} in {}", id, result_set.trial()), err));
        }

        for (id, table) in built.tables {
            let path = output.write_table(result_set.trial(), &id, &table)?;
            report.tables_written.push(path);
            written.push((id, table));
        }
    }

    Ok(written)
}

/// Digests every configured trial, then averages them into the summary.
///
/// Missing runs, categories that fail to fetch or pivot, and per-run exports that can't be written
/// are skipped and listed in the report. Failing to write a comparison table aborts the pass.
pub async fn run(config: &Config, provider: &dyn ResultProvider) -> anyhow::Result<RunReport> {
    let mut report = RunReport::new();
    let output = CsvOutput::new(config);
    let mut trials = TrialCollection::new();

    for trial in config.trial_ids() {
        info!("Processing {}", trial);
        let result_set = collect_trial(config, provider, &output, trial, &mut report).await;
        if result_set.is_empty() {
            warn!("No results found for {}", trial);
            continue;
        }

        write_tables(config, &output, &result_set, &mut report)?;
        trials.add(result_set);
        report.trials_processed += 1;
    }

    info!("Averaging {} trials", trials.len());
    let averaged = average_trials(&trials, config.shape_policy);
    for (key, err) in averaged.rejected {
        report
            .skipped
            .push(Skipped::new(format!("{} in {}", key, TrialId::Summary), err));
    }

    if !averaged.result_set.is_empty() {
        report.summary = write_tables(config, &output, &averaged.result_set, &mut report)?;
    }

    report.finished = Utc::now();
    Ok(report)
}
