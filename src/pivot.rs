/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::{
    category::{
        Category, DC_CPU_RATE, DC_RAM_RATE, DELAY_AVG, LINK_BW_RATE, SUCCESS_RATE,
        TOTAL_BW_RATE, TOTAL_CPU_RATE, TOTAL_RAM_RATE,
    },
    config::Experiment,
    destination::{DenseDestinationRow, DATACENTERS},
    errors::DigestError,
    result_set::{ResultSet, Series},
};
use itertools::Itertools;
use std::fmt;
use tracing::{debug, warn};

/// One cell of a comparison table.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Index(usize),
    Number(f64),
    /// Absent value, e.g. a datacenter that only some algorithms know about. Written as an empty
    /// field so it can't be mistaken for zero utilisation.
    Missing,
}
impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(text) => write!(f, "{}", text),
            Cell::Index(i) => write!(f, "{}", i),
            Cell::Number(n) => write!(f, "{}", n),
            Cell::Missing => Ok(()),
        }
    }
}
impl From<&str> for Cell {
    fn from(text: &str) -> Self {
        Cell::Text(text.to_string())
    }
}
impl From<Option<f64>> for Cell {
    fn from(value: Option<f64>) -> Self {
        value.map(Cell::Number).unwrap_or(Cell::Missing)
    }
}

/// Wide comparison table: one or two header rows followed by data rows.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotTable {
    pub headers: Vec<Vec<Cell>>,
    pub rows: Vec<Vec<Cell>>,
}
impl PivotTable {
    /// Header rows then data rows, rendered as text fields.
    pub fn records(&self) -> Vec<Vec<String>> {
        self.headers
            .iter()
            .chain(self.rows.iter())
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect()
    }
}

/// Identifies a table within one trial (or the summary).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TableId {
    pub experiment: String,
    pub algorithm: Option<String>,
    pub category: Category,
}
impl TableId {
    pub fn new(experiment: &str, category: Category) -> Self {
        Self {
            experiment: experiment.to_string(),
            algorithm: None,
            category,
        }
    }

    pub fn for_algorithm(experiment: &str, algorithm: &str, category: Category) -> Self {
        Self {
            experiment: experiment.to_string(),
            algorithm: Some(algorithm.to_string()),
            category,
        }
    }
}
impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.algorithm {
            Some(algorithm) => write!(f, "{}/{}/{}", self.experiment, algorithm, self.category),
            None => write!(f, "{}/{}", self.experiment, self.category),
        }
    }
}

/// Every table built for one experiment, plus the ones that could not be built.
#[derive(Debug, Default)]
pub struct ExperimentTables {
    pub tables: Vec<(TableId, PivotTable)>,
    pub failures: Vec<(TableId, DigestError)>,
}

/// A configured algorithm that has a series for the category being pivoted.
struct Present<'a> {
    algorithm: &'a str,
    label: &'a str,
    series: &'a Series,
}

fn present<'a>(
    experiment: &'a Experiment,
    result_set: &'a ResultSet,
    category: Category,
) -> Vec<Present<'a>> {
    experiment
        .columns()
        .filter_map(|(algorithm, label)| {
            result_set
                .get(&experiment.name, algorithm, category)
                .map(|series| Present {
                    algorithm,
                    label,
                    series,
                })
        })
        .collect()
}

fn cell_at(category: Category, row: &[f64], index: usize) -> Result<f64, DigestError> {
    row.get(index)
        .copied()
        .ok_or(DigestError::MissingColumn {
            category,
            column: index,
            width: row.len(),
        })
}

/// First cell of a single-row category, `None` when the row is missing altogether.
fn scalar(category: Category, series: &Series, index: usize) -> Result<Option<f64>, DigestError> {
    series
        .first()
        .map(|row| cell_at(category, row, index))
        .transpose()
}

fn header_row<'a>(first: &str, labels: impl Iterator<Item = &'a str>) -> Vec<Cell> {
    std::iter::once(Cell::from(first))
        .chain(labels.map(Cell::from))
        .collect()
}

/// Batch index down the side, one column per algorithm holding `index` of that algorithm's row
/// for the batch. Every algorithm must have the same number of batches.
fn per_batch(
    experiment: &Experiment,
    result_set: &ResultSet,
    category: Category,
    index: usize,
) -> Result<Option<PivotTable>, DigestError> {
    let present = present(experiment, result_set, category);
    let Some(first) = present.first() else {
        return Ok(None);
    };

    let batches = first.series.len();
    if let Some(other) = present.iter().find(|p| p.series.len() != batches) {
        return Err(DigestError::ShapeMismatch {
            what: format!(
                "{} batches of {} against {}",
                category, other.algorithm, first.algorithm
            ),
            expected: batches,
            found: other.series.len(),
        });
    }

    let mut rows = Vec::with_capacity(batches);
    for i in 0..batches {
        let mut row = vec![Cell::Index(i + 1)];
        for p in present.iter() {
            row.push(Cell::Number(cell_at(category, &p.series[i], index)?));
        }
        rows.push(row);
    }

    Ok(Some(PivotTable {
        headers: vec![header_row("Times", present.iter().map(|p| p.label))],
        rows,
    }))
}

/// Average inter-schedule time per batch.
pub fn decision_delay(
    experiment: &Experiment,
    result_set: &ResultSet,
) -> Result<Option<PivotTable>, DigestError> {
    per_batch(experiment, result_set, Category::DecisionDelay, DELAY_AVG)
}

/// Scheduling success percentage per batch.
pub fn success_rate(
    experiment: &Experiment,
    result_set: &ResultSet,
) -> Result<Option<PivotTable>, DigestError> {
    per_batch(experiment, result_set, Category::SuccessRate, SUCCESS_RATE)
}

/// Destination percentages of one algorithm, renumbering batches from 1.
pub fn destination(series: &Series) -> Result<PivotTable, DigestError> {
    let header = std::iter::once(Cell::from("Batch"))
        .chain((1..=DATACENTERS).map(|dc| Cell::Text(format!("DC{}", dc))))
        .chain(std::iter::once(Cell::from("Fail")))
        .collect_vec();

    let mut rows = Vec::with_capacity(series.len());
    for (i, row) in series.iter().enumerate() {
        let dense = DenseDestinationRow::try_from_row(row)?;
        let mut cells = vec![Cell::Index(i + 1)];
        cells.extend(dense.slots.iter().map(|pct| Cell::Number(*pct)));
        cells.push(Cell::Number(dense.fail));
        rows.push(cells);
    }

    Ok(PivotTable {
        headers: vec![header],
        rows,
    })
}

/// CPU, RAM and bandwidth utilisation across the whole system, one column per algorithm.
pub fn overall_utilization(
    experiment: &Experiment,
    result_set: &ResultSet,
) -> Result<Option<PivotTable>, DigestError> {
    let resources = present(experiment, result_set, Category::TotalUsedResource);
    if resources.is_empty() {
        return Ok(None);
    }

    let mut cpu = vec![Cell::from("CPU Util")];
    let mut ram = vec![Cell::from("RAM Util")];
    let mut bw = vec![Cell::from("BW Util")];
    for p in resources.iter() {
        cpu.push(scalar(Category::TotalUsedResource, p.series, TOTAL_CPU_RATE)?.into());
        ram.push(scalar(Category::TotalUsedResource, p.series, TOTAL_RAM_RATE)?.into());

        let bw_value = match result_set.get(
            &experiment.name,
            p.algorithm,
            Category::TotalUsedBwResource,
        ) {
            Some(series) => scalar(Category::TotalUsedBwResource, series, TOTAL_BW_RATE)?,
            None => None,
        };
        bw.push(bw_value.into());
    }

    Ok(Some(PivotTable {
        headers: vec![header_row("", resources.iter().map(|p| p.label))],
        rows: vec![cpu, ram, bw],
    }))
}

/// Utilisation per datacenter (CPU, RAM) and per network link (BW).
///
/// Each algorithm contributes three adjacent columns. Series shorter than the longest one over
/// all algorithms are padded with missing cells.
pub fn regional_utilization(
    experiment: &Experiment,
    result_set: &ResultSet,
) -> Result<Option<PivotTable>, DigestError> {
    let resources = present(experiment, result_set, Category::UsedResource);
    if resources.is_empty() {
        return Ok(None);
    }

    let empty = Series::new();

    let mut columns: Vec<Vec<f64>> = vec![];
    for p in resources.iter() {
        let bw_series = result_set
            .get(&experiment.name, p.algorithm, Category::UsedBwResource)
            .unwrap_or(&empty);

        let cpu = p
            .series
            .iter()
            .map(|row| cell_at(Category::UsedResource, row, DC_CPU_RATE))
            .collect::<Result<Vec<_>, _>>()?;
        let ram = p
            .series
            .iter()
            .map(|row| cell_at(Category::UsedResource, row, DC_RAM_RATE))
            .collect::<Result<Vec<_>, _>>()?;
        let bw = bw_series
            .iter()
            .map(|row| cell_at(Category::UsedBwResource, row, LINK_BW_RATE))
            .collect::<Result<Vec<_>, _>>()?;

        columns.extend([cpu, ram, bw]);
    }

    let max_len = columns.iter().map(Vec::len).max().unwrap_or(0);
    let rows = (0..max_len)
        .map(|i| {
            columns
                .iter()
                .map(|col| Cell::from(col.get(i).copied()))
                .collect_vec()
        })
        .collect_vec();

    let algorithm_header = resources
        .iter()
        .flat_map(|p| std::iter::repeat(Cell::from(p.label)).take(3))
        .collect_vec();
    let metric_header = resources
        .iter()
        .flat_map(|_| {
            ["cpuUtilization", "ramUtilization", "bwUtilization"]
                .into_iter()
                .map(Cell::from)
        })
        .collect_vec();

    Ok(Some(PivotTable {
        headers: vec![algorithm_header, metric_header],
        rows,
    }))
}

/// Total cost of ownership, a single row with one column per algorithm.
pub fn total_cost(
    experiment: &Experiment,
    result_set: &ResultSet,
) -> Result<Option<PivotTable>, DigestError> {
    let costs = present(experiment, result_set, Category::Tco);
    if costs.is_empty() {
        return Ok(None);
    }

    let row = costs
        .iter()
        .map(|p| scalar(Category::Tco, p.series, 0).map(Cell::from))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(PivotTable {
        headers: vec![costs.iter().map(|p| Cell::from(p.label)).collect()],
        rows: vec![row],
    }))
}

/// Builds every comparison table of one experiment from a trial's (or the summary's) results.
///
/// A table that fails to build is reported in `failures` and does not stop the others. Tables
/// without a single contributing algorithm are not built at all.
pub fn build_tables(experiment: &Experiment, result_set: &ResultSet) -> ExperimentTables {
    let mut out = ExperimentTables::default();
    let name = experiment.name.as_str();

    let mut collect = |id: TableId, res: Result<Option<PivotTable>, DigestError>| match res {
        Ok(Some(table)) => out.tables.push((id, table)),
        Ok(None) => debug!("No data for {} in {}", id, result_set.trial()),
        Err(err) => {
            warn!("Unable to build {} for {}: {}", id, result_set.trial(), err);
            out.failures.push((id, err));
        }
    };

    collect(
        TableId::new(name, Category::DecisionDelay),
        decision_delay(experiment, result_set),
    );
    collect(
        TableId::new(name, Category::SuccessRate),
        success_rate(experiment, result_set),
    );
    for p in present(experiment, result_set, Category::Destination) {
        collect(
            TableId::for_algorithm(name, p.algorithm, Category::Destination),
            destination(p.series).map(Some),
        );
    }
    collect(
        TableId::new(name, Category::TotalUsedResource),
        overall_utilization(experiment, result_set),
    );
    collect(
        TableId::new(name, Category::UsedResource),
        regional_utilization(experiment, result_set),
    );
    collect(
        TableId::new(name, Category::Tco),
        total_cost(experiment, result_set),
    );

    out
}
