/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::{
    category::Category,
    config::Config,
    pivot::{PivotTable, TableId},
    result_set::{RunUnit, Series, TrialId},
};
use anyhow::Context;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::debug;

/// Writes comparison tables and per-run exports into the record directory layout.
pub struct CsvOutput<'a> {
    config: &'a Config,
}
impl<'a> CsvOutput<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// `<trial dir>/<experiment>[.<algorithm>].SUM.<category>_data.csv`
    pub fn pivot_path(&self, trial: TrialId, id: &TableId) -> PathBuf {
        let stem = match id.category {
            Category::Tco => "TCO_data".to_string(),
            other => other.file_stem(),
        };
        let name = match &id.algorithm {
            Some(algorithm) => format!("{}.{}.SUM.{}.csv", id.experiment, algorithm, stem),
            None => format!("{}.SUM.{}.csv", id.experiment, stem),
        };
        self.config.trial_dir(trial).join(name)
    }

    /// Writes one comparison table, replacing any previous file.
    pub fn write_table(
        &self,
        trial: TrialId,
        id: &TableId,
        table: &PivotTable,
    ) -> anyhow::Result<PathBuf> {
        let path = self.pivot_path(trial, id);
        write_records(&path, table.records())?;
        debug!("Wrote {} to {:?}", id, path);
        Ok(path)
    }

    /// Exports the rows of one category of one run next to its record store.
    pub fn write_series(
        &self,
        unit: &RunUnit,
        category: Category,
        series: &Series,
    ) -> anyhow::Result<PathBuf> {
        let path = self.config.export_path(unit, category);
        let records = series
            .iter()
            .map(|row| row.iter().map(|v| v.to_string()).collect::<Vec<_>>())
            .collect::<Vec<_>>();
        write_records(&path, records)?;
        Ok(path)
    }
}

fn write_records(path: &Path, records: Vec<Vec<String>>) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context(format!("Unable to create directory {:?}", parent))?;
    }

    // header rows can be narrower or wider than the data rows
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(path)
        .context(format!("Unable to create {:?}", path))?;

    for record in records {
        writer
            .write_record(&record)
            .context(format!("Unable to write {:?}", path))?;
    }
    writer.flush().context(format!("Unable to flush {:?}", path))?;
    Ok(())
}
