/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::ResultProvider;
use crate::{
    category::Category,
    config::Config,
    errors::DigestError,
    result_set::{Row, RunUnit, Series},
};
use anyhow::Context;
use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

/// Replays the csv exports written by an earlier database pass.
pub struct CsvProvider {
    config: Config,
}
impl CsvProvider {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

fn parse_field(path: &Path, record: &::csv::StringRecord, field: &str) -> Result<f64, DigestError> {
    let field = field.trim();
    if field.is_empty() {
        return Ok(0.0);
    }

    field.parse::<f64>().map_err(|err| DigestError::ParseFailure {
        path: path.to_path_buf(),
        line: record.iter().collect::<Vec<_>>().join(","),
        reason: format!("{:?} is not a number: {}", field, err),
    })
}

/// Reads a headerless numeric csv file. Empty fields read as zero.
pub fn read_series(path: &Path) -> anyhow::Result<Option<Series>> {
    if !path.exists() {
        debug!("No export at {:?}", path);
        return Ok(None);
    }

    let mut reader = ::csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .context(format!("Unable to open export {:?}", path))?;

    let mut series = vec![];
    for record in reader.records() {
        let record = record.context(format!("Unable to read export {:?}", path))?;
        let row = record
            .iter()
            .map(|field| parse_field(path, &record, field))
            .collect::<Result<Row, _>>()?;
        series.push(row);
    }

    Ok(Some(series))
}

#[async_trait]
impl ResultProvider for CsvProvider {
    async fn has_source(&self, unit: &RunUnit) -> bool {
        self.config.db_path(unit).exists()
    }

    async fn fetch(&self, unit: &RunUnit, category: Category) -> anyhow::Result<Option<Series>> {
        read_series(&self.config.export_path(unit, category))
    }

    async fn fetch_cost(&self, unit: &RunUnit) -> anyhow::Result<Option<f64>> {
        let series = read_series(&self.config.export_path(unit, Category::Tco))?;
        Ok(series.and_then(|rows| rows.first().and_then(|row| row.first().copied())))
    }
}
