/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

pub mod cost_log;
pub mod csv;
pub mod database;

use crate::{
    category::Category,
    result_set::{RunUnit, Series},
};
use async_trait::async_trait;

/// Supplies the already-computed results of one algorithm run.
#[async_trait]
pub trait ResultProvider: Send + Sync {
    /// Whether a record store exists for this run at all. Runs without one are skipped
    /// everywhere downstream.
    async fn has_source(&self, unit: &RunUnit) -> bool;

    /// Rows of one category in the order the store returns them. `None` means the category is
    /// not available for this run, which is different from an empty result.
    async fn fetch(&self, unit: &RunUnit, category: Category) -> anyhow::Result<Option<Series>>;

    /// Total cost of ownership reported by the run, `None` when the run left no figure behind.
    async fn fetch_cost(&self, unit: &RunUnit) -> anyhow::Result<Option<f64>>;

    /// Whether fetched rows should be exported next to the record store, so a later pass can
    /// replay them without the database.
    fn exports(&self) -> bool {
        false
    }
}

pub use self::csv::CsvProvider;
pub use database::DatabaseProvider;
