/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::{
    averaging::ShapePolicy,
    category::Category,
    result_set::{RunUnit, TrialId},
};
use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::{Read, Write},
    path::{Path, PathBuf},
};

static EXAMPLE_CONFIG: &str = include_str!("templates/simdigest.toml");

// ******** ******** ********
// **    CONFIGURATION     **
// ******** ******** ********
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub record_dir: PathBuf,
    pub log_dir: PathBuf,
    #[serde(default = "default_trials")]
    pub trials: u32,
    #[serde(default)]
    pub source: Source,
    #[serde(default)]
    pub shape_policy: ShapePolicy,
    #[serde(default = "default_cost_tail_lines")]
    pub cost_tail_lines: usize,
    pub log_level: Option<String>,
    #[serde(default)]
    pub naming: Naming,
    #[serde(rename(serialize = "experiment", deserialize = "experiment"))]
    pub experiments: Vec<Experiment>,
}

fn default_trials() -> u32 {
    10
}

fn default_cost_tail_lines() -> usize {
    15
}

/// Where the per-run rows are read from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Query the SQLite record stores and export every category as csv.
    #[default]
    Database,

    /// Re-read the csv exports of an earlier database pass.
    Csv,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Naming {
    pub trial_prefix: String,
    pub db_suffix: String,
    pub log_suffix: String,
    pub summary_dir: Option<String>,
}
impl Default for Naming {
    fn default() -> Self {
        Self {
            trial_prefix: "test-".to_string(),
            db_suffix: ".example".to_string(),
            log_suffix: "-example".to_string(),
            summary_dir: None,
        }
    }
}

/// A comparison scenario: the algorithms under test and the label each one gets in the
/// comparison tables, position by position.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Experiment {
    pub name: String,
    pub algorithms: Vec<String>,
    pub labels: Vec<String>,
}
impl Experiment {
    /// `(algorithm, label)` pairs in configured order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &str)> {
        self.algorithms
            .iter()
            .map(String::as_str)
            .zip(self.labels.iter().map(String::as_str))
    }
}

impl Config {
    pub fn write_example_to_file(path: &Path) -> anyhow::Result<File> {
        let mut file = File::create_new(path)
            .context(format!("Unable to create config file {:?}", path))?;
        file.write_all(EXAMPLE_CONFIG.as_bytes())?;
        Ok(file)
    }

    pub fn example() -> anyhow::Result<Config> {
        Config::try_from_str(EXAMPLE_CONFIG)
    }

    pub fn try_from_path(path: &Path) -> anyhow::Result<Config> {
        let mut config_str = String::new();
        fs::File::open(path)
            .context(format!("Unable to open config file {:?}", path))?
            .read_to_string(&mut config_str)?;
        Config::try_from_str(&config_str)
    }

    pub fn try_from_str(conf_str: &str) -> anyhow::Result<Config> {
        let config = toml::from_str::<Config>(conf_str)
            .map_err(|e| anyhow!("TOML parsing error: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.trials == 0 {
            return Err(anyhow!("At least one trial is required"));
        }

        if self.experiments.is_empty() {
            return Err(anyhow!("No experiments configured"));
        }

        for exp in self.experiments.iter() {
            if exp.algorithms.len() != exp.labels.len() {
                return Err(anyhow!(
                    "Experiment {} has {} algorithms but {} labels",
                    exp.name,
                    exp.algorithms.len(),
                    exp.labels.len()
                ));
            }
        }

        Ok(())
    }

    pub fn trial_ids(&self) -> impl Iterator<Item = TrialId> {
        (1..=self.trials).map(TrialId::Trial)
    }

    /// Name of the directory holding the stores and tables of one trial, or the summary.
    pub fn trial_dir_name(&self, trial: TrialId) -> String {
        match trial {
            TrialId::Trial(n) => format!("{}{}", self.naming.trial_prefix, n),
            TrialId::Summary => self
                .naming
                .summary_dir
                .clone()
                .unwrap_or_else(|| format!("SUM-1-{}", self.trials)),
        }
    }

    pub fn trial_dir(&self, trial: TrialId) -> PathBuf {
        self.record_dir.join(self.trial_dir_name(trial))
    }

    fn unit_stem(&self, unit: &RunUnit) -> String {
        format!(
            "{}.{}{}",
            unit.experiment, unit.algorithm, self.naming.db_suffix
        )
    }

    /// `<record_dir>/<trial>/<experiment>.<algorithm><db_suffix>.db`
    pub fn db_path(&self, unit: &RunUnit) -> PathBuf {
        self.trial_dir(unit.trial)
            .join(format!("{}.db", self.unit_stem(unit)))
    }

    /// `<record_dir>/<trial>/<experiment>.<algorithm><db_suffix>.<category>.csv`
    pub fn export_path(&self, unit: &RunUnit, category: Category) -> PathBuf {
        self.trial_dir(unit.trial).join(format!(
            "{}.{}.csv",
            self.unit_stem(unit),
            category.file_stem()
        ))
    }

    /// `<log_dir>/<trial>/<experiment>-<algorithm><log_suffix>.log`
    pub fn log_path(&self, unit: &RunUnit) -> PathBuf {
        self.log_dir.join(self.trial_dir_name(unit.trial)).join(format!(
            "{}-{}{}.log",
            unit.experiment, unit.algorithm, self.naming.log_suffix
        ))
    }
}
