/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::{averaging::ShapePolicy, config::Source};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Verbose mode (-v, --verbose)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write an example configuration file
    Init {
        #[arg(short, long, default_value = "simdigest.toml")]
        path: PathBuf,
    },

    /// Digest every trial and write the comparison tables
    Run {
        #[arg(short, long, default_value = "simdigest.toml")]
        config: PathBuf,

        /// Where to read per-run results from, overrides the config file
        #[arg(short, long, value_enum)]
        source: Option<Source>,

        /// Number of trials, overrides the config file
        #[arg(short, long)]
        trials: Option<u32>,

        /// How to treat trials that disagree on a series' shape
        #[arg(short, long, value_enum)]
        policy: Option<ShapePolicy>,

        /// Don't print the summary tables
        #[arg(long)]
        no_preview: bool,
    },
}

pub fn parse() -> Cli {
    Cli::parse()
}
