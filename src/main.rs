/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use anyhow::Context;
use colored::*;
use simdigest::{
    clap_args::{self, Commands},
    config::{Config, Source},
    provider::{CsvProvider, DatabaseProvider, ResultProvider},
    report,
};
use tracing::{info, subscriber::set_global_default, Subscriber};
use tracing_subscriber::EnvFilter;

fn get_subscriber(env_filter: String) -> impl Subscriber + Sync + Send {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(env_filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .finish()
}

fn init_subscriber(subscriber: impl Subscriber + Sync + Send) {
    set_global_default(subscriber).expect("Failed to set subscriber");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG from .env takes precedence over the config file
    dotenvy::dotenv().ok();

    let args = clap_args::parse();

    match args.command {
        Commands::Init { path } => {
            init_subscriber(get_subscriber(default_level(args.verbose, None)));
            Config::write_example_to_file(&path)?;
            println!("\n{}", " Created example configuration ".reversed().green());
            println!("> {}", path.display().to_string().green());
        }

        Commands::Run {
            config,
            source,
            trials,
            policy,
            no_preview,
        } => {
            let mut cfg = Config::try_from_path(&config)?;
            init_subscriber(get_subscriber(default_level(
                args.verbose,
                cfg.log_level.as_deref(),
            )));

            if let Some(source) = source {
                cfg.source = source;
            }
            if let Some(trials) = trials {
                cfg.trials = trials;
            }
            if let Some(policy) = policy {
                cfg.shape_policy = policy;
            }
            cfg.validate().context("Invalid configuration")?;

            info!(
                "Digesting {} trials from {:?} ({:?} source)",
                cfg.trials, cfg.record_dir, cfg.source
            );
            let provider: Box<dyn ResultProvider> = match cfg.source {
                Source::Database => Box::new(DatabaseProvider::new(cfg.clone())),
                Source::Csv => Box::new(CsvProvider::new(cfg.clone())),
            };

            let run_report = simdigest::run(&cfg, provider.as_ref()).await?;
            if !no_preview {
                report::print_summary(&run_report);
            }
            report::print_report(&run_report);
        }
    }

    Ok(())
}

fn default_level(verbose: bool, configured: Option<&str>) -> String {
    match (verbose, configured) {
        (true, _) => "debug".to_string(),
        (false, Some(level)) => level.to_string(),
        (false, None) => "warn".to_string(),
    }
}
