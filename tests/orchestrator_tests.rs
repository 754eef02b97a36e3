use anyhow::Context;
use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DbBackend, Statement};
use simdigest::{
    category::Category,
    config::Config,
    errors::DigestError,
    provider::{database, CsvProvider, DatabaseProvider, ResultProvider},
    result_set::{RunUnit, Series, TrialId},
};
use std::{collections::HashMap, fs, path::Path};

/// Serves canned results keyed by trial number and algorithm.
#[derive(Default)]
struct MemoryProvider {
    series: HashMap<(u32, String, Category), Series>,
    costs: HashMap<(u32, String), f64>,
    exporting: bool,
}
impl MemoryProvider {
    fn with_series(
        mut self,
        trial: u32,
        algorithm: &str,
        category: Category,
        series: Series,
    ) -> Self {
        self.series
            .insert((trial, algorithm.to_string(), category), series);
        self
    }

    fn with_cost(mut self, trial: u32, algorithm: &str, cost: f64) -> Self {
        self.costs.insert((trial, algorithm.to_string()), cost);
        self
    }

    fn exporting(mut self) -> Self {
        self.exporting = true;
        self
    }

    fn trial(unit: &RunUnit) -> u32 {
        match unit.trial {
            TrialId::Trial(n) => n,
            TrialId::Summary => 0,
        }
    }
}

#[async_trait]
impl ResultProvider for MemoryProvider {
    async fn has_source(&self, unit: &RunUnit) -> bool {
        let trial = Self::trial(unit);
        self.series
            .keys()
            .any(|(t, alg, _)| *t == trial && *alg == unit.algorithm)
    }

    async fn fetch(&self, unit: &RunUnit, category: Category) -> anyhow::Result<Option<Series>> {
        Ok(self
            .series
            .get(&(Self::trial(unit), unit.algorithm.clone(), category))
            .cloned())
    }

    async fn fetch_cost(&self, unit: &RunUnit) -> anyhow::Result<Option<f64>> {
        Ok(self
            .costs
            .get(&(Self::trial(unit), unit.algorithm.clone()))
            .copied())
    }

    fn exports(&self) -> bool {
        self.exporting
    }
}

fn config(record_dir: &Path, trials: u32) -> anyhow::Result<Config> {
    let conf = format!(
        r#"
        record_dir = "{}"
        log_dir = "{}"
        trials = {}

        [[experiment]]
        name = "1-overall"
        algorithms = ["1-Lattice", "2-Diktyo", "3-TanGo"]
        labels = ["Lattice", "Diktyo", "TanGo"]
        "#,
        record_dir.display(),
        record_dir.join("logs").display(),
        trials
    );
    Config::try_from_str(&conf)
}

fn lattice_only(record_dir: &Path) -> anyhow::Result<Config> {
    let mut config = config(record_dir, 1)?;
    config.experiments[0].algorithms.truncate(1);
    config.experiments[0].labels.truncate(1);
    Ok(config)
}

fn destination_rows(dc1: f64, dc3: f64, fail: f64) -> Series {
    vec![
        vec![0.0, 1.0, 1.0, dc1],
        vec![0.0, 3.0, 1.0, dc3],
        vec![0.0, -1.0, 1.0, fail],
    ]
}

fn read(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).context(format!("{:?} should have been written", path))
}

/// Every comparison table under `dir`, by file name.
fn tables_in(dir: &Path) -> anyhow::Result<Vec<(String, String)>> {
    let mut tables = vec![];
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if name.contains(".SUM.") {
            tables.push((name, read(&path)?));
        }
    }
    tables.sort();
    Ok(tables)
}

async fn seed_store(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::File::create(path)?;

    let script = fs::read_to_string("./fixtures/record_store.sql")?;
    let db = database::connect(path).await?;
    for stmt in script.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        db.execute(Statement::from_string(DbBackend::Sqlite, stmt))
            .await
            .context(format!("Error applying fixture {}", stmt))?;
    }
    db.close().await?;
    Ok(())
}

#[tokio::test]
async fn trials_are_pivoted_and_averaged() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = config(dir.path(), 2)?;

    let provider = MemoryProvider::default()
        .with_series(
            1,
            "1-Lattice",
            Category::SuccessRate,
            vec![vec![0.0, 9.0, 10.0, 90.0], vec![100.0, 8.0, 10.0, 80.0]],
        )
        .with_series(
            2,
            "1-Lattice",
            Category::SuccessRate,
            vec![vec![0.0, 10.0, 10.0, 100.0], vec![100.0, 6.0, 10.0, 60.0]],
        )
        .with_series(
            1,
            "2-Diktyo",
            Category::SuccessRate,
            vec![vec![0.0, 5.0, 10.0, 50.0], vec![100.0, 5.0, 10.0, 50.0]],
        )
        .with_series(
            2,
            "2-Diktyo",
            Category::SuccessRate,
            vec![vec![0.0, 7.0, 10.0, 70.0], vec![100.0, 3.0, 10.0, 30.0]],
        )
        .with_series(
            1,
            "1-Lattice",
            Category::Destination,
            destination_rows(50.0, 30.0, 20.0),
        )
        .with_series(
            2,
            "1-Lattice",
            Category::Destination,
            destination_rows(70.0, 30.0, 0.0),
        )
        .with_cost(1, "1-Lattice", 100.0)
        .with_cost(2, "1-Lattice", 200.0)
        .with_cost(1, "2-Diktyo", 300.0);

    let report = simdigest::run(&config, &provider).await?;

    assert_eq!(report.trials_processed, 2);

    let trial_one = dir.path().join("test-1");
    assert_eq!(
        read(&trial_one.join("1-overall.SUM.success_rate_data.csv"))?,
        "Times,Lattice,Diktyo\n1,90,50\n2,80,50\n"
    );
    assert_eq!(
        read(&trial_one.join("1-overall.1-Lattice.SUM.destination_data.csv"))?,
        "Batch,DC1,DC2,DC3,DC4,DC5,DC6,DC7,DC8,DC9,DC10,Fail\n1,50,0,30,0,0,0,0,0,0,0,20\n"
    );
    assert!(!trial_one
        .join("1-overall.2-Diktyo.SUM.destination_data.csv")
        .exists());

    let summary = dir.path().join("SUM-1-2");
    assert_eq!(
        read(&summary.join("1-overall.SUM.success_rate_data.csv"))?,
        "Times,Lattice,Diktyo\n1,95,60\n2,70,40\n"
    );
    assert_eq!(
        read(&summary.join("1-overall.1-Lattice.SUM.destination_data.csv"))?,
        "Batch,DC1,DC2,DC3,DC4,DC5,DC6,DC7,DC8,DC9,DC10,Fail\n1,60,0,30,0,0,0,0,0,0,0,10\n"
    );
    // Diktyo only reported a cost in the first trial
    assert_eq!(
        read(&summary.join("1-overall.SUM.TCO_data.csv"))?,
        "Lattice,Diktyo\n150,300\n"
    );

    // the summary is kept for the preview
    assert!(report
        .summary
        .iter()
        .any(|(id, _)| id.category == Category::SuccessRate));

    // TanGo has no record store in either trial
    let missing = report
        .skipped
        .iter()
        .filter(|s| s.what.contains("3-TanGo"))
        .count();
    assert_eq!(missing, 2);
    Ok(())
}

#[tokio::test]
async fn absent_algorithms_have_no_column() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = config(dir.path(), 1)?;

    let provider = MemoryProvider::default().with_series(
        1,
        "2-Diktyo",
        Category::DecisionDelay,
        vec![vec![0.0, 1.5, 2.0, 1.0]],
    );

    simdigest::run(&config, &provider).await?;

    assert_eq!(
        read(&dir.path().join("test-1/1-overall.SUM.decision_delay_data.csv"))?,
        "Times,Diktyo\n1,1.5\n"
    );
    Ok(())
}

#[tokio::test]
async fn shape_mismatches_skip_only_the_affected_summary() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = config(dir.path(), 2)?;

    let provider = MemoryProvider::default()
        .with_series(
            1,
            "1-Lattice",
            Category::SuccessRate,
            vec![vec![0.0, 1.0, 1.0, 100.0]],
        )
        .with_series(
            2,
            "1-Lattice",
            Category::SuccessRate,
            vec![vec![0.0, 1.0, 1.0, 100.0], vec![100.0, 0.0, 1.0, 0.0]],
        )
        .with_series(
            1,
            "1-Lattice",
            Category::DecisionDelay,
            vec![vec![0.0, 1.0, 1.0, 1.0]],
        )
        .with_series(
            2,
            "1-Lattice",
            Category::DecisionDelay,
            vec![vec![0.0, 3.0, 3.0, 3.0]],
        );

    let report = simdigest::run(&config, &provider).await?;

    let summary = dir.path().join("SUM-1-2");
    assert!(!summary.join("1-overall.SUM.success_rate_data.csv").exists());
    assert_eq!(
        read(&summary.join("1-overall.SUM.decision_delay_data.csv"))?,
        "Times,Lattice\n1,2\n"
    );
    assert!(report
        .skipped
        .iter()
        .any(|s| s.what.contains("success_rate") && s.what.contains("summary")));
    Ok(())
}

#[tokio::test]
async fn invalid_destination_slots_skip_the_category() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = config(dir.path(), 1)?;

    let provider = MemoryProvider::default()
        .with_series(
            1,
            "1-Lattice",
            Category::Destination,
            vec![vec![0.0, 11.0, 1.0, 100.0]],
        )
        .with_series(
            1,
            "1-Lattice",
            Category::SuccessRate,
            vec![vec![0.0, 1.0, 1.0, 100.0]],
        );

    let report = simdigest::run(&config, &provider).await?;

    let trial_one = dir.path().join("test-1");
    assert!(!trial_one
        .join("1-overall.1-Lattice.SUM.destination_data.csv")
        .exists());
    assert!(trial_one.join("1-overall.SUM.success_rate_data.csv").exists());

    let reason = DigestError::InvalidSlot { batch: 1, slot: 11 }.to_string();
    assert!(report.skipped.iter().any(|s| s.reason.contains(&reason)));
    Ok(())
}

#[tokio::test]
async fn failed_exports_keep_the_fetched_rows() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = lattice_only(dir.path())?;
    let unit = RunUnit::new(TrialId::Trial(1), "1-overall", "1-Lattice");

    // a directory where the export file should go makes the write fail
    fs::create_dir_all(config.export_path(&unit, Category::SuccessRate))?;
    fs::create_dir_all(config.export_path(&unit, Category::Tco))?;

    let provider = MemoryProvider::default()
        .with_series(
            1,
            "1-Lattice",
            Category::SuccessRate,
            vec![vec![0.0, 9.0, 10.0, 90.0]],
        )
        .with_series(
            1,
            "1-Lattice",
            Category::DecisionDelay,
            vec![vec![0.0, 2.0, 3.0, 1.0]],
        )
        .with_cost(1, "1-Lattice", 12.5)
        .exporting();

    let report = simdigest::run(&config, &provider).await?;

    let trial_one = dir.path().join("test-1");
    assert_eq!(
        read(&trial_one.join("1-overall.SUM.success_rate_data.csv"))?,
        "Times,Lattice\n1,90\n"
    );
    assert_eq!(
        read(&trial_one.join("1-overall.SUM.TCO_data.csv"))?,
        "Lattice\n12.5\n"
    );
    assert_eq!(
        read(&dir.path().join("SUM-1-1/1-overall.SUM.TCO_data.csv"))?,
        "Lattice\n12.5\n"
    );

    // exports that could be written still are
    assert_eq!(
        read(&config.export_path(&unit, Category::DecisionDelay))?,
        "0,2,3,1\n"
    );

    let failed_exports = report
        .skipped
        .iter()
        .filter(|s| s.what.contains("export of"))
        .map(|s| s.what.as_str())
        .collect::<Vec<_>>();
    assert_eq!(failed_exports.len(), 2);
    assert!(failed_exports.iter().any(|w| w.starts_with("success_rate")));
    assert!(failed_exports.iter().any(|w| w.starts_with("TCO")));
    Ok(())
}

#[tokio::test]
async fn database_pass_exports_rows_that_replay_to_the_same_tables() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = lattice_only(dir.path())?;
    let unit = RunUnit::new(TrialId::Trial(1), "1-overall", "1-Lattice");

    seed_store(&config.db_path(&unit)).await?;
    let log = config.log_path(&unit);
    if let Some(parent) = log.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&log, "12:00:00 INFO finished\n12:00:01 INFO TCO: 42.5\n")?;

    let provider = DatabaseProvider::new(config.clone());
    let report = simdigest::run(&config, &provider).await?;
    drop(provider);

    assert_eq!(report.trials_processed, 1);
    assert!(report.skipped.is_empty(), "{:?}", report.skipped);

    // raw rows as the store returned them, one file per category
    for category in Category::QUERIED {
        assert!(config.export_path(&unit, category).exists(), "{}", category);
    }
    let destination = read(&config.export_path(&unit, Category::Destination))?;
    let lines = destination.lines().collect::<Vec<_>>();
    assert_eq!(lines.len(), 22);
    assert_eq!(lines[0], "0,-1,1,25");
    assert_eq!(lines[1], "0,1,2,50");
    assert_eq!(read(&config.export_path(&unit, Category::Tco))?, "42.5\n");

    let trial_one = dir.path().join("test-1");
    assert_eq!(
        read(&trial_one.join("1-overall.1-Lattice.SUM.destination_data.csv"))?,
        "Batch,DC1,DC2,DC3,DC4,DC5,DC6,DC7,DC8,DC9,DC10,Fail\n\
         1,50,0,25,0,0,0,0,0,0,0,25\n\
         2,0,100,0,0,0,0,0,0,0,0,0\n"
    );

    let summary = dir.path().join("SUM-1-1");
    let from_database = (tables_in(&trial_one)?, tables_in(&summary)?);
    assert!(from_database
        .1
        .iter()
        .any(|(name, _)| name == "1-overall.SUM.TCO_data.csv"));

    let provider = CsvProvider::new(config.clone());
    simdigest::run(&config, &provider).await?;
    let from_exports = (tables_in(&trial_one)?, tables_in(&summary)?);

    assert_eq!(from_database, from_exports);
    Ok(())
}

#[tokio::test]
async fn csv_exports_are_replayed() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = lattice_only(dir.path())?;

    let unit = RunUnit::new(TrialId::Trial(1), "1-overall", "1-Lattice");
    fs::create_dir_all(config.trial_dir(unit.trial))?;
    fs::write(config.db_path(&unit), "")?;
    fs::write(
        config.export_path(&unit, Category::Destination),
        "0,1,2,50\n0,2,1,25\n0,-1,1,25\n",
    )?;
    fs::write(config.export_path(&unit, Category::Tco), "42\n")?;

    let provider = CsvProvider::new(config.clone());
    let report = simdigest::run(&config, &provider).await?;

    assert_eq!(report.trials_processed, 1);
    assert_eq!(
        read(&dir.path().join("test-1/1-overall.1-Lattice.SUM.destination_data.csv"))?,
        "Batch,DC1,DC2,DC3,DC4,DC5,DC6,DC7,DC8,DC9,DC10,Fail\n1,50,25,0,0,0,0,0,0,0,0,25\n"
    );
    assert_eq!(
        read(&dir.path().join("SUM-1-1/1-overall.SUM.TCO_data.csv"))?,
        "Lattice\n42\n"
    );
    Ok(())
}
