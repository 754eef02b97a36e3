/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::{cost_log, ResultProvider};
use crate::{
    category::Category,
    config::Config,
    result_set::{Row, RunUnit, Series},
};
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, QueryResult,
    Statement,
};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, trace};

const DROP_DELAY_VIEW: &str = "DROP VIEW IF EXISTS instanceDelay;";

const CREATE_DELAY_VIEW: &str = r#"
CREATE VIEW IF NOT EXISTS instanceDelay AS
SELECT
    instance.id,
    userRequest.submitTime AS submitTime,
    instance.startTime - userRequest.submitTime AS delay,
    instanceGroup.interScheduleEndTime - userRequest.submitTime AS interScheduleTime,
    instanceGroup.receivedTime - instanceGroup.interScheduleEndTime AS transToDCTime,
    instance.intraScheduleEndTime - instanceGroup.receivedTime AS intraScheduleTime,
    instance.startTime - instance.intraScheduleEndTime AS allocateTime
FROM instance
LEFT JOIN instanceGroup ON instance.instanceGroupId = instanceGroup.id
LEFT JOIN userRequest ON instance.userRequestId = userRequest.id
WHERE instance.startTime >= 0;
"#;

const DECISION_DELAY: &str = r#"
SELECT submitTime, AVG(interScheduleTime), MAX(interScheduleTime), MIN(interScheduleTime)
FROM instanceDelay
GROUP BY submitTime
ORDER BY submitTime;
"#;

const SUCCESS_RATE: &str = r#"
SELECT
    userRequest.submitTime,
    SUM(CASE WHEN instanceGroup.receivedDc != -1 THEN 1 ELSE 0 END) AS successNum,
    t.totalCount AS sumNum,
    CAST(SUM(CASE WHEN instanceGroup.receivedDc != -1 THEN 1 ELSE 0 END) AS REAL) / t.totalCount * 100.0 AS successRate
FROM instanceGroup
JOIN userRequest ON instanceGroup.userRequestId = userRequest.id
JOIN (
    SELECT userRequest.submitTime, COUNT(instanceGroup.id) AS totalCount
    FROM instanceGroup
    JOIN userRequest ON instanceGroup.userRequestId = userRequest.id
    GROUP BY userRequest.submitTime
) t ON userRequest.submitTime = t.submitTime
GROUP BY userRequest.submitTime
ORDER BY userRequest.submitTime;
"#;

const DESTINATION: &str = r#"
SELECT
    userRequest.submitTime,
    datacenter.id AS receivedDc,
    IFNULL(COUNT(instanceGroup.id), 0) AS countDc,
    CAST(IFNULL(COUNT(instanceGroup.id), 0) AS REAL) / t.totalCount * 100.0 AS percentage
FROM userRequest
CROSS JOIN (
    SELECT -1 AS id UNION ALL SELECT 1 UNION ALL SELECT 2 UNION ALL SELECT 3 UNION ALL SELECT 4 UNION ALL
    SELECT 5 UNION ALL SELECT 6 UNION ALL SELECT 7 UNION ALL SELECT 8 UNION ALL SELECT 9 UNION ALL SELECT 10
) AS datacenter
LEFT JOIN instanceGroup
    ON instanceGroup.userRequestId = userRequest.id AND instanceGroup.receivedDc = datacenter.id
LEFT JOIN (
    SELECT userRequest.submitTime, COUNT(instanceGroup.id) AS totalCount
    FROM instanceGroup
    JOIN userRequest ON instanceGroup.userRequestId = userRequest.id
    GROUP BY userRequest.submitTime
) t ON userRequest.submitTime = t.submitTime
GROUP BY userRequest.submitTime, datacenter.id
ORDER BY userRequest.submitTime, datacenter.id;
"#;

const TOTAL_USED_RESOURCE: &str = r#"
SELECT
    SUM(instance.cpu) AS usedCPU,
    datacenterSum.sumCPU AS sumCPU,
    CAST(SUM(instance.cpu) AS REAL) / datacenterSum.sumCPU * 100.0 AS CPURate,
    SUM(instance.ram) AS usedRAM,
    datacenterSum.sumRAM AS sumRAM,
    CAST(SUM(instance.ram) AS REAL) / datacenterSum.sumRAM * 100.0 AS RAMRate
FROM instance
LEFT JOIN instanceGroup ON instance.instanceGroupId = instanceGroup.id
LEFT JOIN (
    SELECT SUM(cpu) AS sumCPU, SUM(ram) AS sumRAM
    FROM datacenter
    WHERE region != 'NULL' OR location != 'null'
) AS datacenterSum
WHERE instance.finishTime IS NULL AND instanceGroup.receivedDc != -1;
"#;

const TOTAL_USED_BW_RESOURCE: &str = r#"
SELECT
    IFNULL(SUM(instanceGroupGraph.bw), 0) AS usedBW,
    dcNetworkSum.sumBW AS restBW,
    CAST(IFNULL(SUM(instanceGroupGraph.bw), 0) AS REAL)
        / (CAST(IFNULL(SUM(instanceGroupGraph.bw), 0) AS REAL) + dcNetworkSum.sumBW) * 100.0 AS BWRate
FROM instanceGroupGraph
LEFT JOIN instanceGroup AS srcInstanceGroup ON instanceGroupGraph.srcInstanceGroupId = srcInstanceGroup.id
LEFT JOIN instanceGroup AS dstInstanceGroup ON instanceGroupGraph.dstInstanceGroupId = dstInstanceGroup.id
LEFT JOIN (
    SELECT SUM(bw) AS sumBW FROM dcNetwork WHERE srcDatacenterId != dstDatacenterId
) AS dcNetworkSum
WHERE srcInstanceGroup.receivedDc != -1
    AND dstInstanceGroup.receivedDc != -1
    AND instanceGroupGraph.srcDcId != instanceGroupGraph.dstDcId;
"#;

const USED_RESOURCE: &str = r#"
SELECT
    datacenter.id AS dcId,
    IFNULL(instanceSum.usedCPU, 0) AS usedCPU,
    datacenterSum.sumCPU AS sumCPU,
    CAST(IFNULL(instanceSum.usedCPU, 0) AS REAL) / datacenterSum.sumCPU * 100.0 AS CPURate,
    IFNULL(instanceSum.usedRAM, 0) AS usedRAM,
    datacenterSum.sumRAM AS sumRAM,
    CAST(IFNULL(instanceSum.usedRAM, 0) AS REAL) / datacenterSum.sumRAM * 100.0 AS RAMRate
FROM datacenter
LEFT JOIN (
    SELECT datacenter.id AS id, SUM(cpu) AS sumCPU, SUM(ram) AS sumRAM
    FROM datacenter
    WHERE region != 'NULL' OR location != 'null'
    GROUP BY datacenter.id
) AS datacenterSum ON datacenter.id = datacenterSum.id
LEFT JOIN (
    SELECT
        SUM(instance.cpu) AS usedCPU,
        SUM(instance.ram) AS usedRAM,
        instanceGroup.receivedDc AS dcId
    FROM instance
    LEFT JOIN instanceGroup ON instance.instanceGroupId = instanceGroup.id
    WHERE instance.finishTime IS NULL AND instanceGroup.receivedDc != -1
    GROUP BY instanceGroup.receivedDc
) AS instanceSum ON datacenter.id = instanceSum.dcId
WHERE region != 'NULL' OR location != 'null'
ORDER BY datacenter.id;
"#;

const USED_BW_RESOURCE: &str = r#"
SELECT
    dcNetwork.srcDatacenterId AS srcDcId,
    dcNetwork.dstDatacenterId AS dstDcId,
    IFNULL(instanceSum.usedBW, 0) AS usedBW,
    dcNetworkSum.sumBW AS restBW,
    CAST(IFNULL(instanceSum.usedBW, 0) AS REAL)
        / (CAST(IFNULL(instanceSum.usedBW, 0) AS REAL) + dcNetworkSum.sumBW) * 100.0 AS BWRate
FROM dcNetwork
LEFT JOIN (
    SELECT
        SUM(instanceGroupGraph.bw) AS usedBW,
        instanceGroupGraph.srcDcId AS srcDcId,
        instanceGroupGraph.dstDcId AS dstDcId
    FROM instanceGroupGraph
    LEFT JOIN instanceGroup AS srcInstanceGroup ON instanceGroupGraph.srcInstanceGroupId = srcInstanceGroup.id
    LEFT JOIN instanceGroup AS dstInstanceGroup ON instanceGroupGraph.dstInstanceGroupId = dstInstanceGroup.id
    WHERE srcInstanceGroup.receivedDc != -1
        AND dstInstanceGroup.receivedDc != -1
        AND instanceGroupGraph.srcDcId != instanceGroupGraph.dstDcId
    GROUP BY instanceGroupGraph.srcDcId, instanceGroupGraph.dstDcId
) AS instanceSum
    ON dcNetwork.srcDatacenterId = instanceSum.srcDcId AND dcNetwork.dstDatacenterId = instanceSum.dstDcId
LEFT JOIN (
    SELECT srcDatacenterId, dstDatacenterId, SUM(bw) AS sumBW
    FROM dcNetwork
    GROUP BY srcDatacenterId, dstDatacenterId
) AS dcNetworkSum
    ON dcNetwork.srcDatacenterId = dcNetworkSum.srcDatacenterId
    AND dcNetwork.dstDatacenterId = dcNetworkSum.dstDatacenterId
WHERE dcNetwork.srcDatacenterId != dcNetwork.dstDatacenterId
    AND dcNetwork.srcDatacenterId != -1
    AND dcNetwork.dstDatacenterId != -1
ORDER BY dcNetwork.srcDatacenterId, dcNetwork.dstDatacenterId;
"#;

fn query_for(category: Category) -> Option<&'static str> {
    match category {
        Category::DecisionDelay => Some(DECISION_DELAY),
        Category::SuccessRate => Some(SUCCESS_RATE),
        Category::Destination => Some(DESTINATION),
        Category::TotalUsedResource => Some(TOTAL_USED_RESOURCE),
        Category::TotalUsedBwResource => Some(TOTAL_USED_BW_RESOURCE),
        Category::UsedResource => Some(USED_RESOURCE),
        Category::UsedBwResource => Some(USED_BW_RESOURCE),
        Category::Tco => None,
    }
}

/// Opens a SQLite record store. The delay view is (re)created in place, so the store is
/// opened read-write.
pub async fn connect(path: &Path) -> anyhow::Result<DatabaseConnection> {
    let mut opts = ConnectOptions::new(format!("sqlite://{}?mode=rw", path.display()));
    opts.max_connections(1).sqlx_logging(false);

    Database::connect(opts)
        .await
        .context(format!("Unable to open record store {:?}", path))
}

/// Reads one numeric cell. SQLite hands back integers or reals depending on the expression, and
/// NULL where an aggregate had nothing to sum, which counts as zero.
fn decode_cell(row: &QueryResult, idx: usize) -> anyhow::Result<f64> {
    let value = match row.try_get_by_index::<Option<f64>>(idx) {
        Ok(value) => value,
        Err(_) => row
            .try_get_by_index::<Option<i64>>(idx)
            .map_err(|err| anyhow!("Column {} is not numeric: {:?}", idx, err))?
            .map(|v| v as f64),
    };

    Ok(value.unwrap_or_else(|| {
        trace!("NULL in column {}, reading as 0", idx);
        0.0
    }))
}

fn decode_row(row: &QueryResult, width: usize) -> anyhow::Result<Row> {
    (0..width).map(|idx| decode_cell(row, idx)).collect()
}

/// Runs the category query against an open record store.
pub async fn query_category(db: &DatabaseConnection, category: Category) -> anyhow::Result<Series> {
    let Some(sql) = query_for(category) else {
        return Ok(vec![]);
    };

    if category == Category::DecisionDelay {
        db.execute(Statement::from_string(DbBackend::Sqlite, DROP_DELAY_VIEW))
            .await
            .context("Error dropping instanceDelay view")?;
        db.execute(Statement::from_string(DbBackend::Sqlite, CREATE_DELAY_VIEW))
            .await
            .context("Error creating instanceDelay view")?;
    }

    let rows = db
        .query_all(Statement::from_string(DbBackend::Sqlite, sql))
        .await
        .context(format!("Error querying {}", category))?;

    rows.iter()
        .map(|row| decode_row(row, category.width()))
        .collect()
}

/// Reads results straight from the per-run SQLite record stores and the run logs.
pub struct DatabaseProvider {
    config: Config,
    current: Mutex<Option<(PathBuf, DatabaseConnection)>>,
}
impl DatabaseProvider {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            current: Mutex::new(None),
        }
    }

    /// Categories of one run are fetched back to back, so the last connection is kept around.
    async fn connection(&self, path: &Path) -> anyhow::Result<DatabaseConnection> {
        let mut current = self.current.lock().await;
        if let Some((open_path, db)) = current.as_ref() {
            if open_path == path {
                return Ok(db.clone());
            }
        }

        debug!("Connecting to record store {:?}", path);
        let db = connect(path).await?;
        *current = Some((path.to_path_buf(), db.clone()));
        Ok(db)
    }
}

#[async_trait]
impl ResultProvider for DatabaseProvider {
    async fn has_source(&self, unit: &RunUnit) -> bool {
        self.config.db_path(unit).exists()
    }

    async fn fetch(&self, unit: &RunUnit, category: Category) -> anyhow::Result<Option<Series>> {
        let path = self.config.db_path(unit);
        if !path.exists() {
            return Ok(None);
        }

        let db = self.connection(&path).await?;
        let series = query_category(&db, category)
            .await
            .context(format!("Error fetching {} for {}", category, unit))?;
        Ok(Some(series))
    }

    async fn fetch_cost(&self, unit: &RunUnit) -> anyhow::Result<Option<f64>> {
        cost_log::read_cost(&self.config.log_path(unit), self.config.cost_tail_lines)
    }

    fn exports(&self) -> bool {
        true
    }
}
