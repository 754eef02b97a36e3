/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::errors::DigestError;
use anyhow::Context;
use std::{fs, path::Path};
use tracing::debug;

/// Marker the simulator prints on the line carrying the total cost.
pub const COST_MARKER: &str = "TCO";

/// Whitespace separated field holding the figure, e.g. `12:00:01 INFO TCO: 1234.5`.
const COST_FIELD: usize = 3;

/// Finds the cost line among the last `tail_lines` lines of a run log and parses its figure.
///
/// Returns `None` when the log doesn't exist or has no cost line near its end.
pub fn read_cost(path: &Path, tail_lines: usize) -> anyhow::Result<Option<f64>> {
    if !path.exists() {
        debug!("No run log at {:?}", path);
        return Ok(None);
    }

    let log = fs::read_to_string(path).context(format!("Unable to read run log {:?}", path))?;
    let cost = parse_cost(&log, tail_lines).map_err(|(line, reason)| DigestError::ParseFailure {
        path: path.to_path_buf(),
        line,
        reason,
    })?;
    Ok(cost)
}

fn parse_cost(log: &str, tail_lines: usize) -> Result<Option<f64>, (String, String)> {
    let lines = log.lines().collect::<Vec<_>>();
    let tail = &lines[lines.len().saturating_sub(tail_lines)..];

    let Some(line) = tail.iter().find(|line| line.contains(COST_MARKER)) else {
        return Ok(None);
    };

    let field = line
        .split_whitespace()
        .nth(COST_FIELD)
        .ok_or_else(|| (line.to_string(), format!("missing field {}", COST_FIELD + 1)))?;

    field
        .parse::<f64>()
        .map(Some)
        .map_err(|err| (line.to_string(), format!("{:?} is not a number: {}", field, err)))
}
