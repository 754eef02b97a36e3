/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::{
    pivot::{Cell, PivotTable},
    RunReport,
};
use colored::*;
use term_table::{row::Row, table_cell::*, Table, TableStyle};

/// Data rows shown per table in the terminal preview.
pub const PREVIEW_ROWS: usize = 10;

fn preview_cell(cell: &Cell) -> String {
    match cell {
        Cell::Number(n) => format!("{:.3}", n),
        Cell::Missing => "--".to_string(),
        other => other.to_string(),
    }
}

/// Renders the first `max_rows` rows of a table, headers in bold.
pub fn render_table(table: &PivotTable, max_rows: usize) -> String {
    let headers = table.headers.iter().map(|header| {
        Row::new(
            header
                .iter()
                .map(|cell| TableCell::new(cell.to_string().bold()))
                .collect::<Vec<_>>(),
        )
    });
    let rows = table
        .rows
        .iter()
        .take(max_rows)
        .map(|row| {
            Row::new(
                row.iter()
                    .map(|cell| TableCell::new(preview_cell(cell)))
                    .collect::<Vec<_>>(),
            )
        });

    let mut rendered = Table::builder()
        .rows(headers.chain(rows).collect())
        .style(TableStyle::rounded())
        .build()
        .render();

    if table.rows.len() > max_rows {
        rendered.push_str(&format!(
            "\n{}",
            format!("... {} more rows", table.rows.len() - max_rows).bright_black()
        ));
    }
    rendered
}

/// Prints the cross-trial comparison tables.
pub fn print_summary(report: &RunReport) {
    println!("\n{}", " Summary ".reversed().green());
    if report.summary.is_empty() {
        println!("{}", "no summary tables were built".bright_black());
        return;
    }

    for (id, table) in report.summary.iter() {
        println!("{}:", id.to_string().green());
        println!("{}", render_table(table, PREVIEW_ROWS));
    }
}

/// Prints what was written and what was skipped.
pub fn print_report(report: &RunReport) {
    let elapsed = report.finished - report.started;

    println!("\n{}", " Report ".reversed().green());
    let table = Table::builder()
        .rows(vec![
            Row::new(vec![
                TableCell::new("Trials".bold()),
                TableCell::new("Tables written".bold()),
                TableCell::new("Skipped".bold()),
                TableCell::new("Duration (s)".bold()),
            ]),
            Row::new(vec![
                TableCell::new(report.trials_processed),
                TableCell::new(report.tables_written.len()),
                TableCell::new(report.skipped.len()),
                TableCell::new(format!(
                    "{:.3}s",
                    elapsed.num_milliseconds() as f64 / 1000.0
                )),
            ]),
        ])
        .style(TableStyle::rounded())
        .build();
    println!("{}", table.render());

    for skipped in report.skipped.iter() {
        println!("{} {}: {}", "skipped".yellow(), skipped.what, skipped.reason);
    }
}
