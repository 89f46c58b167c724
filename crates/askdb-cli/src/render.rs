//! Plain-text rendering of question reports.

use askdb_agent::{Outcome, QuestionReport};
use askdb_protocol::{ColumnInfo, Row};
use colored::Colorize;
use serde_json::Value;
use std::fmt::Write;

pub fn table_heading(schema: &str, table: &str) -> String {
    format!("{}.{}", schema.dimmed(), table.bold())
}

pub fn columns(columns: &[ColumnInfo]) -> String {
    let mut out = String::new();
    for column in columns {
        let _ = writeln!(out, "  {} {}", column.column, column.data_type.dimmed());
    }
    out
}

/// Everything the session learned about one question, in stage order.
pub fn report(report: &QuestionReport) -> String {
    let mut out = String::new();

    if !report.matched_tables.is_empty() {
        let _ = writeln!(
            out,
            "{} {}",
            "Matched tables:".cyan().bold(),
            report.matched_tables.join(", ")
        );
    }
    for (table, cols) in &report.schemas {
        let _ = writeln!(out, "{}", table.bold());
        out.push_str(&columns(cols));
    }
    if let Some(query) = &report.query {
        let _ = writeln!(out, "{} {}", "Query:".cyan().bold(), query);
    }

    match &report.outcome {
        Outcome::Done(rows) => {
            out.push_str(&rows_table(rows));
            let _ = writeln!(out, "{}", format!("({} rows)", rows.len()).dimmed());
        }
        Outcome::TableNotFound(_) | Outcome::NoTablesMatched => {
            let _ = writeln!(out, "{} {}", "⛔".red(), report.outcome);
        }
        other => {
            let _ = writeln!(out, "{} {other}", "error:".red().bold());
        }
    }
    out
}

/// Rows as an aligned text table; columns follow the first row's key order.
pub fn rows_table(rows: &[Row]) -> String {
    let Some(first) = rows.first() else {
        return String::new();
    };
    let headers: Vec<&String> = first.keys().collect();
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            headers
                .iter()
                .map(|h| row.get(h.as_str()).map(cell).unwrap_or_default())
                .collect()
        })
        .collect();

    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            cells
                .iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(h.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    let header_line: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(h, w)| format!("{h:<w$}"))
        .collect();
    let _ = writeln!(out, "{}", header_line.join(" | ").bold());
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let _ = writeln!(out, "{}", rule.join("-+-"));
    for row in &cells {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{c:<w$}"))
            .collect();
        let _ = writeln!(out, "{}", line.join(" | ").trim_end());
    }
    out
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
