//! Markdown tables built from the CSV writer's output.

use regex::Regex;
use std::io::Write;
use std::sync::LazyLock;

use crate::benchstat::{self, ComparisonTable};
use crate::error::{DiffError, Result};

const FORMAT: &str = "markdown";

static GROUP_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*([^:^ ]+:)\s?").expect("valid group key pattern"));

/// Split every table into single-group tables, dropping the empty ones
pub fn split_tables(tables: &[ComparisonTable]) -> Vec<ComparisonTable> {
    tables
        .iter()
        .flat_map(ComparisonTable::split_by_group)
        .filter(|table| !table.rows.is_empty())
        .collect()
}

/// Turn a condensed `key:value key2:value2` label into one `key: value` line per key
pub fn format_group(group: &str) -> String {
    GROUP_KEY
        .replace_all(group, "\n${1} ")
        .trim()
        .to_string()
}

/// Write tables as Markdown, one section per group
pub fn write_markdown(w: &mut dyn Write, tables: &[ComparisonTable], no_range: bool) -> Result<()> {
    let tables = split_tables(tables);

    let mut groups: Vec<&str> = Vec::new();
    for table in &tables {
        for group in &table.groups {
            if !groups.contains(&group.as_str()) {
                groups.push(group);
            }
        }
    }

    for (i, group) in groups.iter().enumerate() {
        let mut header = String::new();
        if i > 0 {
            header.push('\n');
        }
        let formatted = format_group(group);
        if !formatted.is_empty() {
            header.push_str(&formatted);
            header.push_str("\n\n");
        }

        let mut csv = Vec::new();
        let in_group = |t: &&ComparisonTable| t.groups.first().map(String::as_str) == Some(*group);
        for table in tables.iter().filter(in_group) {
            benchstat::csv::write_csv(&mut csv, std::slice::from_ref(table), no_range)
                .map_err(|e| DiffError::render(FORMAT, e))?;
            csv.push(b'\n');
        }
        let csv = String::from_utf8(csv).map_err(|e| DiffError::render(FORMAT, e))?;

        let body = csv_to_markdown(&csv)?.join("\n");
        w.write_all(header.as_bytes())
            .and_then(|()| w.write_all(body.as_bytes()))
            .map_err(|e| DiffError::render(FORMAT, e))?;
    }
    Ok(())
}

/// Convert blank-line separated CSV blocks into Markdown tables
pub fn csv_to_markdown(data: &str) -> Result<Vec<String>> {
    let mut blocks: Vec<String> = Vec::new();
    let mut current = String::new();
    for line in data.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
            continue;
        }
        current.push_str(line);
        current.push('\n');
    }
    if !current.is_empty() {
        blocks.push(current);
    }

    blocks
        .iter()
        .map(|block| {
            let records = refloat_csv(block)?;
            Ok(markdown_table(&records))
        })
        .collect()
}

/// Parse a CSV block, rewriting every cell that parses as a float in its shortest decimal form
pub fn refloat_csv(block: &str) -> Result<Vec<Vec<String>>> {
    let mut reader = ::csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(block.as_bytes());

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| DiffError::render(FORMAT, e))?;
        records.push(
            record
                .iter()
                .map(|cell| match cell.parse::<f64>() {
                    Ok(value) if value.is_finite() => value.to_string(),
                    _ => cell.to_string(),
                })
                .collect(),
        );
    }
    Ok(records)
}

/// Render records as a padded Markdown table, the first record being the header
fn markdown_table(records: &[Vec<String>]) -> String {
    let columns = records.iter().map(Vec::len).max().unwrap_or(0);
    let mut widths = vec![3; columns];
    for record in records {
        for (width, cell) in widths.iter_mut().zip(record) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: &mut dyn Iterator<Item = String>| -> String {
        let padded: Vec<String> = cells.collect();
        format!("| {} |\n", padded.join(" | "))
    };

    let mut out = String::new();
    for (i, record) in records.iter().enumerate() {
        let mut cells = widths.iter().enumerate().map(|(col, width)| {
            let cell = record.get(col).map_or("", String::as_str);
            format!("{cell:<width$}")
        });
        out.push_str(&line(&mut cells));
        if i == 0 {
            let mut rule = widths.iter().map(|width| "-".repeat(*width));
            out.push_str(&line(&mut rule));
        }
    }
    out
}
