use std::io::{self, Write};

use crate::benchstat::{ComparisonTable, Row};

/// Write tables as aligned plain text columns.
///
/// Each group starts with its label line and a header; tables and groups
/// are separated by a blank line.
pub fn write_text(w: &mut dyn Write, tables: &[ComparisonTable], no_range: bool) -> io::Result<()> {
    let mut out = String::new();

    for (i, table) in tables.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let header = [
            "name".to_string(),
            format!("old {}", table.metric),
            format!("new {}", table.metric),
            "delta".to_string(),
        ];
        let cells: Vec<[String; 5]> = table
            .rows
            .iter()
            .map(|row| row_cells(row, no_range))
            .collect();

        let mut widths = header.clone().map(|h| h.chars().count());
        for row in &cells {
            for (width, cell) in widths.iter_mut().zip(row.iter()) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let mut group: Option<&str> = None;
        for (row, cells) in table.rows.iter().zip(&cells) {
            if group != Some(row.group.as_str()) {
                if group.is_some() {
                    out.push('\n');
                }
                group = Some(row.group.as_str());
                if !row.group.is_empty() {
                    out.push_str(&row.group);
                    out.push('\n');
                }
                push_line(&mut out, &widths, &header, "");
            }
            push_line(&mut out, &widths, &cells[..4], &cells[4]);
        }
    }

    writeln!(w, "{}", out.trim_end())
}

fn row_cells(row: &Row, no_range: bool) -> [String; 5] {
    [
        row.benchmark.clone(),
        row.old_cell(no_range),
        row.new_cell(no_range),
        row.delta.clone(),
        row.note.clone(),
    ]
}

fn push_line(out: &mut String, widths: &[usize; 4], cells: &[String], note: &str) {
    let line = format!(
        "{:<w0$}  {:<w1$}  {:<w2$}  {:>w3$}  {}",
        cells[0],
        cells[1],
        cells[2],
        cells[3],
        note,
        w0 = widths[0],
        w1 = widths[1],
        w2 = widths[2],
        w3 = widths[3],
    );
    out.push_str(line.trim_end());
    out.push('\n');
}
