use std::io::{self, Write};

use crate::benchstat::{ComparisonTable, Row};

/// Write tables as CSV, one block per table separated by a blank line.
///
/// Means are written unscaled in the table's unit. A one-field record
/// carrying the group label precedes the rows of each non-empty group.
pub fn write_csv(w: &mut dyn Write, tables: &[ComparisonTable], no_range: bool) -> io::Result<()> {
    for (i, table) in tables.iter().enumerate() {
        if i > 0 {
            w.write_all(b"\n")?;
        }
        let mut writer = ::csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(&mut *w);

        writer.write_record(header(table, no_range))?;
        let mut group = "";
        for row in &table.rows {
            if row.group != group {
                group = &row.group;
                if !group.is_empty() {
                    writer.write_record([group])?;
                }
            }
            writer.write_record(record(row, no_range))?;
        }
        writer.flush()?;
    }
    Ok(())
}

fn header(table: &ComparisonTable, no_range: bool) -> Vec<String> {
    let old = format!("old {} ({})", table.metric, table.unit);
    let new = format!("new {} ({})", table.metric, table.unit);
    let mut fields = vec!["name".to_string(), old];
    if !no_range {
        fields.push("±".to_string());
    }
    fields.push(new);
    if !no_range {
        fields.push("±".to_string());
    }
    fields.push("delta".to_string());
    fields.push("note".to_string());
    fields
}

fn record(row: &Row, no_range: bool) -> Vec<String> {
    let mean = |summary: Option<&crate::benchstat::stats::Summary>| {
        summary.map_or_else(String::new, |s| format!("{:.6}", s.mean))
    };
    let mut fields = vec![row.benchmark.clone(), mean(row.old.as_ref())];
    if !no_range {
        fields.push(row.range(row.old.as_ref()));
    }
    fields.push(mean(row.new.as_ref()));
    if !no_range {
        fields.push(row.range(row.new.as_ref()));
    }
    fields.push(row.delta.clone());
    fields.push(row.note.clone());
    fields
}
