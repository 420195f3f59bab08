//! Rendering of comparison tables into the supported output formats.

pub mod markdown;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;

use crate::benchstat::{self, ComparisonTable};
use crate::error::{DiffError, Result};

/// Table output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    #[default]
    Text,
    Csv,
    Html,
    Markdown,
}

impl fmt::Display for TableFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TableFormat::Text => "text",
            TableFormat::Csv => "csv",
            TableFormat::Html => "html",
            TableFormat::Markdown => "markdown",
        };
        f.write_str(name)
    }
}

/// Renders tables in one format
#[derive(Debug, Clone, Copy, Default)]
pub struct TableFormatter {
    pub format: TableFormat,
    /// Leave out the `±` range of each summary
    pub no_range: bool,
}

impl TableFormatter {
    pub fn new(format: TableFormat, no_range: bool) -> Self {
        Self { format, no_range }
    }

    pub fn write(&self, w: &mut dyn Write, tables: &[ComparisonTable]) -> Result<()> {
        let written = match self.format {
            TableFormat::Text => benchstat::text::write_text(w, tables, self.no_range),
            TableFormat::Csv => benchstat::csv::write_csv(w, tables, self.no_range),
            TableFormat::Html => benchstat::html::write_html(w, tables, self.no_range),
            TableFormat::Markdown => return markdown::write_markdown(w, tables, self.no_range),
        };
        written.map_err(|e| DiffError::render(self.format.to_string(), e))
    }

    /// Render tables into a string
    pub fn render(&self, tables: &[ComparisonTable]) -> Result<String> {
        let mut buf = Vec::new();
        self.write(&mut buf, tables)?;
        String::from_utf8(buf).map_err(|e| DiffError::render(self.format.to_string(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchstat::{build_tables, parse_str, BenchstatConfig};
    use std::io;

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn tables() -> Vec<ComparisonTable> {
        let parsed = parse_str("BenchmarkX 1 10 ns/op\nBenchmarkX 1 12 ns/op\n");
        build_tables(&parsed, &parsed, &BenchstatConfig::default())
    }

    #[test]
    fn test_every_format_renders() {
        let tables = tables();
        for format in TableFormat::value_variants() {
            let out = TableFormatter::new(*format, false).render(&tables).unwrap();
            assert!(out.contains('X'), "{format} output: {out}");
        }
    }

    #[test]
    fn test_write_failure_is_render_error() {
        let err = TableFormatter::new(TableFormat::Text, false)
            .write(&mut FailingWriter, &tables())
            .unwrap_err();
        assert!(matches!(err, DiffError::RenderFailed { ref format, .. } if format == "text"));

        let err = TableFormatter::new(TableFormat::Markdown, false)
            .write(&mut FailingWriter, &tables())
            .unwrap_err();
        assert!(matches!(err, DiffError::RenderFailed { ref format, .. } if format == "markdown"));
    }

    #[test]
    fn test_format_from_yaml() {
        let format: TableFormat = serde_yaml::from_str("markdown").unwrap();
        assert_eq!(format, TableFormat::Markdown);
    }
}
