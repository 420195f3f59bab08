use serde::Serialize;
use std::io::Write;

use crate::benchstat::{Change, ComparisonTable};
use crate::error::{DiffError, Result};
use crate::report::TableFormatter;

/// Outcome of one benchmark comparison
#[derive(Debug, Clone)]
pub struct RunResult {
    bench_cmd: String,
    head_sha: String,
    base_sha: String,
    tables: Vec<ComparisonTable>,
}

/// Wrapping around the rendered tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Envelope {
    /// Labeled sections for a terminal
    #[default]
    Human,
    /// One pretty-printed JSON document
    Json,
}

/// How [`RunResult::write_output`] renders a result
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputOptions {
    pub formatter: TableFormatter,
    pub envelope: Envelope,
    /// Degradation threshold in percent reported in the JSON envelope
    pub tolerance: f64,
}

#[derive(Serialize)]
struct JsonResult<'a> {
    #[serde(skip_serializing_if = "is_empty")]
    bench_command: &'a str,
    #[serde(skip_serializing_if = "is_empty")]
    head_sha: &'a str,
    #[serde(skip_serializing_if = "is_empty")]
    base_sha: &'a str,
    degraded_result: bool,
    #[serde(skip_serializing_if = "is_empty")]
    benchstat_output: &'a str,
}

fn is_empty(s: &&str) -> bool {
    s.is_empty()
}

impl RunResult {
    pub fn new(
        bench_cmd: impl Into<String>,
        head_sha: impl Into<String>,
        base_sha: impl Into<String>,
        tables: Vec<ComparisonTable>,
    ) -> Self {
        Self {
            bench_cmd: bench_cmd.into(),
            head_sha: head_sha.into(),
            base_sha: base_sha.into(),
            tables,
        }
    }

    pub fn bench_cmd(&self) -> &str {
        &self.bench_cmd
    }

    pub fn head_sha(&self) -> &str {
        &self.head_sha
    }

    pub fn base_sha(&self) -> &str {
        &self.base_sha
    }

    pub fn tables(&self) -> &[ComparisonTable] {
        &self.tables
    }

    /// Whether any degrading row changed by more than `tolerance` percent
    pub fn has_degraded_result(&self, tolerance: f64) -> bool {
        self.max_degraded_pct() > tolerance
    }

    /// Largest percent change among degrading rows, 0 when there are none
    pub fn max_degraded_pct(&self) -> f64 {
        self.tables
            .iter()
            .flat_map(|table| &table.rows)
            .filter(|row| row.change == Change::Degrading)
            .map(|row| row.pct_delta.abs())
            .fold(0.0, f64::max)
    }

    /// Render the tables and write them inside the chosen envelope
    pub fn write_output(&self, w: &mut dyn Write, opts: &OutputOptions) -> Result<()> {
        let tables = opts.formatter.render(&self.tables)?;

        match opts.envelope {
            Envelope::Human => write!(
                w,
                "bench command:\n  {}\nHEAD sha:\n  {}\nbase sha:\n  {}\nbenchstat output:\n\n{}\n",
                self.bench_cmd, self.head_sha, self.base_sha, tables
            )
            .map_err(|e| DiffError::render("human", e)),
            Envelope::Json => {
                let record = JsonResult {
                    bench_command: &self.bench_cmd,
                    head_sha: &self.head_sha,
                    base_sha: &self.base_sha,
                    degraded_result: self.has_degraded_result(opts.tolerance),
                    benchstat_output: &tables,
                };
                serde_json::to_writer_pretty(&mut *w, &record)
                    .map_err(|e| DiffError::render("json", e))?;
                writeln!(w).map_err(|e| DiffError::render("json", e))
            }
        }
    }
}
