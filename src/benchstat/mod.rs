//! Statistical comparison of two Go benchmark output files.
//!
//! [`Benchstat`] parses both inputs, summarizes every benchmark per metric
//! and tests the difference for significance. The resulting
//! [`ComparisonTable`]s are rendered by the writers in [`text`], [`csv`]
//! and [`html`].

pub mod csv;
pub mod html;
mod parse;
mod scaler;
pub mod stats;
mod table;
pub mod text;

use clap::ValueEnum;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;

pub use parse::{parse_file, parse_str, BenchResult, Measurement};
pub use scaler::Scaler;
pub use table::{build_tables, metric_name, Change, ComparisonTable, Row, GEOMEAN_ROW};

/// Significance test used to decide whether a delta is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaTest {
    /// Mann-Whitney U-test
    #[default]
    #[value(name = "utest")]
    UTest,
    /// Welch's t-test
    #[value(name = "ttest")]
    TTest,
    /// Report every delta
    None,
}

/// Row order within each group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Input order
    #[default]
    None,
    Name,
    Delta,
}

/// Comparison settings
#[derive(Debug, Clone, PartialEq)]
pub struct BenchstatConfig {
    pub delta_test: DeltaTest,
    /// Largest p-value still considered significant
    pub alpha: f64,
    /// Append a `[Geo mean]` row to every group
    pub geomean: bool,
    /// Labels that partition rows into groups
    pub split_by: Vec<String>,
    pub order: SortOrder,
    /// Reverse the sort order; has no effect with [`SortOrder::None`]
    pub reverse: bool,
}

impl Default for BenchstatConfig {
    fn default() -> Self {
        Self {
            delta_test: DeltaTest::UTest,
            alpha: 0.05,
            geomean: false,
            split_by: Vec::new(),
            order: SortOrder::None,
            reverse: false,
        }
    }
}

/// Produces comparison tables from a baseline and a head benchmark output file
pub trait StatisticsComparator {
    fn compare(&self, base: &Path, head: &Path) -> Result<Vec<ComparisonTable>>;
}

/// Built-in comparator for Go benchmark output
#[derive(Debug, Clone, Default)]
pub struct Benchstat {
    config: BenchstatConfig,
}

impl Benchstat {
    pub fn new(config: BenchstatConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BenchstatConfig {
        &self.config
    }
}

impl StatisticsComparator for Benchstat {
    fn compare(&self, base: &Path, head: &Path) -> Result<Vec<ComparisonTable>> {
        info!(
            "Comparing {} against {}",
            head.display(),
            base.display()
        );
        let old = parse_file(base)?;
        let new = parse_file(head)?;
        debug!(
            "Parsed {} baseline and {} worktree results",
            old.len(),
            new.len()
        );
        Ok(build_tables(&old, &new, &self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_compare_files() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("base.out");
        let head = dir.path().join("head.out");
        fs::write(&base, "BenchmarkA 1 100 ns/op\nBenchmarkA 1 101 ns/op\n").unwrap();
        fs::write(&head, "BenchmarkA 1 100 ns/op\nBenchmarkA 1 99 ns/op\n").unwrap();

        let tables = Benchstat::default().compare(&base, &head).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].metric, "time/op");
        assert_eq!(tables[0].rows[0].benchmark, "A");
    }

    #[test]
    fn test_compare_missing_file() {
        let dir = tempdir().unwrap();
        let head = dir.path().join("head.out");
        fs::write(&head, "BenchmarkA 1 100 ns/op\n").unwrap();

        let err = Benchstat::default()
            .compare(&dir.path().join("missing.out"), &head)
            .unwrap_err();
        assert!(matches!(err, crate::error::DiffError::ComparatorFailed { .. }));
    }

    #[test]
    fn test_value_enum_names() {
        assert_eq!(DeltaTest::from_str("utest", false).unwrap(), DeltaTest::UTest);
        assert_eq!(DeltaTest::from_str("ttest", false).unwrap(), DeltaTest::TTest);
        assert_eq!(SortOrder::from_str("delta", false).unwrap(), SortOrder::Delta);
        let parsed: DeltaTest = serde_yaml::from_str("ttest").unwrap();
        assert_eq!(parsed, DeltaTest::TTest);
    }
}
