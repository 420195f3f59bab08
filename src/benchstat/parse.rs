use std::fs;
use std::path::Path;

use crate::error::{DiffError, Result};

const BENCHMARK_PREFIX: &str = "Benchmark";

/// One value reported by a benchmark line, e.g. `1310000 ns/op`
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub value: f64,
    pub unit: String,
}

/// A single `Benchmark...` result line together with the labels in effect for it
#[derive(Debug, Clone, PartialEq)]
pub struct BenchResult {
    /// Benchmark name without the `Benchmark` prefix
    pub name: String,
    pub labels: Vec<(String, String)>,
    pub iterations: u64,
    pub measurements: Vec<Measurement>,
}

impl BenchResult {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Read and parse a benchmark output file
pub fn parse_file(path: &Path) -> Result<Vec<BenchResult>> {
    let contents = fs::read_to_string(path).map_err(|e| DiffError::ComparatorFailed {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let results = parse_str(&contents);
    if results.is_empty() {
        return Err(DiffError::ComparatorFailed {
            path: path.to_path_buf(),
            message: "no benchmark results found".to_string(),
        });
    }
    Ok(results)
}

/// Parse Go benchmark output. Lines that are neither labels nor results are ignored.
pub fn parse_str(input: &str) -> Vec<BenchResult> {
    let mut labels: Vec<(String, String)> = Vec::new();
    let mut results = Vec::new();

    for line in input.lines() {
        if let Some((key, value)) = parse_label(line) {
            match labels.iter_mut().find(|(k, _)| k == key) {
                Some(entry) => entry.1 = value.to_string(),
                None => labels.push((key.to_string(), value.to_string())),
            }
            continue;
        }
        if let Some(mut result) = parse_result(line) {
            result.labels = labels.clone();
            results.push(result);
        }
    }

    results
}

/// `key: value` where key starts lowercase and has no spaces or upper case letters
fn parse_label(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    let first = key.chars().next()?;
    if !first.is_ascii_lowercase()
        || key
            .chars()
            .any(|c| c.is_whitespace() || c.is_uppercase())
    {
        return None;
    }
    Some((key, value.trim()))
}

fn parse_result(line: &str) -> Option<BenchResult> {
    let mut fields = line.split_whitespace();
    let name = fields.next()?.strip_prefix(BENCHMARK_PREFIX)?;
    // `Benchmarkfoo` is not a benchmark, `Benchmark`, `BenchmarkFoo` and `Benchmark_foo` are
    if name.chars().next().is_some_and(|c| c.is_lowercase()) {
        return None;
    }
    let iterations = fields.next()?.parse::<u64>().ok()?;

    let mut measurements = Vec::new();
    while let (Some(value), Some(unit)) = (fields.next(), fields.next()) {
        let Ok(value) = value.parse::<f64>() else {
            break;
        };
        measurements.push(Measurement {
            value,
            unit: unit.to_string(),
        });
    }
    if measurements.is_empty() {
        return None;
    }

    Some(BenchResult {
        name: name.to_string(),
        labels: Vec::new(),
        iterations,
        measurements,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const OUTPUT: &str = "goos: linux
goarch: amd64
pkg: example.com/ex1
cpu: Intel(R) Xeon(R) CPU
BenchmarkDoNothing-8   	     100	   1310000 ns/op	      32 B/op	       0 allocs/op
BenchmarkDoNothing-8   	     100	   1320000 ns/op	      33 B/op	       0 allocs/op
PASS
ok  	example.com/ex1	0.300s
pkg: example.com/ex2
BenchmarkEncode/small-8	    5000	     250.5 ns/op	 120.00 MB/s
";

    #[test]
    fn test_parse_results_and_labels() {
        let results = parse_str(OUTPUT);
        assert_eq!(results.len(), 3);

        let first = &results[0];
        assert_eq!(first.name, "DoNothing-8");
        assert_eq!(first.iterations, 100);
        assert_eq!(first.label("goos"), Some("linux"));
        assert_eq!(first.label("pkg"), Some("example.com/ex1"));
        assert_eq!(first.label("cpu"), Some("Intel(R) Xeon(R) CPU"));
        assert_eq!(
            first.measurements,
            vec![
                Measurement {
                    value: 1310000.0,
                    unit: "ns/op".to_string()
                },
                Measurement {
                    value: 32.0,
                    unit: "B/op".to_string()
                },
                Measurement {
                    value: 0.0,
                    unit: "allocs/op".to_string()
                },
            ]
        );

        let last = &results[2];
        assert_eq!(last.name, "Encode/small-8");
        assert_eq!(last.label("pkg"), Some("example.com/ex2"));
        assert_eq!(last.label("goos"), Some("linux"));
        assert_eq!(last.measurements[1].unit, "MB/s");
    }

    #[test]
    fn test_ignores_non_benchmark_lines() {
        let input = "Benchmarking is fun\nBenchmarkfoo 10 1 ns/op\nBenchmarkBad notanumber 1 ns/op\nBenchmarkNoValues 10\n--- FAIL: TestX\n";
        assert!(parse_str(input).is_empty());
    }

    #[test]
    fn test_label_rules() {
        assert_eq!(parse_label("goos: darwin"), Some(("goos", "darwin")));
        assert_eq!(parse_label("note: hw: fast"), Some(("note", "hw: fast")));
        assert_eq!(parse_label("Goos: darwin"), None);
        assert_eq!(parse_label("ok x: y"), None);
        assert_eq!(parse_label("no colon here"), None);
    }

    #[test]
    fn test_parse_file_errors() {
        let missing = Path::new("/nonexistent/benchdiff/output.txt");
        assert!(matches!(
            parse_file(missing),
            Err(DiffError::ComparatorFailed { .. })
        ));

        let mut empty = NamedTempFile::new().unwrap();
        writeln!(empty, "PASS").unwrap();
        let err = parse_file(empty.path()).unwrap_err();
        assert!(err.to_string().contains("no benchmark results"));
    }
}
