use std::cmp::Ordering;
use std::collections::HashMap;

use crate::benchstat::parse::BenchResult;
use crate::benchstat::scaler::Scaler;
use crate::benchstat::stats::{self, Summary};
use crate::benchstat::{BenchstatConfig, DeltaTest, SortOrder};

/// Name of the aggregate row appended when geometric means are requested
pub const GEOMEAN_ROW: &str = "[Geo mean]";

/// Statistical outcome of one comparison row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Change {
    Degrading,
    Insignificant,
    Improving,
}

/// One benchmark compared across the two inputs
#[derive(Debug, Clone)]
pub struct Row {
    pub benchmark: String,
    pub group: String,
    pub old: Option<Summary>,
    pub new: Option<Summary>,
    /// Percent change of the mean, 0 when no delta could be computed
    pub pct_delta: f64,
    /// Rendered delta, `~` when not significant
    pub delta: String,
    /// Significance details such as `(p=0.000 n=10+10)`
    pub note: String,
    pub change: Change,
    pub p_value: Option<f64>,
    pub scaler: Scaler,
}

impl Row {
    pub fn is_geomean(&self) -> bool {
        self.benchmark == GEOMEAN_ROW
    }

    /// Scaled baseline mean, followed by its range unless `no_range` is set
    pub fn old_cell(&self, no_range: bool) -> String {
        self.cell(self.old.as_ref(), no_range)
    }

    /// Scaled worktree mean, followed by its range unless `no_range` is set
    pub fn new_cell(&self, no_range: bool) -> String {
        self.cell(self.new.as_ref(), no_range)
    }

    /// Range of a summary as a percentage such as `13%`, empty when not meaningful
    pub fn range(&self, summary: Option<&Summary>) -> String {
        match summary {
            Some(s) if !self.is_geomean() && s.spread().is_finite() => {
                format!("{:.0}%", s.spread() * 100.0)
            }
            _ => String::new(),
        }
    }

    fn cell(&self, summary: Option<&Summary>, no_range: bool) -> String {
        let Some(s) = summary else {
            return String::new();
        };
        let mean = self.scaler.format(s.mean);
        let range = self.range(summary);
        if no_range || range.is_empty() {
            return mean;
        }
        format!("{mean} ±{range:>3}")
    }
}

/// Comparison of every benchmark for a single metric
#[derive(Debug, Clone)]
pub struct ComparisonTable {
    /// Metric name, e.g. `time/op`
    pub metric: String,
    /// Unit the values are stored in, e.g. `ns/op`
    pub unit: String,
    /// Group labels in first-seen order
    pub groups: Vec<String>,
    pub rows: Vec<Row>,
}

impl ComparisonTable {
    /// Split into one table per group, each holding only that group's rows.
    ///
    /// Rows in the returned tables have their group cleared; the table's
    /// single entry in `groups` carries the label.
    pub fn split_by_group(&self) -> Vec<ComparisonTable> {
        let mut tables: Vec<ComparisonTable> = self
            .groups
            .iter()
            .map(|group| ComparisonTable {
                metric: self.metric.clone(),
                unit: self.unit.clone(),
                groups: vec![group.clone()],
                rows: Vec::new(),
            })
            .collect();
        let lookup: HashMap<&str, usize> = self
            .groups
            .iter()
            .enumerate()
            .map(|(i, g)| (g.as_str(), i))
            .collect();

        for row in &self.rows {
            if let Some(&i) = lookup.get(row.group.as_str()) {
                let mut row = row.clone();
                row.group.clear();
                tables[i].rows.push(row);
            }
        }
        tables
    }
}

/// Human name for the metric measured in `unit`
pub fn metric_name(unit: &str) -> String {
    match unit {
        "ns/op" => "time/op".to_string(),
        "B/op" => "alloc/op".to_string(),
        "MB/s" => "speed".to_string(),
        other => other.to_string(),
    }
}

fn larger_is_better(unit: &str) -> bool {
    unit.ends_with("/s")
}

fn group_label(result: &BenchResult, split_by: &[String]) -> String {
    split_by
        .iter()
        .filter_map(|key| result.label(key).map(|value| format!("{key}:{value}")))
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Default)]
struct Samples {
    old: Vec<f64>,
    new: Vec<f64>,
}

/// Keys of one metric's rows in first-seen order
#[derive(Default)]
struct MetricRows {
    keys: Vec<(String, String)>,
    samples: HashMap<(String, String), Samples>,
}

/// Compare two parsed benchmark outputs
pub fn build_tables(
    old: &[BenchResult],
    new: &[BenchResult],
    config: &BenchstatConfig,
) -> Vec<ComparisonTable> {
    let mut units: Vec<String> = Vec::new();
    let mut by_unit: HashMap<String, MetricRows> = HashMap::new();

    for (results, is_old) in [(old, true), (new, false)] {
        for result in results {
            let group = group_label(result, &config.split_by);
            for m in &result.measurements {
                if !by_unit.contains_key(&m.unit) {
                    units.push(m.unit.clone());
                }
                let rows = by_unit.entry(m.unit.clone()).or_default();
                let key = (group.clone(), result.name.clone());
                let samples = rows.samples.entry(key.clone()).or_insert_with(|| {
                    rows.keys.push(key);
                    Samples::default()
                });
                if is_old {
                    samples.old.push(m.value);
                } else {
                    samples.new.push(m.value);
                }
            }
        }
    }

    units
        .into_iter()
        .filter_map(|unit| {
            let mut rows = by_unit.remove(&unit)?;
            Some(build_table(&unit, &mut rows, config))
        })
        .collect()
}

fn build_table(
    unit: &str,
    metric_rows: &mut MetricRows,
    config: &BenchstatConfig,
) -> ComparisonTable {
    let mut groups: Vec<String> = Vec::new();
    let mut grouped: HashMap<String, Vec<Row>> = HashMap::new();

    for key in &metric_rows.keys {
        let Some(samples) = metric_rows.samples.remove(key) else {
            continue;
        };
        let (group, name) = key.clone();
        let row = compare_row(name, group.clone(), samples, unit, config);
        if !grouped.contains_key(&group) {
            groups.push(group.clone());
        }
        grouped.entry(group).or_default().push(row);
    }

    let mut rows = Vec::new();
    for group in &groups {
        let Some(mut group_rows) = grouped.remove(group) else {
            continue;
        };
        sort_rows(&mut group_rows, unit, config);
        if config.geomean {
            if let Some(row) = geomean_row(group, &group_rows, unit) {
                group_rows.push(row);
            }
        }
        rows.extend(group_rows);
    }

    ComparisonTable {
        metric: metric_name(unit),
        unit: unit.to_string(),
        groups,
        rows,
    }
}

fn compare_row(
    benchmark: String,
    group: String,
    samples: Samples,
    unit: &str,
    config: &BenchstatConfig,
) -> Row {
    let old = Summary::new(samples.old);
    let new = Summary::new(samples.new);
    let reference = old.as_ref().or(new.as_ref()).map_or(0.0, |s| s.mean);

    let mut row = Row {
        benchmark,
        group,
        old,
        new,
        pct_delta: 0.0,
        delta: String::new(),
        note: String::new(),
        change: Change::Insignificant,
        p_value: None,
        scaler: Scaler::new(reference, unit),
    };

    let (Some(old), Some(new)) = (&row.old, &row.new) else {
        return row;
    };
    let counts = format!("n={}+{}", old.n(), new.n());

    let p_value = match config.delta_test {
        DeltaTest::UTest => stats::u_test(&old.kept, &new.kept),
        DeltaTest::TTest => stats::t_test(&old.kept, &new.kept),
        DeltaTest::None => {
            row.note = format!("({counts})");
            Ok(-1.0)
        }
    };

    let p = match p_value {
        Ok(p) => p,
        Err(err) => {
            row.delta = "~".to_string();
            row.note = format!("({err})");
            return row;
        }
    };
    if p >= 0.0 {
        row.p_value = Some(p);
        row.note = format!("(p={p:.3} {counts})");
    }

    if p > config.alpha || old.mean == 0.0 {
        row.delta = "~".to_string();
        return row;
    }

    let pct = (new.mean / old.mean - 1.0) * 100.0;
    row.pct_delta = pct;
    row.delta = format!("{pct:+.2}%");
    row.change = classify(pct, larger_is_better(unit));
    row
}

fn classify(pct: f64, larger_is_better: bool) -> Change {
    match pct.partial_cmp(&0.0) {
        Some(Ordering::Greater) if larger_is_better => Change::Improving,
        Some(Ordering::Greater) => Change::Degrading,
        Some(Ordering::Less) if larger_is_better => Change::Degrading,
        Some(Ordering::Less) => Change::Improving,
        _ => Change::Insignificant,
    }
}

fn sort_rows(rows: &mut [Row], unit: &str, config: &BenchstatConfig) {
    let compare: fn(&Row, &Row) -> Ordering = match config.order {
        SortOrder::None => return,
        SortOrder::Name => |a: &Row, b: &Row| a.benchmark.cmp(&b.benchmark),
        SortOrder::Delta => |a: &Row, b: &Row| a.pct_delta.total_cmp(&b.pct_delta),
    };
    // for throughput metrics the best change is the largest, so flip to keep improvements first
    let flip = config.reverse != (config.order == SortOrder::Delta && larger_is_better(unit));
    if flip {
        rows.sort_by(|a, b| compare(b, a));
    } else {
        rows.sort_by(compare);
    }
}

fn geomean_row(group: &str, rows: &[Row], unit: &str) -> Option<Row> {
    let (olds, news): (Vec<f64>, Vec<f64>) = rows
        .iter()
        .filter_map(|row| match (&row.old, &row.new) {
            (Some(old), Some(new)) if old.mean > 0.0 && new.mean > 0.0 => {
                Some((old.mean, new.mean))
            }
            _ => None,
        })
        .unzip();
    let old = stats::geomean(&olds)?;
    let new = stats::geomean(&news)?;
    let pct = (new / old - 1.0) * 100.0;

    Some(Row {
        benchmark: GEOMEAN_ROW.to_string(),
        group: group.to_string(),
        old: Some(Summary::point(old)),
        new: Some(Summary::point(new)),
        pct_delta: pct,
        delta: format!("{pct:+.2}%"),
        note: String::new(),
        change: Change::Insignificant,
        p_value: None,
        scaler: Scaler::new(old, unit),
    })
}
