use anyhow::{Context, Result};
use clap::Args;
use log::debug;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use crate::benchmarks::{BenchInvocation, Benchdiff, Envelope, OutputOptions, RestorePolicy};
use crate::benchstat::{Benchstat, BenchstatConfig, DeltaTest, SortOrder};
use crate::config::merge::Merge;
use crate::config::traits::{Configuration, PathConfiguration};
use crate::path_utils;
use crate::report::{TableFormat, TableFormatter};

/// Config file picked up from the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "benchdiff.yml";

/// Default benchmark argument template
pub const DEFAULT_BENCH_ARGS: &str =
    "test -bench {bench} -run ^$ -benchtime {benchtime} -benchmem -count {count} {packages}";

/// Everything needed for one benchmark comparison
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiffConfig {
    /// Repository to benchmark
    pub repo: PathBuf,
    /// Reference to compare the worktree against
    pub base_ref: String,
    /// Pause after checking out the base reference
    #[serde(deserialize_with = "duration")]
    pub cooldown: Duration,
    /// Directory for benchmark output and cached baselines
    pub cache_dir: PathBuf,
    /// Run the baseline even when a cached result exists
    pub force_base: bool,
    pub git_cmd: String,
    pub json_output: bool,
    /// Exit code when the result is degraded
    pub on_degrade: u8,
    /// Percent change a degrading row may have before it counts as degraded
    pub tolerance: f64,
    pub bench: String,
    pub benchtime: String,
    pub count: u32,
    pub packages: String,
    pub bench_cmd: String,
    /// Argument template with `{bench}`, `{benchtime}`, `{count}` and `{packages}` placeholders
    pub bench_args: String,
    /// Deadline for each benchmark process
    #[serde(deserialize_with = "optional_duration")]
    pub timeout: Option<Duration>,
    pub restore_policy: RestorePolicy,
    pub benchstat: BenchstatOptions,
    /// Path to the config file (set during loading)
    #[serde(skip)]
    pub path: Option<PathBuf>,
}

/// Comparison and table output settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BenchstatOptions {
    pub alpha: f64,
    pub delta_test: DeltaTest,
    pub geomean: bool,
    pub norange: bool,
    pub sort: SortOrder,
    pub reverse_sort: bool,
    /// Comma separated labels to group rows by
    pub split: String,
    pub format: TableFormat,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            repo: PathBuf::from("."),
            base_ref: "HEAD".to_string(),
            cooldown: Duration::from_millis(100),
            cache_dir: PathBuf::from("./tmp"),
            force_base: false,
            git_cmd: "git".to_string(),
            json_output: false,
            on_degrade: 0,
            tolerance: 10.0,
            bench: ".".to_string(),
            benchtime: "1s".to_string(),
            count: 10,
            packages: "./...".to_string(),
            bench_cmd: "go".to_string(),
            bench_args: DEFAULT_BENCH_ARGS.to_string(),
            timeout: None,
            restore_policy: RestorePolicy::Discard,
            benchstat: BenchstatOptions::default(),
            path: None,
        }
    }
}

impl Default for BenchstatOptions {
    fn default() -> Self {
        Self {
            alpha: 0.05,
            delta_test: DeltaTest::UTest,
            geomean: false,
            norange: false,
            sort: SortOrder::None,
            reverse_sort: false,
            split: "pkg,goos,goarch".to_string(),
            format: TableFormat::Text,
        }
    }
}

fn duration<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Duration, D::Error> {
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(&s).map_err(serde::de::Error::custom)
}

fn optional_duration<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<Duration>, D::Error> {
    match Option::<String>::deserialize(deserializer)? {
        Some(s) => humantime::parse_duration(&s)
            .map(Some)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

impl BenchstatOptions {
    /// Label keys from `split`, empty entries dropped
    pub fn split_keys(&self) -> Vec<String> {
        self.split
            .split(',')
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn comparator_config(&self) -> BenchstatConfig {
        BenchstatConfig {
            delta_test: self.delta_test,
            alpha: self.alpha,
            geomean: self.geomean,
            split_by: self.split_keys(),
            order: self.sort,
            reverse: self.reverse_sort,
        }
    }

    pub fn formatter(&self) -> TableFormatter {
        TableFormatter::new(self.format, self.norange)
    }
}

impl DiffConfig {
    /// The benchmark command with the argument template filled in
    pub fn invocation(&self) -> BenchInvocation {
        let params: HashMap<String, String> = [
            ("bench", self.bench.clone()),
            ("benchtime", self.benchtime.clone()),
            ("count", self.count.to_string()),
            ("packages", self.packages.clone()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        BenchInvocation::from_template(&self.bench_cmd, &self.bench_args, &params)
    }

    pub fn output_options(&self) -> OutputOptions {
        OutputOptions {
            formatter: self.benchstat.formatter(),
            envelope: if self.json_output {
                Envelope::Json
            } else {
                Envelope::Human
            },
            tolerance: self.tolerance,
        }
    }

    /// Set up the orchestrator described by this configuration.
    ///
    /// The run stops at the next phase boundary once `interrupted` is set.
    pub fn benchdiff(&self, interrupted: Arc<AtomicBool>) -> crate::error::Result<Benchdiff> {
        Benchdiff::builder(self.invocation(), &self.repo)
            .results_dir(&self.cache_dir)
            .base_ref(&self.base_ref)
            .git_cmd(&self.git_cmd)
            .comparator(Benchstat::new(self.benchstat.comparator_config()))
            .force(self.force_base)
            .cooldown(self.cooldown)
            .timeout(self.timeout)
            .restore_policy(self.restore_policy)
            .interrupt_flag(interrupted)
            .build()
    }
}

impl Configuration for DiffConfig {
    fn config_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn config_type(&self) -> &str {
        "benchdiff"
    }

    fn validate(&self) -> Result<()> {
        let alpha = self.benchstat.alpha;
        if !(alpha > 0.0 && alpha < 1.0) {
            anyhow::bail!("alpha must be between 0 and 1, got {alpha}");
        }
        if self.count == 0 {
            anyhow::bail!("count must be greater than 0");
        }
        if !self.tolerance.is_finite() {
            anyhow::bail!("tolerance must be a finite number, got {}", self.tolerance);
        }
        if self.bench_cmd.trim().is_empty() {
            anyhow::bail!("bench_cmd must not be empty");
        }
        if self.git_cmd.trim().is_empty() {
            anyhow::bail!("git_cmd must not be empty");
        }
        if self.base_ref.trim().is_empty() {
            anyhow::bail!("base_ref must not be empty");
        }
        for key in self.benchstat.split_keys() {
            if key.contains(|c: char| c.is_whitespace() || c == ':') {
                anyhow::bail!("Invalid split key: {key:?}");
            }
        }
        Ok(())
    }
}

impl PathConfiguration for DiffConfig {
    fn with_expanded_paths(&self, base_dir: &Path) -> Self {
        let mut config = self.clone();
        config.repo = path_utils::resolve_path(&self.repo, base_dir);
        config.cache_dir = path_utils::resolve_path(&self.cache_dir, base_dir);
        config
    }
}

/// Values given on the command line, each replacing the config file's value when set
#[derive(Debug, Clone, Default, Args)]
pub struct ConfigOverrides {
    /// Repository to benchmark
    #[arg(long)]
    pub repo: Option<PathBuf>,

    /// The git ref to be used as a baseline
    #[arg(long)]
    pub base_ref: Option<String>,

    /// Pause before running benchmarks on the base ref, e.g. 100ms or 2s
    #[arg(long, value_parser = humantime::parse_duration)]
    pub cooldown: Option<Duration>,

    /// Directory for benchmark output and cached baselines
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Run the base benchmark even if a cached result exists
    #[arg(long)]
    pub force_base: bool,

    /// The executable to use for git commands
    #[arg(long)]
    pub git_cmd: Option<String>,

    /// Format output as JSON
    #[arg(long)]
    pub json: bool,

    /// Exit code when there is a degradation in the results
    #[arg(long)]
    pub on_degrade: Option<u8>,

    /// Percent change before a degraded result is considered a degradation
    #[arg(long)]
    pub tolerance: Option<f64>,

    /// Run only those benchmarks matching a regular expression
    #[arg(long)]
    pub bench: Option<String>,

    /// Run enough iterations of each benchmark to take this long
    #[arg(long)]
    pub benchtime: Option<String>,

    /// Run each benchmark this many times
    #[arg(long)]
    pub count: Option<u32>,

    /// Packages to benchmark
    #[arg(long)]
    pub packages: Option<String>,

    /// The benchmark executable
    #[arg(long)]
    pub bench_cmd: Option<String>,

    /// Benchmark argument template
    #[arg(long)]
    pub bench_args: Option<String>,

    /// Kill a benchmark process that runs longer than this
    #[arg(long, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,

    /// What to do with a finished comparison when restoring the worktree fails
    #[arg(long, value_enum)]
    pub restore_policy: Option<RestorePolicy>,

    /// Consider changes significant if p <= alpha
    #[arg(long)]
    pub alpha: Option<f64>,

    /// Significance test to apply to deltas
    #[arg(long, value_enum)]
    pub delta_test: Option<DeltaTest>,

    /// Print the geometric mean of each file
    #[arg(long)]
    pub geomean: bool,

    /// Do not print range columns
    #[arg(long)]
    pub norange: bool,

    /// Sort rows within each group
    #[arg(long, value_enum)]
    pub sort: Option<SortOrder>,

    /// Reverse the sort order
    #[arg(long)]
    pub reverse_sort: bool,

    /// Comma separated labels to split results by
    #[arg(long)]
    pub split: Option<String>,

    /// Table format
    #[arg(long, value_enum)]
    pub format: Option<TableFormat>,
}

impl Merge<ConfigOverrides> for DiffConfig {
    fn merge(&self, other: &ConfigOverrides) -> Self {
        let mut config = self.clone();

        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(value) = value {
                *target = value.clone();
            }
        }

        set(&mut config.repo, &other.repo);
        set(&mut config.base_ref, &other.base_ref);
        set(&mut config.cooldown, &other.cooldown);
        set(&mut config.cache_dir, &other.cache_dir);
        set(&mut config.git_cmd, &other.git_cmd);
        set(&mut config.on_degrade, &other.on_degrade);
        set(&mut config.tolerance, &other.tolerance);
        set(&mut config.bench, &other.bench);
        set(&mut config.benchtime, &other.benchtime);
        set(&mut config.count, &other.count);
        set(&mut config.packages, &other.packages);
        set(&mut config.bench_cmd, &other.bench_cmd);
        set(&mut config.bench_args, &other.bench_args);
        set(&mut config.restore_policy, &other.restore_policy);
        if other.timeout.is_some() {
            config.timeout = other.timeout;
        }

        let stat = &mut config.benchstat;
        set(&mut stat.alpha, &other.alpha);
        set(&mut stat.delta_test, &other.delta_test);
        set(&mut stat.sort, &other.sort);
        set(&mut stat.split, &other.split);
        set(&mut stat.format, &other.format);

        // flags can only switch a setting on
        config.force_base |= other.force_base;
        config.json_output |= other.json;
        stat.geomean |= other.geomean;
        stat.norange |= other.norange;
        stat.reverse_sort |= other.reverse_sort;

        config
    }
}

/// Load the configuration file, apply command line overrides and validate the result.
///
/// Without an explicit path, `benchdiff.yml` in the working directory is used
/// when it exists; otherwise the defaults apply. Relative paths in a config
/// file are resolved against the file's directory, relative paths from the
/// command line against the working directory.
pub fn load_config(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<DiffConfig> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;

    let file = match path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file not found: {:?}", path);
            }
            Some(path.to_path_buf())
        }
        None => Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.exists()),
    };

    let config = match &file {
        Some(file) => {
            let contents = std::fs::read_to_string(file)
                .with_context(|| format!("Failed to read config file: {:?}", file))?;
            let mut config: DiffConfig = serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML from file: {:?}", file))?;
            config.path = Some(file.clone());

            let config_dir = match file.parent() {
                Some(dir) if !dir.as_os_str().is_empty() => cwd.join(dir),
                _ => cwd.clone(),
            };
            config.with_expanded_paths(&config_dir)
        }
        None => DiffConfig::default(),
    };

    let config = config.merge(overrides).with_expanded_paths(&cwd);
    config.validate()?;

    debug!("Using {} configuration\n{:?}", config.config_type(), config);
    Ok(config)
}
