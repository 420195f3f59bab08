use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

use crate::benchmarks::BenchInvocation;
use crate::error::{DiffError, Result};

/// Prefix of every file written to the results directory
pub const TOOL_NAME: &str = "benchdiff";

/// Layout of the results directory and baseline reuse decisions
#[derive(Debug, Clone)]
pub struct RunCache {
    results_dir: PathBuf,
    tool: String,
}

impl RunCache {
    pub fn new(results_dir: impl Into<PathBuf>) -> Self {
        Self {
            results_dir: results_dir.into(),
            tool: TOOL_NAME.to_string(),
        }
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    /// Create the results directory if needed
    pub fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.results_dir).map_err(|e| {
            DiffError::io(
                format!("creating results directory {}", self.results_dir.display()),
                e,
            )
        })
    }

    /// `<dir>/<tool>-worktree.out`, rewritten on every run
    pub fn worktree_file(&self) -> PathBuf {
        self.results_dir.join(format!("{}-worktree.out", self.tool))
    }

    /// `<dir>/<tool>-<revision>-<invocation hash>.out`
    pub fn baseline_file(&self, revision: &str, invocation: &BenchInvocation) -> PathBuf {
        self.results_dir.join(format!(
            "{}-{}-{}.out",
            self.tool,
            revision,
            invocation.cache_key()
        ))
    }

    /// Whether `baseline` can be reused instead of running the benchmark again
    pub fn is_reusable(&self, baseline: &Path, force: bool) -> bool {
        if force {
            debug!("Forced refresh of {}", baseline.display());
            return false;
        }
        baseline.is_file()
    }
}

/// Temporary path a baseline is written to before being moved into place
pub fn partial_file(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}
