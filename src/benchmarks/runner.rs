use clap::ValueEnum;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::benchmarks::cache::{partial_file, RunCache};
use crate::benchmarks::{BenchInvocation, RunResult};
use crate::benchstat::{Benchstat, StatisticsComparator};
use crate::command::{CommandError, CommandExecutor};
use crate::error::{DiffError, Result};
use crate::git::{GitRunner, RefSwitch, SwitchError};

/// What to do with a finished comparison when the working directory could not be restored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestorePolicy {
    /// Report only the restore failure
    #[default]
    Discard,
    /// Finish the comparison and attach the result to the restore failure
    Keep,
}

/// Runs a benchmark on the worktree and on a base reference and compares the two
pub struct Benchdiff {
    invocation: BenchInvocation,
    cache: RunCache,
    base_ref: String,
    git: GitRunner,
    comparator: Box<dyn StatisticsComparator>,
    force: bool,
    cooldown: Duration,
    timeout: Option<Duration>,
    restore_policy: RestorePolicy,
    interrupted: Option<Arc<AtomicBool>>,
}

/// Builder for [`Benchdiff`]
pub struct BenchdiffBuilder {
    invocation: BenchInvocation,
    repo_path: PathBuf,
    results_dir: PathBuf,
    base_ref: String,
    git_cmd: String,
    comparator: Option<Box<dyn StatisticsComparator>>,
    force: bool,
    cooldown: Duration,
    timeout: Option<Duration>,
    restore_policy: RestorePolicy,
    interrupted: Option<Arc<AtomicBool>>,
}

impl BenchdiffBuilder {
    /// Directory holding worktree and cached baseline output
    pub fn results_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.results_dir = dir.into();
        self
    }

    pub fn base_ref(mut self, base_ref: impl Into<String>) -> Self {
        self.base_ref = base_ref.into();
        self
    }

    pub fn git_cmd(mut self, git_cmd: impl Into<String>) -> Self {
        self.git_cmd = git_cmd.into();
        self
    }

    pub fn comparator(mut self, comparator: impl StatisticsComparator + 'static) -> Self {
        self.comparator = Some(Box::new(comparator));
        self
    }

    /// Run the baseline even when a cached result exists
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Pause after checking out the base reference
    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Deadline for each benchmark process
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn restore_policy(mut self, policy: RestorePolicy) -> Self {
        self.restore_policy = policy;
        self
    }

    /// Flag set by an interrupt handler; checked between phases
    pub fn interrupt_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupted = Some(flag);
        self
    }

    pub fn build(self) -> Result<Benchdiff> {
        let git = GitRunner::new(self.git_cmd, &self.repo_path)?;
        Ok(Benchdiff {
            invocation: self.invocation,
            cache: RunCache::new(self.results_dir),
            base_ref: self.base_ref,
            git,
            comparator: self
                .comparator
                .unwrap_or_else(|| Box::new(Benchstat::default())),
            force: self.force,
            cooldown: self.cooldown,
            timeout: self.timeout,
            restore_policy: self.restore_policy,
            interrupted: self.interrupted,
        })
    }
}

impl Benchdiff {
    /// Start configuring a run of `invocation` in the repository at `repo_path`
    pub fn builder(invocation: BenchInvocation, repo_path: impl Into<PathBuf>) -> BenchdiffBuilder {
        BenchdiffBuilder {
            invocation,
            repo_path: repo_path.into(),
            results_dir: PathBuf::from("tmp"),
            base_ref: "HEAD".to_string(),
            git_cmd: "git".to_string(),
            comparator: None,
            force: false,
            cooldown: Duration::ZERO,
            timeout: None,
            restore_policy: RestorePolicy::default(),
            interrupted: None,
        }
    }

    pub fn cache(&self) -> &RunCache {
        &self.cache
    }

    /// Benchmark the worktree and the base reference, then compare them.
    ///
    /// Both references are resolved before anything is benchmarked. The
    /// baseline output is reused when a file for the same base revision and
    /// invocation exists, unless `force` is set. An interrupt stops the run
    /// at the next phase boundary with [`DiffError::Interrupted`].
    pub fn run(&mut self) -> Result<RunResult> {
        self.cache.ensure_dir()?;
        check_interrupt(&self.interrupted, "setup")?;

        let head_sha = self.git.resolve("HEAD")?;
        let base_sha = self.git.resolve(&self.base_ref)?;
        debug!("HEAD is {head_sha}, {} is {base_sha}", self.base_ref);

        let executor = CommandExecutor::builder()
            .working_dir(Some(self.git.repo_path()))
            .timeout(self.timeout)
            .build();

        let worktree_file = self.cache.worktree_file();
        info!("Running benchmarks on the worktree");
        let worktree = run_to_file(&executor, &self.invocation, &worktree_file);
        check_interrupt(&self.interrupted, "worktree")?;
        worktree.map_err(|source| DiffError::BenchmarkSubprocessFailed {
            phase: "worktree",
            source,
        })?;

        let baseline_file = self.cache.baseline_file(&base_sha, &self.invocation);
        let restore_error = if self.cache.is_reusable(&baseline_file, self.force) {
            info!("Reusing cached baseline {}", baseline_file.display());
            None
        } else {
            if self.force && baseline_file.exists() {
                warn!("Refreshing cached baseline {}", baseline_file.display());
            }
            info!("Running benchmarks on {} ({base_sha})", self.base_ref);
            self.run_baseline(&executor, &base_sha, &baseline_file)?
        };

        let Some(mut restore_error) = restore_error else {
            check_interrupt(&self.interrupted, "baseline")?;
            info!("Comparing {} with the worktree", self.base_ref);
            let tables = self.comparator.compare(&baseline_file, &worktree_file)?;
            return Ok(RunResult::new(
                self.invocation.command_line(),
                head_sha,
                base_sha,
                tables,
            ));
        };

        match self.comparator.compare(&baseline_file, &worktree_file) {
            Ok(tables) => {
                if let DiffError::RestoreFailed { salvaged, .. } = &mut restore_error {
                    let result =
                        RunResult::new(self.invocation.command_line(), head_sha, base_sha, tables);
                    *salvaged = Some(Box::new(result));
                }
            }
            Err(err) => error!("Comparison after a failed restore also failed: {err}"),
        }
        Err(restore_error)
    }

    /// Run the benchmark with the base revision checked out.
    ///
    /// Returns the restore failure when the policy keeps results and the
    /// benchmark itself succeeded; every other failure is returned as `Err`.
    /// An interrupt that arrives before the benchmark starts skips it.
    fn run_baseline(
        &mut self,
        executor: &CommandExecutor,
        base_sha: &str,
        baseline_file: &Path,
    ) -> Result<Option<DiffError>> {
        let partial = partial_file(baseline_file);
        let invocation = &self.invocation;
        let interrupted = &self.interrupted;

        let switched = RefSwitch::new(&mut self.git, base_sha)
            .cooldown(self.cooldown)
            .run(|| {
                check_interrupt(interrupted, "baseline")?;
                run_to_file(executor, invocation, &partial).map_err(|source| {
                    DiffError::BenchmarkSubprocessFailed {
                        phase: "baseline",
                        source,
                    }
                })
            });

        let (benchmark, restore_error) = match switched {
            Ok(benchmark) => (benchmark, None),
            Err(SwitchError::Setup(error)) => {
                discard(&partial);
                return Err(error);
            }
            Err(SwitchError::Restore { outcome, error }) => match outcome {
                Some(Ok(())) if self.restore_policy == RestorePolicy::Keep => (Ok(()), Some(error)),
                _ => {
                    discard(&partial);
                    return Err(error);
                }
            },
        };

        if let Err(err) = benchmark {
            discard(&partial);
            return Err(err);
        }

        fs::rename(&partial, baseline_file).map_err(|e| {
            DiffError::io(format!("storing baseline {}", baseline_file.display()), e)
        })?;
        debug!("Stored baseline {}", baseline_file.display());
        Ok(restore_error)
    }
}

/// Run `invocation` with its stdout written to `output`, truncating any previous content
fn run_to_file(
    executor: &CommandExecutor,
    invocation: &BenchInvocation,
    output: &Path,
) -> std::result::Result<(), CommandError> {
    let file = File::create(output).map_err(|source| CommandError::Io {
        command: format!("creating {}", output.display()),
        source,
    })?;
    executor.execute_to_file(&invocation.program, &invocation.args, file)?;
    Ok(())
}

fn check_interrupt(flag: &Option<Arc<AtomicBool>>, phase: &'static str) -> Result<()> {
    match flag {
        Some(flag) if flag.load(Ordering::SeqCst) => {
            warn!("Stopping after {phase} because of an interrupt");
            Err(DiffError::Interrupted { phase })
        }
        _ => Ok(()),
    }
}

fn discard(partial: &Path) {
    if let Err(e) = fs::remove_file(partial) {
        debug!("Could not remove {}: {e}", partial.display());
    }
}
