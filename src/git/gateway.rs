use log::debug;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::command::{CommandError, CommandExecutor};
use crate::error::{DiffError, Result};

/// Stderr fragment git prints when a checkout would clobber local changes
const DIRTY_CHECKOUT_MARKER: &str = "would be overwritten";

/// Commit id of a stash created with `git stash create`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StashHandle(String);

impl StashHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StashHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Runs git commands against a single repository
#[derive(Debug, Clone)]
pub struct GitRunner {
    git_cmd: String,
    repo_path: PathBuf,
    executor: CommandExecutor,
}

impl GitRunner {
    /// Create a runner for the repository at `repo_path` using the `git_cmd` executable
    pub fn new(git_cmd: impl Into<String>, repo_path: impl AsRef<Path>) -> Result<Self> {
        let repo_path = repo_path.as_ref();
        let repo_path = repo_path.canonicalize().map_err(|e| {
            DiffError::io(
                format!("resolving repository path {}", repo_path.display()),
                e,
            )
        })?;
        debug!("Using repository: {}", repo_path.display());

        // stderr is matched against git's untranslated messages
        let executor = CommandExecutor::builder()
            .working_dir(Some(&repo_path))
            .env_var("LC_ALL", "C")
            .build();

        Ok(Self {
            git_cmd: git_cmd.into(),
            repo_path,
            executor,
        })
    }

    /// Absolute path of the repository
    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    fn run(&self, args: &[&str]) -> std::result::Result<String, CommandError> {
        let output = self.executor.execute_command_with_args(&self.git_cmd, args)?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn run_op(&self, operation: &'static str, args: &[&str]) -> Result<String> {
        self.run(args)
            .map_err(|source| DiffError::VcsCommandFailed { operation, source })
    }

    /// Resolve a reference to its full commit id
    pub fn resolve(&self, reference: &str) -> Result<String> {
        let spec = format!("{reference}^{{commit}}");
        match self.run(&["rev-parse", "--verify", "--quiet", &spec]) {
            Ok(sha) if !sha.is_empty() => Ok(sha),
            Ok(_) => Err(DiffError::ReferenceNotFound {
                reference: reference.to_string(),
            }),
            // --quiet suppresses the message for unknown refs; anything on stderr is a real failure
            Err(CommandError::Failed { stderr, .. }) if stderr.is_empty() => {
                Err(DiffError::ReferenceNotFound {
                    reference: reference.to_string(),
                })
            }
            Err(source) => Err(DiffError::VcsCommandFailed {
                operation: "rev-parse",
                source,
            }),
        }
    }

    /// Name of the checked out branch, or the commit id when HEAD is detached
    pub fn current_ref(&self) -> Result<String> {
        let name = self.run_op("rev-parse", &["rev-parse", "--abbrev-ref", "HEAD"])?;
        if name == "HEAD" {
            return self.run_op("rev-parse", &["rev-parse", "HEAD"]);
        }
        Ok(name)
    }

    /// Record uncommitted changes to tracked files without touching the worktree.
    ///
    /// Returns `None` when there is nothing to stash.
    pub fn stash_create(&self) -> Result<Option<StashHandle>> {
        let stash = self.run_op("stash create", &["stash", "create"])?;
        if stash.is_empty() {
            return Ok(None);
        }
        debug!("Created stash {stash}");
        Ok(Some(StashHandle(stash)))
    }

    /// Re-apply a stash created by [`GitRunner::stash_create`]
    pub fn stash_apply(&self, stash: &StashHandle) -> Result<()> {
        match self.run(&["stash", "apply", "--quiet", stash.as_str()]) {
            Ok(_) => Ok(()),
            Err(CommandError::Failed { stderr, .. }) => Err(DiffError::StashApplyConflict {
                stash: stash.to_string(),
                stderr,
            }),
            Err(source) => Err(DiffError::VcsCommandFailed {
                operation: "stash apply",
                source,
            }),
        }
    }

    /// Discard modifications to tracked files
    pub fn reset_hard(&self) -> Result<()> {
        self.run_op("reset", &["reset", "--hard", "--quiet"])?;
        Ok(())
    }

    /// Check out a branch, tag or commit
    pub fn checkout(&self, reference: &str) -> Result<()> {
        match self.run(&["checkout", "--quiet", reference]) {
            Ok(_) => Ok(()),
            Err(CommandError::Failed { stderr, .. }) if stderr.contains(DIRTY_CHECKOUT_MARKER) => {
                Err(DiffError::DirtyCheckoutBlocked {
                    reference: reference.to_string(),
                    stderr,
                })
            }
            Err(source) => Err(DiffError::VcsCommandFailed {
                operation: "checkout",
                source,
            }),
        }
    }
}
