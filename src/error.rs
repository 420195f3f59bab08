use std::path::PathBuf;

use thiserror::Error;

use crate::benchmarks::RunResult;
use crate::command::CommandError;

/// Errors produced while diffing benchmarks
#[derive(Debug, Error)]
pub enum DiffError {
    /// The reference could not be resolved to a commit
    #[error("reference not found: {reference}")]
    ReferenceNotFound { reference: String },

    /// A git subprocess failed
    #[error("git {operation} failed: {source}")]
    VcsCommandFailed {
        operation: &'static str,
        #[source]
        source: CommandError,
    },

    /// Checkout refused because local changes would be overwritten
    #[error("checkout of {reference} blocked by local changes: {stderr}")]
    DirtyCheckoutBlocked { reference: String, stderr: String },

    /// Stashed changes could not be re-applied
    #[error("could not re-apply stash {stash}: {stderr}")]
    StashApplyConflict { stash: String, stderr: String },

    /// The working directory was left switched or without its local changes
    #[error("{}", restore_message(.detail, .stash.as_deref()))]
    RestoreFailed {
        detail: String,
        stash: Option<String>,
        #[source]
        source: Box<DiffError>,
        /// Result computed before the failure, kept when the restore policy asks for it
        salvaged: Option<Box<RunResult>>,
    },

    /// The benchmark command exited non-zero or its output could not be captured
    #[error("benchmark failed in {phase}: {source}")]
    BenchmarkSubprocessFailed {
        phase: &'static str,
        #[source]
        source: CommandError,
    },

    /// Benchmark output could not be read or compared
    #[error("comparing {}: {message}", .path.display())]
    ComparatorFailed { path: PathBuf, message: String },

    /// The report could not be produced
    #[error("rendering {format} output: {message}")]
    RenderFailed { format: String, message: String },

    /// The run was stopped by an interrupt between phases
    #[error("interrupted during {phase}")]
    Interrupted { phase: &'static str },

    /// Filesystem failure in the results directory
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

fn restore_message(detail: &str, stash: Option<&str>) -> String {
    match stash {
        Some(stash) => format!(
            "failed to restore working directory ({detail}); local changes are saved in stash {stash}, recover them with `git stash apply {stash}`"
        ),
        None => format!("failed to restore working directory ({detail})"),
    }
}

impl DiffError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        DiffError::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn render(format: impl Into<String>, message: impl ToString) -> Self {
        DiffError::RenderFailed {
            format: format.into(),
            message: message.to_string(),
        }
    }

    /// Whether the working directory may have been left in an inconsistent state
    pub fn is_restore_failure(&self) -> bool {
        matches!(self, DiffError::RestoreFailed { .. })
    }

    /// Take the result computed before a restore failure, if one was kept
    pub fn take_salvaged(&mut self) -> Option<RunResult> {
        match self {
            DiffError::RestoreFailed { salvaged, .. } => salvaged.take().map(|r| *r),
            _ => None,
        }
    }
}

pub type Result<T, E = DiffError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restore_message_names_stash() {
        let err = DiffError::RestoreFailed {
            detail: "checkout of main failed".to_string(),
            stash: Some("abc123".to_string()),
            source: Box::new(DiffError::ReferenceNotFound {
                reference: "main".to_string(),
            }),
            salvaged: None,
        };
        let msg = err.to_string();
        assert!(msg.contains("checkout of main failed"));
        assert!(msg.contains("git stash apply abc123"));
        assert!(err.is_restore_failure());
    }

    #[test]
    fn test_take_salvaged_on_other_kinds() {
        let mut err = DiffError::ReferenceNotFound {
            reference: "nope".to_string(),
        };
        assert!(!err.is_restore_failure());
        assert!(err.take_salvaged().is_none());
    }
}
