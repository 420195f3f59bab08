use log::{error, info, warn};
use std::thread;
use std::time::Duration;

use crate::error::DiffError;
use crate::git::{GitRunner, StashHandle};

/// Failure of a [`RefSwitch`]
#[derive(Debug)]
pub enum SwitchError<T> {
    /// Switching failed before the action ran; the working directory is back as it was
    Setup(DiffError),
    /// The working directory could not be restored.
    ///
    /// `outcome` holds the action's return value when the action got to run.
    Restore { outcome: Option<T>, error: DiffError },
}

impl<T> SwitchError<T> {
    /// Drop any action outcome and keep the error
    pub fn into_error(self) -> DiffError {
        match self {
            SwitchError::Setup(error) | SwitchError::Restore { error, .. } => error,
        }
    }
}

/// Runs an action with the repository checked out at another reference.
///
/// Holding the runner mutably keeps any other git work on the same
/// repository out of the switched window.
pub struct RefSwitch<'a> {
    git: &'a mut GitRunner,
    target: String,
    cooldown: Duration,
}

impl<'a> RefSwitch<'a> {
    pub fn new(git: &'a mut GitRunner, target: impl Into<String>) -> Self {
        Self {
            git,
            target: target.into(),
            cooldown: Duration::ZERO,
        }
    }

    /// Pause between checkout and running the action
    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Check out the target, run `action` once, then put the branch and local changes back.
    ///
    /// Restoration happens on every exit path, including a panic in `action`.
    /// If restoring after a panic fails the process is aborted, since the
    /// working directory can no longer be trusted.
    pub fn run<T>(self, action: impl FnOnce() -> T) -> Result<T, SwitchError<T>> {
        let git: &GitRunner = self.git;

        let original_ref = git.current_ref().map_err(SwitchError::Setup)?;
        let stash = git.stash_create().map_err(SwitchError::Setup)?;

        let mut guard = SwitchGuard {
            git,
            original_ref,
            stash,
            checked_out: false,
            armed: true,
        };

        // a failed reset may already have discarded local changes, so both steps restore
        if let Err(err) = git.reset_hard().and_then(|()| git.checkout(&self.target)) {
            return match guard.restore() {
                Ok(()) => Err(SwitchError::Setup(err)),
                Err(error) => Err(SwitchError::Restore {
                    outcome: None,
                    error,
                }),
            };
        }
        guard.checked_out = true;
        info!("Checked out {} (was {})", self.target, guard.original_ref);

        if !self.cooldown.is_zero() {
            thread::sleep(self.cooldown);
        }

        let outcome = action();

        match guard.restore() {
            Ok(()) => Ok(outcome),
            Err(error) => Err(SwitchError::Restore {
                outcome: Some(outcome),
                error,
            }),
        }
    }
}

/// Puts the original ref and stashed changes back, in that order
struct SwitchGuard<'a> {
    git: &'a GitRunner,
    original_ref: String,
    stash: Option<StashHandle>,
    checked_out: bool,
    armed: bool,
}

impl SwitchGuard<'_> {
    fn restore(&mut self) -> Result<(), DiffError> {
        self.armed = false;
        let stash = self.stash.as_ref().map(StashHandle::to_string);

        if self.checked_out {
            // Applying the stash on top of the wrong commit would mix changes, so stop here
            if let Err(err) = self.git.checkout(&self.original_ref) {
                error!("Could not check out {} again: {err}", self.original_ref);
                return Err(DiffError::RestoreFailed {
                    detail: format!("checkout of {} failed", self.original_ref),
                    stash,
                    source: Box::new(err),
                    salvaged: None,
                });
            }
        }

        if let Some(handle) = &self.stash {
            if let Err(err) = self.git.stash_apply(handle) {
                error!("Could not re-apply local changes from stash {handle}: {err}");
                return Err(DiffError::RestoreFailed {
                    detail: "re-applying local changes failed".to_string(),
                    stash,
                    source: Box::new(err),
                    salvaged: None,
                });
            }
        }

        info!("Restored working directory to {}", self.original_ref);
        Ok(())
    }
}

impl Drop for SwitchGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!("Restoring working directory after an aborted switch");
        if let Err(err) = self.restore() {
            error!("{err}");
            std::process::abort();
        }
    }
}
