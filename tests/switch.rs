use anyhow::Result;
use benchdiff::error::DiffError;
use benchdiff::git::{GitRunner, RefSwitch, SwitchError};
use std::fs;
use std::panic::{self, AssertUnwindSafe};

mod test_utils;
use test_utils::TestRepo;

/// Repository with `foo` committed twice, the second version modified locally, and an untracked file
fn dirty_repo() -> Result<(TestRepo, String)> {
    let repo = TestRepo::new()?;
    let first = repo.commit(&[("foo", "OG content")], "first")?;
    repo.commit(&[("foo", "second content")], "second")?;
    repo.write("foo", "new content")?;
    repo.write("untracked", "untracked content")?;
    Ok((repo, first))
}

#[test]
fn test_switch_clean_tree() -> Result<()> {
    let repo = TestRepo::new()?;
    let first = repo.commit(&[("foo", "OG content")], "first")?;
    let second = repo.commit(&[("foo", "second content")], "second")?;
    let mut git = GitRunner::new("git", repo.path())?;

    let seen = RefSwitch::new(&mut git, first.clone())
        .run(|| (repo.head(), repo.read("foo")))
        .map_err(SwitchError::into_error)?;

    assert_eq!(seen.0?, first);
    assert_eq!(seen.1?, "OG content");
    assert_eq!(repo.head()?, second);
    assert_eq!(repo.current_branch()?, "main");
    assert_eq!(repo.status()?, "");
    Ok(())
}

#[test]
fn test_switch_restores_local_changes() -> Result<()> {
    let (repo, first) = dirty_repo()?;
    let mut git = GitRunner::new("git", repo.path())?;

    let (foo, untracked) = RefSwitch::new(&mut git, first)
        .run(|| (repo.read("foo"), repo.file("untracked").exists()))
        .map_err(SwitchError::into_error)?;

    assert_eq!(foo?, "OG content");
    assert!(untracked);
    assert_eq!(repo.read("foo")?, "new content");
    assert_eq!(repo.read("untracked")?, "untracked content");
    assert_eq!(repo.current_branch()?, "main");
    Ok(())
}

#[test]
fn test_switch_restores_after_failed_action() -> Result<()> {
    let (repo, first) = dirty_repo()?;
    let mut git = GitRunner::new("git", repo.path())?;

    let outcome: Result<(), String> = RefSwitch::new(&mut git, first)
        .run(|| Err("benchmark exploded".to_string()))
        .map_err(SwitchError::into_error)?;

    assert_eq!(outcome, Err("benchmark exploded".to_string()));
    assert_eq!(repo.read("foo")?, "new content");
    assert_eq!(repo.current_branch()?, "main");
    Ok(())
}

#[test]
fn test_switch_restores_after_panic() -> Result<()> {
    let (repo, first) = dirty_repo()?;
    let mut git = GitRunner::new("git", repo.path())?;

    let caught = panic::catch_unwind(AssertUnwindSafe(|| {
        let result: Result<(), SwitchError<()>> =
            RefSwitch::new(&mut git, first).run(|| panic!("benchmark panicked"));
        result
    }));

    assert!(caught.is_err());
    assert_eq!(repo.read("foo")?, "new content");
    assert_eq!(repo.read("untracked")?, "untracked content");
    assert_eq!(repo.current_branch()?, "main");
    Ok(())
}

#[test]
fn test_switch_from_detached_head() -> Result<()> {
    let repo = TestRepo::new()?;
    let first = repo.commit(&[("foo", "OG content")], "first")?;
    let second = repo.commit(&[("foo", "second content")], "second")?;
    repo.git(&["checkout", "--quiet", &second])?;
    let mut git = GitRunner::new("git", repo.path())?;

    RefSwitch::new(&mut git, first)
        .run(|| ())
        .map_err(SwitchError::into_error)?;

    assert_eq!(repo.current_branch()?, "HEAD");
    assert_eq!(repo.head()?, second);
    Ok(())
}

#[test]
fn test_switch_to_missing_ref_is_setup_error() -> Result<()> {
    let (repo, _) = dirty_repo()?;
    let mut git = GitRunner::new("git", repo.path())?;
    let mut ran = false;

    let result = RefSwitch::new(&mut git, "no-such-branch").run(|| ran = true);

    match result {
        Err(SwitchError::Setup(DiffError::VcsCommandFailed { operation, .. })) => {
            assert_eq!(operation, "checkout")
        }
        other => panic!("expected a setup failure, got {other:?}"),
    }
    assert!(!ran);
    assert_eq!(repo.read("foo")?, "new content");
    assert_eq!(repo.current_branch()?, "main");
    Ok(())
}

#[test]
fn test_switch_cooldown() -> Result<()> {
    let repo = TestRepo::new()?;
    let first = repo.commit(&[("foo", "OG content")], "first")?;
    repo.commit(&[("foo", "second content")], "second")?;
    let mut git = GitRunner::new("git", repo.path())?;

    let started = std::time::Instant::now();
    RefSwitch::new(&mut git, first)
        .cooldown(std::time::Duration::from_millis(50))
        .run(|| ())
        .map_err(SwitchError::into_error)?;

    assert!(started.elapsed() >= std::time::Duration::from_millis(50));
    Ok(())
}

#[test]
fn test_runner_resolves_refs() -> Result<()> {
    let repo = TestRepo::new()?;
    let first = repo.commit(&[("foo", "OG content")], "first")?;
    repo.git(&["tag", "v1"])?;
    let git = GitRunner::new("git", repo.path())?;

    assert_eq!(git.resolve("v1")?, first);
    assert_eq!(git.resolve("main")?, first);
    assert!(matches!(
        git.resolve("v2"),
        Err(DiffError::ReferenceNotFound { .. })
    ));
    assert!(git.stash_create()?.is_none());
    assert_eq!(fs::canonicalize(repo.path())?, git.repo_path());
    Ok(())
}

#[test]
fn test_checkout_blocked_by_local_changes() -> Result<()> {
    let (repo, first) = dirty_repo()?;
    let git = GitRunner::new("git", repo.path())?;

    match git.checkout(&first) {
        Err(DiffError::DirtyCheckoutBlocked { reference, .. }) => assert_eq!(reference, first),
        other => panic!("expected DirtyCheckoutBlocked, got {other:?}"),
    }
    assert_eq!(repo.read("foo")?, "new content");
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_switch_restores_after_failed_reset() -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let (repo, first) = dirty_repo()?;
    let tools = tempfile::tempdir()?;
    let wrapper = tools.path().join("git-reset-fails");
    // the reset takes effect but git still reports failure
    fs::write(
        &wrapper,
        "#!/bin/sh\nif [ \"$1\" = reset ]; then\n  git \"$@\"\n  echo 'fatal: boom' >&2\n  exit 1\nfi\nexec git \"$@\"\n",
    )?;
    fs::set_permissions(&wrapper, fs::Permissions::from_mode(0o755))?;
    let mut git = GitRunner::new(wrapper.to_string_lossy(), repo.path())?;
    let mut ran = false;

    let result = RefSwitch::new(&mut git, first).run(|| ran = true);

    match result {
        Err(SwitchError::Setup(DiffError::VcsCommandFailed { operation, .. })) => {
            assert_eq!(operation, "reset")
        }
        other => panic!("expected a reset failure, got {other:?}"),
    }
    assert!(!ran);
    assert_eq!(repo.read("foo")?, "new content");
    assert_eq!(repo.read("untracked")?, "untracked content");
    assert_eq!(repo.current_branch()?, "main");
    Ok(())
}
