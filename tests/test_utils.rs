#![allow(dead_code)]

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

pub const BASE_BENCH: &str = include_str!("testdata/base.txt");
pub const HEAD_BENCH: &str = include_str!("testdata/head.txt");

/// A throwaway git repository on branch `main`
pub struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let repo = Self { dir };
        repo.git(&["init", "--quiet"])?;
        repo.git(&["symbolic-ref", "HEAD", "refs/heads/main"])?;
        repo.git(&["config", "user.name", "benchdiff test"])?;
        repo.git(&["config", "user.email", "test@localhost"])?;
        repo.git(&["config", "commit.gpgsign", "false"])?;
        Ok(repo)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Run git in the repository and return its trimmed stdout
    pub fn git(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(self.path())
            .output()
            .with_context(|| format!("spawning git {}", args.join(" ")))?;
        if !output.status.success() {
            bail!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr)
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    pub fn write(&self, name: &str, contents: &str) -> Result<()> {
        fs::write(self.path().join(name), contents)?;
        Ok(())
    }

    pub fn read(&self, name: &str) -> Result<String> {
        Ok(fs::read_to_string(self.path().join(name))?)
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.path().join(name)
    }

    /// Write the files and commit them, returning the new commit id
    pub fn commit(&self, files: &[(&str, &str)], message: &str) -> Result<String> {
        for (name, contents) in files {
            self.write(name, contents)?;
            self.git(&["add", name])?;
        }
        self.git(&["commit", "--quiet", "-m", message])?;
        self.head()
    }

    pub fn head(&self) -> Result<String> {
        self.git(&["rev-parse", "HEAD"])
    }

    pub fn current_branch(&self) -> Result<String> {
        self.git(&["rev-parse", "--abbrev-ref", "HEAD"])
    }

    /// Porcelain status, empty for a clean tree
    pub fn status(&self) -> Result<String> {
        self.git(&["status", "--porcelain"])
    }
}
