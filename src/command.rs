use log::{debug, warn};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// How often a running process is polled when a deadline is set
const DEADLINE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Errors from launching or waiting on a subprocess
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with status {code}: {stderr}")]
    Failed {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("`{command}` did not finish within {timeout:?}")]
    TimedOut { command: String, timeout: Duration },

    #[error("waiting for `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Command execution context
#[derive(Debug, Clone, Default)]
pub struct CommandContext {
    /// Current working directory
    pub working_dir: Option<PathBuf>,
    /// Environment variables to set
    pub env_vars: HashMap<String, String>,
    /// Kill the process if it runs longer than this
    pub timeout: Option<Duration>,
}

/// Builder for CommandExecutor
pub struct CommandExecutorBuilder {
    context: CommandContext,
}

impl Default for CommandExecutorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandExecutorBuilder {
    /// Create a new CommandExecutorBuilder with default settings
    pub fn new() -> Self {
        Self {
            context: CommandContext::default(),
        }
    }

    /// Set the working directory
    pub fn working_dir<P: AsRef<Path>>(mut self, dir: Option<P>) -> Self {
        self.context.working_dir = dir.map(|d| d.as_ref().to_path_buf());
        self
    }

    /// Add a single environment variable
    pub fn env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.env_vars.insert(key.into(), value.into());
        self
    }

    /// Set a deadline for each launched process
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.context.timeout = timeout;
        self
    }

    /// Build the CommandExecutor
    pub fn build(self) -> CommandExecutor {
        CommandExecutor {
            context: self.context,
        }
    }
}

/// A unified interface for executing commands
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    context: CommandContext,
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandExecutor {
    /// Create a new CommandExecutor with default settings
    pub fn new() -> Self {
        Self {
            context: CommandContext::default(),
        }
    }

    /// Create a builder for CommandExecutor with fluent configuration
    pub fn builder() -> CommandExecutorBuilder {
        CommandExecutorBuilder::new()
    }

    /// Execute a command with arguments and wait for it to complete, capturing its output.
    ///
    /// The deadline does not apply here; captured commands are expected to be short.
    pub fn execute_command_with_args<S: AsRef<str>>(
        &self,
        cmd: &str,
        args: &[S],
    ) -> Result<Output, CommandError> {
        let command_str = self.format_command(cmd, args);
        let mut command = self.prepare(cmd, args);
        command.stdout(Stdio::piped()).stderr(Stdio::piped());

        let child = command.spawn().map_err(|source| CommandError::Spawn {
            command: command_str.clone(),
            source,
        })?;
        let output = child
            .wait_with_output()
            .map_err(|source| CommandError::Io {
                command: command_str.clone(),
                source,
            })?;

        self.check_status(&command_str, output.status, &output.stderr)?;
        Ok(output)
    }

    /// Execute a command with its stdout written to `stdout`.
    ///
    /// Stderr is collected for error reporting. Honors the configured deadline.
    pub fn execute_to_file<S: AsRef<str>>(
        &self,
        cmd: &str,
        args: &[S],
        stdout: File,
    ) -> Result<ExitStatus, CommandError> {
        let command_str = self.format_command(cmd, args);
        let mut command = self.prepare(cmd, args);
        command.stdout(Stdio::from(stdout)).stderr(Stdio::piped());

        let mut child = command.spawn().map_err(|source| CommandError::Spawn {
            command: command_str.clone(),
            source,
        })?;

        let stderr_reader = child.stderr.take().map(|mut stderr| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = stderr.read_to_end(&mut buf);
                buf
            })
        });

        let status = self.wait(&command_str, &mut child);
        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        let status = status?;

        self.check_status(&command_str, status, &stderr)?;
        Ok(status)
    }

    fn prepare<S: AsRef<str>>(&self, cmd: &str, args: &[S]) -> Command {
        debug!("Launching command: {}", self.format_command(cmd, args));

        let mut command = Command::new(cmd);
        command.args(args.iter().map(|a| a.as_ref()));
        command.stdin(Stdio::null());

        if let Some(dir) = &self.context.working_dir {
            command.current_dir(dir);
        }
        for (key, value) in &self.context.env_vars {
            command.env(key, value);
        }
        command
    }

    fn wait(&self, command_str: &str, child: &mut Child) -> Result<ExitStatus, CommandError> {
        let io_err = |source: std::io::Error| CommandError::Io {
            command: command_str.to_string(),
            source,
        };

        let Some(timeout) = self.context.timeout else {
            return child.wait().map_err(io_err);
        };

        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait().map_err(io_err)? {
                return Ok(status);
            }
            if started.elapsed() >= timeout {
                warn!("Killing `{command_str}` after exceeding its deadline");
                let _ = child.kill();
                let _ = child.wait();
                return Err(CommandError::TimedOut {
                    command: command_str.to_string(),
                    timeout,
                });
            }
            thread::sleep(DEADLINE_POLL_INTERVAL);
        }
    }

    fn check_status(
        &self,
        command_str: &str,
        status: ExitStatus,
        stderr: &[u8],
    ) -> Result<(), CommandError> {
        if status.success() {
            return Ok(());
        }
        Err(CommandError::Failed {
            command: command_str.to_string(),
            code: status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(stderr).trim().to_string(),
        })
    }

    /// Format command and arguments for logging
    pub fn format_command<S: AsRef<str>>(&self, cmd: &str, args: &[S]) -> String {
        let mut line = cmd.to_string();
        for arg in args {
            line.push(' ');
            line.push_str(arg.as_ref());
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_command_builder() {
        let executor = CommandExecutor::builder()
            .working_dir(Some("/tmp"))
            .env_var("TEST_VAR", "test_value")
            .timeout(Some(Duration::from_secs(5)))
            .build();

        assert_eq!(executor.context.working_dir, Some(PathBuf::from("/tmp")));
        assert_eq!(
            executor.context.env_vars.get("TEST_VAR"),
            Some(&"test_value".to_string())
        );
        assert_eq!(executor.context.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_execute_command_with_args() {
        let executor = CommandExecutor::builder().build();

        let output = executor
            .execute_command_with_args("echo", &["test", "arguments"])
            .unwrap();
        assert!(output.status.success());

        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("test arguments"));
    }

    #[test]
    fn test_execute_with_env_vars() {
        let executor = CommandExecutor::builder()
            .env_var("TEST_ENV_VAR", "test_value")
            .build();

        let output = executor
            .execute_command_with_args("sh", &["-c", "echo $TEST_ENV_VAR"])
            .unwrap();
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("test_value"));
    }

    #[test]
    fn test_command_failure_handling() {
        let executor = CommandExecutor::builder().build();
        let err = executor
            .execute_command_with_args("sh", &["-c", "echo oops >&2; exit 3"])
            .unwrap_err();
        match &err {
            CommandError::Failed { code, stderr, .. } => {
                assert_eq!(*code, 3);
                assert_eq!(stderr, "oops");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_spawn_failure() {
        let executor = CommandExecutor::new();
        let err = executor
            .execute_command_with_args("benchdiff-no-such-binary", &["x"])
            .unwrap_err();
        assert!(matches!(err, CommandError::Spawn { .. }));
    }

    #[test]
    fn test_execute_to_file() {
        let dir = tempdir().unwrap();
        let out_path = dir.path().join("out.txt");
        let executor = CommandExecutor::builder()
            .working_dir(Some(dir.path()))
            .build();

        let file = File::create(&out_path).unwrap();
        executor
            .execute_to_file("sh", &["-c", "echo captured; echo noise >&2"], file)
            .unwrap();
        assert_eq!(fs::read_to_string(&out_path).unwrap(), "captured\n");
    }

    #[test]
    fn test_execute_to_file_deadline() {
        let dir = tempdir().unwrap();
        let file = File::create(dir.path().join("out.txt")).unwrap();
        let executor = CommandExecutor::builder()
            .timeout(Some(Duration::from_millis(100)))
            .build();

        let started = Instant::now();
        let err = executor
            .execute_to_file("sleep", &["5"], file)
            .unwrap_err();
        assert!(matches!(err, CommandError::TimedOut { .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_format_command() {
        let executor = CommandExecutor::builder().build();
        assert_eq!(
            executor.format_command("echo", &["hello", "world"]),
            "echo hello world"
        );
    }
}
