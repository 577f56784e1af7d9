//! ---
//! arb_section: "02-host-capabilities"
//! arb_subsection: "module"
//! arb_type: "source"
//! arb_scope: "code"
//! arb_description: "External process invocation for host capabilities."
//! arb_version: "v0.1.0"
//! arb_owner: "ops"
//! ---
//! Blocking external command execution.
//!
//! Two modes are offered:
//! - captured: stdout/stderr collected for parsing (queries such as `dpkg-query`)
//! - streamed: output inherited so the operator sees the tool's own diagnostics
//!   verbatim (package installs, image builds)

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::debug;

/// A fully described external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub envs: Vec<(String, String)>,
    pub current_dir: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        for (key, value) in &self.envs {
            command.env(key, value);
        }
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }
        command
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Output of a captured command. A non-zero exit is not an error at this level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Turn a non-zero exit into [`CommandError::Failed`].
    pub fn check(self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        if self.success() {
            Ok(self)
        } else {
            Err(CommandError::Failed {
                command: spec.to_string(),
                code: self.code,
                stderr: self.stderr.trim_end().to_owned(),
            })
        }
    }
}

/// Command execution error.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The program could not be started at all.
    #[error("failed to run `{command}`")]
    SpawnFailed {
        command: String,
        #[source]
        source: io::Error,
    },
    /// The program ran and exited unsuccessfully.
    #[error("`{command}` {}{}", describe_exit(.code), render_stderr(.stderr))]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

impl CommandError {
    /// Exit code of the failed program, if it ran and exited normally.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            CommandError::Failed { code, .. } => *code,
            CommandError::SpawnFailed { .. } => None,
        }
    }

    /// Whether the program itself is missing from the host.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CommandError::SpawnFailed { source, .. } if source.kind() == io::ErrorKind::NotFound
        )
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with status {code}"),
        None => "was terminated by a signal".to_owned(),
    }
}

fn render_stderr(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(":\n{stderr}")
    }
}

/// Seam over process execution so adapters can be tested without a host.
pub trait CommandRunner {
    /// Run to completion collecting output; only spawn failures are errors.
    fn capture(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError>;

    /// Run to completion with inherited stdio; a non-zero exit is an error.
    fn stream(&self, spec: &CommandSpec) -> Result<(), CommandError>;

    /// Capture and require success.
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        self.capture(spec)?.check(spec)
    }
}

/// Executes commands on the local host.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn capture(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        debug!(command = %spec, "running captured command");
        let output = spec
            .to_command()
            .stdin(Stdio::null())
            .output()
            .map_err(|source| CommandError::SpawnFailed {
                command: spec.to_string(),
                source,
            })?;
        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn stream(&self, spec: &CommandSpec) -> Result<(), CommandError> {
        debug!(command = %spec, "running streamed command");
        let status = spec
            .to_command()
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|source| CommandError::SpawnFailed {
                command: spec.to_string(),
                source,
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(CommandError::Failed {
                command: spec.to_string(),
                code: status.code(),
                stderr: String::new(),
            })
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn captured_success_collects_stdout() {
        let spec = CommandSpec::new("echo").arg("hello");
        let output = SystemCommandRunner.run(&spec).expect("echo runs");
        assert!(output.stdout.contains("hello"));
    }

    #[test]
    fn missing_program_is_spawn_failure() {
        let spec = CommandSpec::new("nonexistent_command_12345");
        let err = SystemCommandRunner.capture(&spec).expect_err("spawn fails");
        assert!(err.is_not_found());
        assert_eq!(err.exit_code(), None);
    }

    #[test]
    fn failure_carries_code_and_stderr() {
        let spec = CommandSpec::new("sh").args(["-c", "echo boom >&2; exit 3"]);
        let err = SystemCommandRunner.run(&spec).expect_err("non-zero exit");
        assert_eq!(err.exit_code(), Some(3));
        let message = err.to_string();
        assert!(message.contains("exited with status 3"), "{message}");
        assert!(message.contains("boom"), "{message}");
    }

    #[test]
    fn streamed_failure_reports_exit_code() {
        let spec = CommandSpec::new("sh").args(["-c", "exit 7"]);
        let err = SystemCommandRunner.stream(&spec).expect_err("non-zero exit");
        assert_eq!(err.exit_code(), Some(7));
    }

    #[test]
    fn display_joins_program_and_args() {
        let spec = CommandSpec::new("docker")
            .args(["compose", "up", "-d"])
            .env("DEBIAN_FRONTEND", "noninteractive");
        assert_eq!(spec.to_string(), "docker compose up -d");
    }
}
