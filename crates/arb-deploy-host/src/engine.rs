//! ---
//! arb_section: "02-host-capabilities"
//! arb_subsection: "module"
//! arb_type: "source"
//! arb_scope: "code"
//! arb_description: "Container engine capability driven through docker compose."
//! arb_version: "v0.1.0"
//! arb_owner: "ops"
//! ---
use std::path::{Path, PathBuf};

use arb_deploy_common::LauncherConfig;
use tracing::debug;

use crate::command::{CommandError, CommandRunner, CommandSpec, SystemCommandRunner};

const DEFAULT_COMPOSE_FILE: &str = "docker-compose.yml";

/// Where the service is defined and what it is called.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDefinition {
    pub working_dir: PathBuf,
    /// Compose file, relative to `working_dir` unless absolute.
    pub compose_file: PathBuf,
    pub project_name: Option<String>,
    pub service_name: String,
}

impl ServiceDefinition {
    pub fn from_config(config: &LauncherConfig) -> Self {
        Self {
            working_dir: config.working_dir.clone(),
            compose_file: config.compose_file.clone(),
            project_name: config.project_name.clone(),
            service_name: config.service_name.clone(),
        }
    }

    /// Compose file location resolved against the working directory.
    pub fn compose_path(&self) -> PathBuf {
        self.working_dir.join(&self.compose_file)
    }
}

/// Container engine operations needed to build and supervise the service.
pub trait ContainerEngine {
    /// Whether the engine daemon and its compose subsystem both answer.
    fn is_available(&self) -> Result<bool, CommandError>;
    /// Build the service image from the current definition.
    fn build(&self, service: &ServiceDefinition) -> Result<(), CommandError>;
    /// Start the service detached, replacing any running instance of it.
    fn start(&self, service: &ServiceDefinition) -> Result<(), CommandError>;
    /// Identifiers of the running containers for the service.
    fn running_instances(&self, service: &ServiceDefinition) -> Result<Vec<String>, CommandError>;
    /// Command line an operator runs to stream live logs.
    fn log_follow_command(&self, service: &ServiceDefinition) -> String;
    /// Stream live logs until interrupted.
    fn follow_logs(&self, service: &ServiceDefinition) -> Result<(), CommandError>;
}

/// [`ContainerEngine`] backed by the `docker compose` plugin.
#[derive(Debug, Clone)]
pub struct ComposeEngine<R = SystemCommandRunner> {
    runner: R,
    program: String,
}

impl ComposeEngine<SystemCommandRunner> {
    pub fn system() -> Self {
        Self::new(SystemCommandRunner)
    }
}

impl<R: CommandRunner> ComposeEngine<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            program: "docker".to_owned(),
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// `compose` plus the file/project selectors, omitting defaults so the
    /// rendered log hint stays short.
    fn compose_args(&self, service: &ServiceDefinition) -> Vec<String> {
        let mut args = vec!["compose".to_owned()];
        if service.compose_file != Path::new(DEFAULT_COMPOSE_FILE) {
            args.push("-f".to_owned());
            args.push(service.compose_file.display().to_string());
        }
        if let Some(project) = &service.project_name {
            args.push("-p".to_owned());
            args.push(project.clone());
        }
        args
    }

    fn compose(&self, service: &ServiceDefinition) -> CommandSpec {
        CommandSpec::new(&self.program)
            .args(self.compose_args(service))
            .current_dir(&service.working_dir)
    }

    fn probe(&self, spec: &CommandSpec) -> Result<bool, CommandError> {
        match self.runner.capture(spec) {
            Ok(output) => Ok(output.success()),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }
}

impl<R: CommandRunner> ContainerEngine for ComposeEngine<R> {
    fn is_available(&self) -> Result<bool, CommandError> {
        let daemon = CommandSpec::new(&self.program).args(["version", "--format", "{{.Server.Version}}"]);
        if !self.probe(&daemon)? {
            debug!("container engine daemon did not answer");
            return Ok(false);
        }
        let compose = CommandSpec::new(&self.program).args(["compose", "version"]);
        self.probe(&compose)
    }

    fn build(&self, service: &ServiceDefinition) -> Result<(), CommandError> {
        let spec = self
            .compose(service)
            .arg("build")
            .arg(&service.service_name);
        self.runner.stream(&spec)
    }

    fn start(&self, service: &ServiceDefinition) -> Result<(), CommandError> {
        let spec = self
            .compose(service)
            .args(["up", "--detach", "--force-recreate", "--remove-orphans"])
            .arg(&service.service_name);
        self.runner.stream(&spec)
    }

    fn running_instances(&self, service: &ServiceDefinition) -> Result<Vec<String>, CommandError> {
        let spec = self
            .compose(service)
            .args(["ps", "--quiet", "--status", "running"])
            .arg(&service.service_name);
        let output = self.runner.run(&spec)?;
        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect())
    }

    fn log_follow_command(&self, service: &ServiceDefinition) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.compose_args(service));
        parts.extend(["logs".to_owned(), "-f".to_owned(), service.service_name.clone()]);
        parts.join(" ")
    }

    fn follow_logs(&self, service: &ServiceDefinition) -> Result<(), CommandError> {
        let spec = self
            .compose(service)
            .args(["logs", "-f"])
            .arg(&service.service_name);
        self.runner.stream(&spec)
    }
}
