//! ---
//! arb_section: "05-service-launch"
//! arb_subsection: "module"
//! arb_type: "source"
//! arb_scope: "code"
//! arb_description: "Service launcher: preconditions, build/start, status."
//! arb_version: "v0.1.0"
//! arb_owner: "ops"
//! ---
//! Brings up the single supervised service.
//!
//! The launcher owns the files the service bind-mounts and drives the
//! container engine through `NOT_STARTED -> PRECONDITIONS_CHECKED -> BUILDING
//! -> RUNNING`. A second build from `RUNNING` goes back through `BUILDING` and
//! replaces the running instance.

use std::path::PathBuf;

use arb_deploy_common::{LauncherConfig, Milestone, ProgressReporter};
use arb_deploy_host::{ContainerEngine, ServiceDefinition};
use arb_deploy_logging::{deploy_error, deploy_info, log_step_event, LogContext, StepOutcome};
use strum::{Display, IntoStaticStr};

pub mod artifacts;
pub mod bootstrap;
pub mod env_file;
pub mod error;

pub use artifacts::{create_if_absent, ArtifactStatus};
pub use bootstrap::{bootstrap, BootstrapReport};
pub use env_file::{audit_credentials, CredentialAudit};
pub use error::{BuildError, DeployError, LaunchError, PreconditionError, StartError};

const COMPONENT: &str = "launcher";

/// Lifecycle position of the supervised service as seen by the launcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum LauncherState {
    NotStarted,
    PreconditionsChecked,
    Building,
    Running,
}

/// Summary of a [`ServiceLauncher::launch`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchReport {
    pub config_created: bool,
    pub state_files_created: Vec<PathBuf>,
    pub log_command: String,
}

/// Drives config/state preparation and the container lifecycle for one service.
pub struct ServiceLauncher<'a> {
    config: &'a LauncherConfig,
    service: ServiceDefinition,
    engine: &'a dyn ContainerEngine,
    reporter: &'a dyn ProgressReporter,
    state: LauncherState,
    history: Vec<LauncherState>,
}

impl<'a> ServiceLauncher<'a> {
    pub fn new(
        config: &'a LauncherConfig,
        engine: &'a dyn ContainerEngine,
        reporter: &'a dyn ProgressReporter,
    ) -> Self {
        Self {
            config,
            service: ServiceDefinition::from_config(config),
            engine,
            reporter,
            state: LauncherState::NotStarted,
            history: vec![LauncherState::NotStarted],
        }
    }

    pub fn state(&self) -> LauncherState {
        self.state
    }

    /// Every state entered so far, starting with `NOT_STARTED`.
    pub fn history(&self) -> &[LauncherState] {
        &self.history
    }

    pub fn service(&self) -> &ServiceDefinition {
        &self.service
    }

    /// Create an empty env file when none exists, and warn about missing
    /// credentials when one does. Never rewrites an existing file.
    pub fn ensure_config_present(&self) -> Result<ArtifactStatus, PreconditionError> {
        let path = self.config.env_path();
        let status = create_if_absent(&path)?;
        match status {
            ArtifactStatus::Created => {
                self.step_event("config", "placeholder created", StepOutcome::Applied);
                self.reporter
                    .report(&Milestone::ConfigPlaceholderCreated { path });
            }
            ArtifactStatus::Present => {
                self.step_event("config", "env file present", StepOutcome::Unchanged);
                self.reporter
                    .report(&Milestone::ConfigPresent { path: path.clone() });
                let audit = audit_credentials(&path, &self.config.required_env_keys)
                    .map_err(|source| PreconditionError::Io {
                        path: path.clone(),
                        source,
                    })?;
                if !audit.is_complete() {
                    self.reporter.report(&Milestone::CredentialsIncomplete {
                        path,
                        keys: audit.missing,
                    });
                }
            }
        }
        Ok(status)
    }

    /// Create each missing state file empty; existing files keep their content.
    /// Returns the files that had to be created.
    pub fn ensure_state_files_present(&self) -> Result<Vec<PathBuf>, PreconditionError> {
        let mut created = Vec::new();
        for path in self.config.state_paths() {
            if create_if_absent(&path)? == ArtifactStatus::Created {
                created.push(path);
            }
        }
        self.step_event(
            "state-files",
            &format!("{} created", created.len()),
            if created.is_empty() {
                StepOutcome::Unchanged
            } else {
                StepOutcome::Applied
            },
        );
        self.reporter.report(&Milestone::StateFilesEnsured {
            created: created.clone(),
        });
        Ok(created)
    }

    /// Run both precondition steps, config first.
    pub fn check_preconditions(&mut self) -> Result<(ArtifactStatus, Vec<PathBuf>), PreconditionError> {
        let config = self.ensure_config_present()?;
        let created = self.ensure_state_files_present()?;
        if self.state == LauncherState::NotStarted {
            self.transition(LauncherState::PreconditionsChecked);
        }
        Ok((config, created))
    }

    /// Build the image and start the service detached, replacing any running
    /// instance. Preconditions are checked first if that has not happened yet.
    pub fn build_and_start(&mut self) -> Result<(), LaunchError> {
        if self.state == LauncherState::NotStarted {
            self.check_preconditions()?;
        }
        self.transition(LauncherState::Building);
        let service = self.service.service_name.clone();
        self.reporter.report(&Milestone::BuildAndStartStarted {
            service: service.clone(),
        });
        let ctx = LogContext::new()
            .with_component(COMPONENT)
            .with_service(&service);

        if let Err(source) = self.engine.build(&self.service) {
            deploy_error!(context = ctx, "image build failed: {source}");
            return Err(BuildError { service, source }.into());
        }
        if let Err(source) = self.engine.start(&self.service) {
            deploy_error!(context = ctx, "container start failed: {source}");
            return Err(StartError { service, source }.into());
        }

        self.transition(LauncherState::Running);
        deploy_info!(context = ctx, "service started");
        self.reporter.report(&Milestone::ServiceRunning { service });
        Ok(())
    }

    /// Tell the operator how to follow the live logs. Changes nothing.
    pub fn report_status(&self) -> String {
        let command = self.engine.log_follow_command(&self.service);
        self.reporter.report(&Milestone::LogHint {
            command: command.clone(),
        });
        command
    }

    /// Preconditions, build and start, then the status hint.
    pub fn launch(&mut self) -> Result<LaunchReport, LaunchError> {
        let (config, state_files_created) = self.check_preconditions()?;
        self.build_and_start()?;
        let log_command = self.report_status();
        Ok(LaunchReport {
            config_created: config == ArtifactStatus::Created,
            state_files_created,
            log_command,
        })
    }

    fn transition(&mut self, next: LauncherState) {
        let ctx = LogContext::new()
            .with_component(COMPONENT)
            .with_service(&self.service.service_name);
        deploy_info!(context = ctx, "state {} -> {}", self.state, next);
        self.state = next;
        self.history.push(next);
    }

    fn step_event(&self, step: &str, message: &str, outcome: StepOutcome) {
        let ctx = LogContext::new()
            .with_component(COMPONENT)
            .with_step(step)
            .with_service(&self.service.service_name);
        log_step_event(Some(&ctx), "launch.step", message, outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arb_deploy_common::SilentReporter;
    use arb_deploy_host::testing::{FakeContainerEngine, Journal};
    use tempfile::tempdir;

    #[test]
    fn state_names_match_lifecycle_vocabulary() {
        assert_eq!(LauncherState::NotStarted.to_string(), "NOT_STARTED");
        assert_eq!(
            LauncherState::PreconditionsChecked.to_string(),
            "PRECONDITIONS_CHECKED"
        );
        assert_eq!(LauncherState::Running.to_string(), "RUNNING");
    }

    #[test]
    fn rebuild_from_running_passes_through_building() {
        let dir = tempdir().unwrap();
        let config = LauncherConfig {
            working_dir: dir.path().to_path_buf(),
            ..LauncherConfig::default()
        };
        let engine = FakeContainerEngine::new(Journal::new());
        let mut launcher = ServiceLauncher::new(&config, &engine, &SilentReporter);

        launcher.build_and_start().unwrap();
        launcher.build_and_start().unwrap();

        assert_eq!(
            launcher.history(),
            &[
                LauncherState::NotStarted,
                LauncherState::PreconditionsChecked,
                LauncherState::Building,
                LauncherState::Running,
                LauncherState::Building,
                LauncherState::Running,
            ]
        );
    }

    #[test]
    fn failed_build_never_reaches_running() {
        let dir = tempdir().unwrap();
        let config = LauncherConfig {
            working_dir: dir.path().to_path_buf(),
            ..LauncherConfig::default()
        };
        let engine = FakeContainerEngine::new(Journal::new());
        engine.fail_next_build(17);
        let mut launcher = ServiceLauncher::new(&config, &engine, &SilentReporter);

        let err = launcher.build_and_start().unwrap_err();

        assert_eq!(err.exit_code(), Some(17));
        assert_eq!(launcher.state(), LauncherState::Building);
    }
}
