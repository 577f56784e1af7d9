//! ---
//! arb_section: "01-core-functionality"
//! arb_subsection: "module"
//! arb_type: "source"
//! arb_scope: "code"
//! arb_description: "Shared primitives and utilities for the bootstrap tooling."
//! arb_version: "v0.1.0"
//! arb_owner: "ops"
//! ---
//! Operator-facing milestone reporting shared by the provisioner and launcher.

use std::fmt;
use std::path::PathBuf;

use strum::IntoStaticStr;
use tracing::{info, warn};

/// A step boundary worth telling the operator about.
#[derive(Debug, Clone, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Milestone {
    ProvisionStarted,
    RuntimeAlreadySatisfied,
    LegacyPackagesRemoved { packages: Vec<String> },
    RepositorySetupStarted,
    RepositoryRegistered { architecture: String, codename: String },
    RuntimePackagesInstalled { packages: Vec<String> },
    ProvisionCompleted,
    ConfigPlaceholderCreated { path: PathBuf },
    ConfigPresent { path: PathBuf },
    CredentialsIncomplete { path: PathBuf, keys: Vec<String> },
    StateFilesEnsured { created: Vec<PathBuf> },
    BuildAndStartStarted { service: String },
    ServiceRunning { service: String },
    LogHint { command: String },
}

/// How loudly a milestone should be surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MilestoneSeverity {
    Info,
    Warning,
}

impl Milestone {
    /// Stable kebab-case identifier, used as the tracing event name.
    pub fn kind(&self) -> &'static str {
        self.into()
    }

    pub fn severity(&self) -> MilestoneSeverity {
        match self {
            Milestone::ConfigPlaceholderCreated { .. } | Milestone::CredentialsIncomplete { .. } => {
                MilestoneSeverity::Warning
            }
            _ => MilestoneSeverity::Info,
        }
    }
}

impl fmt::Display for Milestone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Milestone::ProvisionStarted => write!(f, "Checking container runtime on this host..."),
            Milestone::RuntimeAlreadySatisfied => {
                write!(f, "Container runtime and compose plugin already installed; nothing to do.")
            }
            Milestone::LegacyPackagesRemoved { packages } if packages.is_empty() => {
                write!(f, "No conflicting legacy packages installed.")
            }
            Milestone::LegacyPackagesRemoved { packages } => {
                write!(f, "Removed conflicting packages: {}", packages.join(", "))
            }
            Milestone::RepositorySetupStarted => write!(f, "Setting up the container runtime repository..."),
            Milestone::RepositoryRegistered {
                architecture,
                codename,
            } => write!(f, "Repository registered for {architecture} / {codename}."),
            Milestone::RuntimePackagesInstalled { packages } if packages.is_empty() => {
                write!(f, "Runtime packages already present.")
            }
            Milestone::RuntimePackagesInstalled { packages } => {
                write!(f, "Installed runtime packages: {}", packages.join(", "))
            }
            Milestone::ProvisionCompleted => write!(f, "Container runtime is ready."),
            Milestone::ConfigPlaceholderCreated { path } => write!(
                f,
                "Created empty {}. Edit it and add your API credentials before the bot can trade.",
                path.display()
            ),
            Milestone::ConfigPresent { path } => write!(f, "Using existing {}.", path.display()),
            Milestone::CredentialsIncomplete { path, keys } => write!(
                f,
                "{} is missing values for: {}",
                path.display(),
                keys.join(", ")
            ),
            Milestone::StateFilesEnsured { created } if created.is_empty() => {
                write!(f, "State files already present.")
            }
            Milestone::StateFilesEnsured { created } => write!(
                f,
                "Created state files: {}",
                created
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Milestone::BuildAndStartStarted { service } => {
                write!(f, "Building and starting service '{service}'...")
            }
            Milestone::ServiceRunning { service } => {
                write!(f, "Service '{service}' is running in the background.")
            }
            Milestone::LogHint { command } => write!(f, "Follow live logs with: {command}"),
        }
    }
}

/// Sink for milestones emitted while provisioning or launching.
pub trait ProgressReporter {
    fn report(&self, milestone: &Milestone);
}

/// Prints milestones for a human at a terminal and mirrors them into tracing.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl ProgressReporter for ConsoleReporter {
    fn report(&self, milestone: &Milestone) {
        match milestone.severity() {
            MilestoneSeverity::Info => {
                info!(milestone = milestone.kind(), "{milestone}");
                println!("{milestone}");
            }
            MilestoneSeverity::Warning => {
                warn!(milestone = milestone.kind(), "{milestone}");
                eprintln!("WARNING: {milestone}");
            }
        }
    }
}

/// Discards every milestone.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {
    fn report(&self, _milestone: &Milestone) {}
}
