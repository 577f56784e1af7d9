//! ---
//! arb_section: "04-provisioning"
//! arb_subsection: "module"
//! arb_type: "source"
//! arb_scope: "code"
//! arb_description: "Container runtime provisioner."
//! arb_version: "v0.1.0"
//! arb_owner: "ops"
//! ---
//! Installs the container engine and its compose plugin from the vendor
//! repository. Every step is idempotent; a failing step aborts the run with
//! no rollback.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use arb_deploy_common::{Milestone, ProgressReporter, ProvisionConfig};
use arb_deploy_host::{
    CommandError, ContainerEngine, FetchError, KeyFetcher, OsRelease, PackageManager,
};
use arb_deploy_logging::{deploy_info, log_step_event, LogContext, StepOutcome};
use thiserror::Error;
use tracing::debug;
use url::Url;

pub mod repository;
pub mod retry;

pub use retry::{RetryFailure, RetryPolicy};

const COMPONENT: &str = "provisioner";

/// Fatal provisioning failure.
#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error("package manager failed to {action}")]
    PackageManager {
        action: &'static str,
        #[source]
        source: CommandError,
    },
    #[error("signing key url '{url}' is invalid")]
    InvalidKeyUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("could not download signing key from {url} after {attempts} attempt(s)")]
    KeyFetch {
        url: String,
        attempts: u32,
        #[source]
        source: FetchError,
    },
    #[error("signing key from {url} has sha256 {actual}, expected {expected}")]
    KeyPinMismatch {
        url: String,
        expected: String,
        actual: String,
    },
    #[error("unsupported host: {0}")]
    UnsupportedHost(String),
    #[error("filesystem operation on {path:?} failed")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not probe the container engine")]
    EngineProbe(#[source] CommandError),
    #[error("container engine still unavailable after installing the runtime packages")]
    RuntimeUnavailable,
}

impl ProvisioningError {
    /// Exit status of the external command behind this failure, if any.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ProvisioningError::PackageManager { source, .. } => source.exit_code(),
            ProvisioningError::EngineProbe(source) => source.exit_code(),
            _ => None,
        }
    }

    fn filesystem(path: impl AsRef<Path>) -> impl FnOnce(io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        move |source| ProvisioningError::Filesystem { path, source }
    }
}

/// Host facts gathered and changes applied while registering the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRegistration {
    pub architecture: String,
    pub codename: String,
    pub key_stored: bool,
    pub source_written: bool,
}

/// Summary of a provisioning run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionReport {
    /// The runtime was already in place, free of legacy packages, and nothing
    /// was changed.
    pub already_satisfied: bool,
    pub removed_legacy: Vec<String>,
    pub installed_prerequisites: Vec<String>,
    pub repository: Option<RepositoryRegistration>,
    pub installed_runtime: Vec<String>,
}

/// Drives host capabilities to a state where the container runtime is usable.
pub struct RuntimeProvisioner<'a> {
    config: &'a ProvisionConfig,
    packages: &'a dyn PackageManager,
    engine: &'a dyn ContainerEngine,
    fetcher: &'a dyn KeyFetcher,
    reporter: &'a dyn ProgressReporter,
    retry: RetryPolicy,
}

impl<'a> RuntimeProvisioner<'a> {
    pub fn new(
        config: &'a ProvisionConfig,
        packages: &'a dyn PackageManager,
        engine: &'a dyn ContainerEngine,
        fetcher: &'a dyn KeyFetcher,
        reporter: &'a dyn ProgressReporter,
    ) -> Self {
        Self {
            config,
            packages,
            engine,
            fetcher,
            reporter,
            retry: RetryPolicy::from(&config.fetch),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Run every provisioning step in order, or nothing if the runtime is
    /// already installed and answering with no legacy package alongside it.
    pub fn run(&self) -> Result<ProvisionReport, ProvisioningError> {
        self.reporter.report(&Milestone::ProvisionStarted);

        if self.runtime_satisfied()? {
            self.step_event("detect", "runtime already installed", StepOutcome::Unchanged);
            self.reporter.report(&Milestone::RuntimeAlreadySatisfied);
            self.reporter.report(&Milestone::ProvisionCompleted);
            return Ok(ProvisionReport {
                already_satisfied: true,
                ..ProvisionReport::default()
            });
        }

        let removed_legacy = self.ensure_runtime_removed_legacy()?;
        let installed_prerequisites = self.install_prerequisites()?;
        let repository = self.ensure_repository_registered()?;
        let installed_runtime = self.install_runtime_packages()?;

        if !self.engine.is_available().map_err(ProvisioningError::EngineProbe)? {
            self.step_event("verify", "engine did not answer", StepOutcome::Fault);
            return Err(ProvisioningError::RuntimeUnavailable);
        }
        self.reporter.report(&Milestone::ProvisionCompleted);
        deploy_info!(
            context = LogContext::new().with_component(COMPONENT),
            "runtime provisioned; installed {} package(s)",
            installed_prerequisites.len() + installed_runtime.len()
        );

        Ok(ProvisionReport {
            already_satisfied: false,
            removed_legacy,
            installed_prerequisites,
            repository: Some(repository),
            installed_runtime,
        })
    }

    /// Whether every runtime package is installed, no legacy package is left
    /// behind, and the engine answers.
    pub fn runtime_satisfied(&self) -> Result<bool, ProvisioningError> {
        if !self.missing(&self.config.runtime_packages)?.is_empty() {
            return Ok(false);
        }
        if !self.installed(&self.config.legacy_packages)?.is_empty() {
            return Ok(false);
        }
        self.engine
            .is_available()
            .map_err(ProvisioningError::EngineProbe)
    }

    /// Remove conflicting distribution packages. Packages that are not
    /// installed are skipped; returns the ones actually removed.
    pub fn ensure_runtime_removed_legacy(&self) -> Result<Vec<String>, ProvisioningError> {
        let installed = self.installed(&self.config.legacy_packages)?;
        if installed.is_empty() {
            self.step_event("remove-legacy", "no legacy packages installed", StepOutcome::Unchanged);
        } else {
            self.packages
                .remove(&installed)
                .map_err(|source| ProvisioningError::PackageManager {
                    action: "remove legacy packages",
                    source,
                })?;
            self.step_event("remove-legacy", &installed.join(" "), StepOutcome::Applied);
        }
        self.reporter.report(&Milestone::LegacyPackagesRemoved {
            packages: installed.clone(),
        });
        Ok(installed)
    }

    /// Install the tools needed to talk to the vendor repository.
    pub fn install_prerequisites(&self) -> Result<Vec<String>, ProvisioningError> {
        let missing = self.missing(&self.config.prerequisite_packages)?;
        if missing.is_empty() {
            return Ok(missing);
        }
        self.refresh_index()?;
        self.packages
            .install(&missing)
            .map_err(|source| ProvisioningError::PackageManager {
                action: "install prerequisites",
                source,
            })?;
        self.step_event("prerequisites", &missing.join(" "), StepOutcome::Applied);
        Ok(missing)
    }

    /// Store the signing key and write the source entry for this host's
    /// architecture and release. Either half already in place is left alone.
    pub fn ensure_repository_registered(&self) -> Result<RepositoryRegistration, ProvisioningError> {
        self.reporter.report(&Milestone::RepositorySetupStarted);

        let keyring_dir = &self.config.keyring_dir;
        fs::create_dir_all(keyring_dir).map_err(ProvisioningError::filesystem(keyring_dir))?;

        let key_stored = self.ensure_key_stored()?;
        let architecture = self.host_architecture()?;
        let codename = self.host_codename()?;

        let key_path = self.config.key_path();
        let entry = repository::source_entry(
            &architecture,
            &key_path,
            &self.config.repository_url,
            &codename,
            &self.config.channel,
        );
        let source_path = &self.config.source_list_path;
        let source_written = repository::write_source_entry(source_path, &entry)
            .map_err(ProvisioningError::filesystem(source_path))?;
        self.step_event(
            "source-entry",
            &entry,
            if source_written {
                StepOutcome::Applied
            } else {
                StepOutcome::Unchanged
            },
        );

        self.reporter.report(&Milestone::RepositoryRegistered {
            architecture: architecture.clone(),
            codename: codename.clone(),
        });
        Ok(RepositoryRegistration {
            architecture,
            codename,
            key_stored,
            source_written,
        })
    }

    /// Install the engine, CLI, containerd and compose plugin. Returns the
    /// packages that were missing beforehand.
    pub fn install_runtime_packages(&self) -> Result<Vec<String>, ProvisioningError> {
        let missing = self.missing(&self.config.runtime_packages)?;
        if missing.is_empty() {
            self.step_event("install-runtime", "runtime packages present", StepOutcome::Unchanged);
        } else {
            self.refresh_index()?;
            self.packages
                .install(&missing)
                .map_err(|source| ProvisioningError::PackageManager {
                    action: "install runtime packages",
                    source,
                })?;
            self.step_event("install-runtime", &missing.join(" "), StepOutcome::Applied);
        }
        self.reporter.report(&Milestone::RuntimePackagesInstalled {
            packages: missing.clone(),
        });
        Ok(missing)
    }

    fn ensure_key_stored(&self) -> Result<bool, ProvisioningError> {
        let key_path = self.config.key_path();
        let pin = self.config.expected_key_sha256.as_deref();
        let present =
            repository::key_present(&key_path).map_err(ProvisioningError::filesystem(&key_path))?;
        if present {
            let current =
                fs::read(&key_path).map_err(ProvisioningError::filesystem(&key_path))?;
            if repository::verify_pin(&current, pin).is_ok() {
                self.step_event("store-key", "signing key already stored", StepOutcome::Unchanged);
                return Ok(false);
            }
            debug!(path = %key_path.display(), "stored key does not match pin; refetching");
        }

        let url = Url::parse(&self.config.key_url).map_err(|source| {
            ProvisioningError::InvalidKeyUrl {
                url: self.config.key_url.clone(),
                source,
            }
        })?;
        let key = self
            .retry
            .retry(|_| self.fetcher.fetch(&url), FetchError::is_transient)
            .map_err(|failure| ProvisioningError::KeyFetch {
                url: url.to_string(),
                attempts: failure.attempts,
                source: failure.error,
            })?;
        if let Err(actual) = repository::verify_pin(&key, pin) {
            return Err(ProvisioningError::KeyPinMismatch {
                url: url.to_string(),
                expected: pin.unwrap_or_default().to_owned(),
                actual,
            });
        }
        repository::write_atomic(&key_path, &key)
            .map_err(ProvisioningError::filesystem(&key_path))?;
        self.step_event("store-key", &key_path.display().to_string(), StepOutcome::Applied);
        Ok(true)
    }

    fn host_architecture(&self) -> Result<String, ProvisioningError> {
        let architecture = self
            .packages
            .architecture()
            .map_err(|source| ProvisioningError::PackageManager {
                action: "report the host architecture",
                source,
            })?;
        let valid = !architecture.is_empty()
            && architecture
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !valid {
            return Err(ProvisioningError::UnsupportedHost(format!(
                "package architecture '{architecture}' is not recognised"
            )));
        }
        Ok(architecture)
    }

    fn host_codename(&self) -> Result<String, ProvisioningError> {
        let path = &self.config.os_release_path;
        let release = OsRelease::read(path).map_err(|err| {
            ProvisioningError::UnsupportedHost(format!("cannot read {}: {err}", path.display()))
        })?;
        let codename = release.codename().ok_or_else(|| {
            ProvisioningError::UnsupportedHost(format!(
                "{} does not name a release codename",
                path.display()
            ))
        })?;
        if !codename
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        {
            return Err(ProvisioningError::UnsupportedHost(format!(
                "release codename '{codename}' is not usable in a source entry"
            )));
        }
        Ok(codename.to_owned())
    }

    fn refresh_index(&self) -> Result<(), ProvisioningError> {
        self.packages
            .refresh()
            .map_err(|source| ProvisioningError::PackageManager {
                action: "refresh the package index",
                source,
            })
    }

    fn installed(&self, packages: &[String]) -> Result<Vec<String>, ProvisioningError> {
        self.partition(packages, true)
    }

    fn missing(&self, packages: &[String]) -> Result<Vec<String>, ProvisioningError> {
        self.partition(packages, false)
    }

    fn partition(&self, packages: &[String], installed: bool) -> Result<Vec<String>, ProvisioningError> {
        let mut selected = Vec::new();
        for package in packages {
            let is_installed = self.packages.is_installed(package).map_err(|source| {
                ProvisioningError::PackageManager {
                    action: "query package status",
                    source,
                }
            })?;
            if is_installed == installed {
                selected.push(package.clone());
            }
        }
        Ok(selected)
    }

    fn step_event(&self, step: &str, message: &str, outcome: StepOutcome) {
        let ctx = LogContext::new().with_component(COMPONENT).with_step(step);
        log_step_event(Some(&ctx), "provision.step", message, outcome);
    }
}
