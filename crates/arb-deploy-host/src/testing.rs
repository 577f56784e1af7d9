//! ---
//! arb_section: "02-host-capabilities"
//! arb_subsection: "module"
//! arb_type: "source"
//! arb_scope: "code"
//! arb_description: "In-memory host doubles for exercising bootstrap logic."
//! arb_version: "v0.1.0"
//! arb_owner: "ops"
//! ---
//! Test doubles for every host capability. They share a [`Journal`] so a test
//! can assert on the relative order of package, engine and milestone calls.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use arb_deploy_common::{Milestone, ProgressReporter};
use parking_lot::Mutex;
use url::Url;

use crate::command::{CommandError, CommandOutput, CommandRunner, CommandSpec};
use crate::engine::{ContainerEngine, ServiceDefinition};
use crate::fetch::{FetchError, KeyFetcher};
use crate::packages::PackageManager;

/// Shared, ordered record of calls made against the doubles.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    /// Index of the first entry starting with `prefix`.
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.entries
            .lock()
            .iter()
            .position(|entry| entry.starts_with(prefix))
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|entry| entry.starts_with(prefix))
            .count()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

/// Records milestones as `milestone:<kind>` journal entries.
#[derive(Debug, Clone, Default)]
pub struct JournalReporter {
    journal: Journal,
    milestones: Arc<Mutex<Vec<Milestone>>>,
}

impl JournalReporter {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            milestones: Arc::default(),
        }
    }

    pub fn milestones(&self) -> Vec<Milestone> {
        self.milestones.lock().clone()
    }
}

impl ProgressReporter for JournalReporter {
    fn report(&self, milestone: &Milestone) {
        self.journal.record(format!("milestone:{}", milestone.kind()));
        self.milestones.lock().push(milestone.clone());
    }
}

/// [`CommandRunner`] that records specs and replays scripted results.
///
/// Captured calls pop queued outputs, defaulting to a silent success. Streamed
/// calls succeed unless [`ScriptedRunner::fail_next_stream`] was used.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    calls: Mutex<Vec<CommandSpec>>,
    outputs: Mutex<VecDeque<CommandOutput>>,
    stream_failures: Mutex<VecDeque<Option<i32>>>,
    streamed: Mutex<usize>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_output(&self, output: CommandOutput) {
        self.outputs.lock().push_back(output);
    }

    pub fn fail_next_stream(&self, code: Option<i32>) {
        self.stream_failures.lock().push_back(code);
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().clone()
    }

    pub fn streamed(&self) -> usize {
        *self.streamed.lock()
    }
}

impl CommandRunner for ScriptedRunner {
    fn capture(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        self.calls.lock().push(spec.clone());
        Ok(self.outputs.lock().pop_front().unwrap_or(CommandOutput {
            code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
        }))
    }

    fn stream(&self, spec: &CommandSpec) -> Result<(), CommandError> {
        self.calls.lock().push(spec.clone());
        *self.streamed.lock() += 1;
        match self.stream_failures.lock().pop_front() {
            Some(code) => Err(CommandError::Failed {
                command: spec.to_string(),
                code,
                stderr: String::new(),
            }),
            None => Ok(()),
        }
    }
}

/// Package database held in memory.
#[derive(Debug)]
pub struct FakePackageManager {
    journal: Journal,
    installed: Mutex<BTreeSet<String>>,
    architecture: String,
    fail_install: Mutex<Option<i32>>,
}

impl FakePackageManager {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            installed: Mutex::default(),
            architecture: "amd64".to_owned(),
            fail_install: Mutex::default(),
        }
    }

    pub fn with_installed<I, S>(self, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.installed
            .lock()
            .extend(packages.into_iter().map(Into::into));
        self
    }

    pub fn with_architecture(mut self, architecture: impl Into<String>) -> Self {
        self.architecture = architecture.into();
        self
    }

    /// Make the next `install` fail like a held dpkg lock (`apt-get` exit 100).
    pub fn fail_next_install(&self) {
        *self.fail_install.lock() = Some(100);
    }

    pub fn installed(&self) -> BTreeSet<String> {
        self.installed.lock().clone()
    }
}

impl PackageManager for FakePackageManager {
    fn is_installed(&self, package: &str) -> Result<bool, CommandError> {
        Ok(self.installed.lock().contains(package))
    }

    fn refresh(&self) -> Result<(), CommandError> {
        self.journal.record("apt:refresh");
        Ok(())
    }

    fn install(&self, packages: &[String]) -> Result<(), CommandError> {
        if let Some(code) = self.fail_install.lock().take() {
            self.journal.record("apt:install-failed");
            return Err(CommandError::Failed {
                command: format!("apt-get install -y {}", packages.join(" ")),
                code: Some(code),
                stderr: "E: Could not get lock /var/lib/dpkg/lock-frontend".to_owned(),
            });
        }
        self.journal.record(format!("apt:install {}", packages.join(" ")));
        self.installed.lock().extend(packages.iter().cloned());
        Ok(())
    }

    fn remove(&self, packages: &[String]) -> Result<(), CommandError> {
        self.journal.record(format!("apt:remove {}", packages.join(" ")));
        let mut installed = self.installed.lock();
        for package in packages {
            installed.remove(package);
        }
        Ok(())
    }

    fn architecture(&self) -> Result<String, CommandError> {
        Ok(self.architecture.clone())
    }
}

/// Container engine that tracks running instances per service name.
///
/// `start` replaces whatever runs under the same name. Optional mount sources
/// mimic bind mounts: a missing source fails `start` the way the real engine
/// does.
#[derive(Debug)]
pub struct FakeContainerEngine {
    journal: Journal,
    available: Mutex<bool>,
    packages_gate: Option<(Arc<FakePackageManager>, String)>,
    instances: Mutex<BTreeMap<String, Vec<String>>>,
    next_id: Mutex<u32>,
    mount_sources: Vec<PathBuf>,
    fail_build: Mutex<Option<i32>>,
    fail_start: Mutex<Option<i32>>,
}

impl FakeContainerEngine {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            available: Mutex::new(true),
            packages_gate: None,
            instances: Mutex::default(),
            next_id: Mutex::new(1),
            mount_sources: Vec::new(),
            fail_build: Mutex::default(),
            fail_start: Mutex::default(),
        }
    }

    pub fn unavailable(self) -> Self {
        *self.available.lock() = false;
        self
    }

    /// Report availability only once `package` is installed in `packages`.
    pub fn available_when_installed(
        mut self,
        packages: Arc<FakePackageManager>,
        package: impl Into<String>,
    ) -> Self {
        self.packages_gate = Some((packages, package.into()));
        self
    }

    pub fn with_mount_sources(mut self, paths: Vec<PathBuf>) -> Self {
        self.mount_sources = paths;
        self
    }

    pub fn fail_next_build(&self, code: i32) {
        *self.fail_build.lock() = Some(code);
    }

    pub fn fail_next_start(&self, code: i32) {
        *self.fail_start.lock() = Some(code);
    }

    pub fn instances(&self, service: &str) -> Vec<String> {
        self.instances
            .lock()
            .get(service)
            .cloned()
            .unwrap_or_default()
    }
}

impl ContainerEngine for FakeContainerEngine {
    fn is_available(&self) -> Result<bool, CommandError> {
        if let Some((packages, package)) = &self.packages_gate {
            return packages.is_installed(package);
        }
        Ok(*self.available.lock())
    }

    fn build(&self, service: &ServiceDefinition) -> Result<(), CommandError> {
        if let Some(code) = self.fail_build.lock().take() {
            self.journal.record(format!("engine:build-failed {}", service.service_name));
            return Err(CommandError::Failed {
                command: format!("docker compose build {}", service.service_name),
                code: Some(code),
                stderr: "failed to solve: process \"pip install -r requirements.txt\" did not complete successfully".to_owned(),
            });
        }
        self.journal.record(format!("engine:build {}", service.service_name));
        Ok(())
    }

    fn start(&self, service: &ServiceDefinition) -> Result<(), CommandError> {
        if let Some(code) = self.fail_start.lock().take() {
            self.journal.record(format!("engine:start-failed {}", service.service_name));
            return Err(CommandError::Failed {
                command: format!("docker compose up --detach {}", service.service_name),
                code: Some(code),
                stderr: "Bind for 0.0.0.0:8080 failed: port is already allocated".to_owned(),
            });
        }
        if let Some(missing) = self.mount_sources.iter().find(|path| !path.is_file()) {
            self.journal.record(format!("engine:start-failed {}", service.service_name));
            return Err(CommandError::Failed {
                command: format!("docker compose up --detach {}", service.service_name),
                code: Some(1),
                stderr: format!("invalid mount config: bind source path does not exist: {}", missing.display()),
            });
        }
        let id = {
            let mut next = self.next_id.lock();
            let id = format!("{}-{}", service.service_name, *next);
            *next += 1;
            id
        };
        self.journal.record(format!("engine:start {}", service.service_name));
        self.instances
            .lock()
            .insert(service.service_name.clone(), vec![id]);
        Ok(())
    }

    fn running_instances(&self, service: &ServiceDefinition) -> Result<Vec<String>, CommandError> {
        Ok(self.instances(&service.service_name))
    }

    fn log_follow_command(&self, service: &ServiceDefinition) -> String {
        format!("docker compose logs -f {}", service.service_name)
    }

    fn follow_logs(&self, service: &ServiceDefinition) -> Result<(), CommandError> {
        self.journal.record(format!("engine:logs {}", service.service_name));
        Ok(())
    }
}

/// Key fetcher replaying a scripted sequence of results.
#[derive(Debug)]
pub struct FakeKeyFetcher {
    journal: Journal,
    responses: Mutex<VecDeque<Result<Vec<u8>, u16>>>,
    fallback: Vec<u8>,
}

impl FakeKeyFetcher {
    /// Always answers with `key` once scripted responses run out.
    pub fn new(journal: Journal, key: impl Into<Vec<u8>>) -> Self {
        Self {
            journal,
            responses: Mutex::default(),
            fallback: key.into(),
        }
    }

    /// Queue an HTTP error status for the next fetch.
    pub fn fail_with_status(&self, status: u16) {
        self.responses.lock().push_back(Err(status));
    }
}

impl KeyFetcher for FakeKeyFetcher {
    fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        self.journal.record(format!("fetch:{url}"));
        match self.responses.lock().pop_front() {
            Some(Ok(body)) => Ok(body),
            Some(Err(status)) => Err(FetchError::Status {
                url: url.to_string(),
                status,
            }),
            None => Ok(self.fallback.clone()),
        }
    }
}
