//! ---
//! arb_section: "02-host-capabilities"
//! arb_subsection: "module"
//! arb_type: "source"
//! arb_scope: "code"
//! arb_description: "System package manager capability."
//! arb_version: "v0.1.0"
//! arb_owner: "ops"
//! ---
use crate::command::{CommandError, CommandRunner, CommandSpec, SystemCommandRunner};

/// Host package database operations needed by the provisioner.
pub trait PackageManager {
    /// Whether `package` is fully installed.
    fn is_installed(&self, package: &str) -> Result<bool, CommandError>;
    /// Refresh the package index.
    fn refresh(&self) -> Result<(), CommandError>;
    /// Install packages; already-installed packages are left alone.
    fn install(&self, packages: &[String]) -> Result<(), CommandError>;
    /// Remove packages.
    fn remove(&self, packages: &[String]) -> Result<(), CommandError>;
    /// Native package architecture, e.g. `amd64` or `arm64`.
    fn architecture(&self) -> Result<String, CommandError>;
}

/// [`PackageManager`] backed by `apt-get` and `dpkg`.
#[derive(Debug, Default, Clone)]
pub struct AptPackageManager<R = SystemCommandRunner> {
    runner: R,
}

impl AptPackageManager<SystemCommandRunner> {
    pub fn system() -> Self {
        Self::new(SystemCommandRunner)
    }
}

impl<R: CommandRunner> AptPackageManager<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    fn apt_get(&self) -> CommandSpec {
        CommandSpec::new("apt-get").env("DEBIAN_FRONTEND", "noninteractive")
    }
}

impl<R: CommandRunner> PackageManager for AptPackageManager<R> {
    fn is_installed(&self, package: &str) -> Result<bool, CommandError> {
        let spec = CommandSpec::new("dpkg-query")
            .args(["-W", "-f=${Status}"])
            .arg(package);
        // dpkg-query exits non-zero for packages it has never heard of.
        let output = self.runner.capture(&spec)?;
        Ok(output.success() && output.stdout.trim_end().ends_with("install ok installed"))
    }

    fn refresh(&self) -> Result<(), CommandError> {
        self.runner.stream(&self.apt_get().arg("update"))
    }

    fn install(&self, packages: &[String]) -> Result<(), CommandError> {
        if packages.is_empty() {
            return Ok(());
        }
        let spec = self.apt_get().args(["install", "-y"]).args(packages.iter().cloned());
        self.runner.stream(&spec)
    }

    fn remove(&self, packages: &[String]) -> Result<(), CommandError> {
        if packages.is_empty() {
            return Ok(());
        }
        let spec = self.apt_get().args(["remove", "-y"]).args(packages.iter().cloned());
        self.runner.stream(&spec)
    }

    fn architecture(&self) -> Result<String, CommandError> {
        let spec = CommandSpec::new("dpkg").arg("--print-architecture");
        let output = self.runner.run(&spec)?;
        Ok(output.stdout.trim().to_owned())
    }
}
