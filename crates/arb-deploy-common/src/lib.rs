//! ---
//! arb_section: "01-core-functionality"
//! arb_subsection: "module"
//! arb_type: "source"
//! arb_scope: "code"
//! arb_description: "Shared primitives and utilities for the bootstrap tooling."
//! arb_version: "v0.1.0"
//! arb_owner: "ops"
//! ---
//! Core shared primitives for the arb-deploy workspace.
//! This crate exposes configuration loading, tracing setup, milestone
//! reporting, and version metadata consumed by the provisioner, the
//! launcher, and the operator CLI.

pub mod config;
pub mod kv;
pub mod logging;
pub mod progress;
pub mod version;

pub use config::{
    ConfigError, DeployConfig, FetchPolicyConfig, LauncherConfig, LoadedDeployConfig,
    LoggingConfig, ProvisionConfig,
};
pub use logging::{init_tracing, LogFormat, TracingGuard};
pub use progress::{ConsoleReporter, Milestone, MilestoneSeverity, ProgressReporter, SilentReporter};
pub use version::VersionInfo;
