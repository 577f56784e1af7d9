//! ---
//! arb_section: "02-host-capabilities"
//! arb_subsection: "module"
//! arb_type: "source"
//! arb_scope: "code"
//! arb_description: "Host capability traits and their system-backed adapters."
//! arb_version: "v0.1.0"
//! arb_owner: "ops"
//! ---
//! Capabilities the bootstrap drives on the host: process execution, the
//! system package manager, the container engine and signing-key downloads.
//! Each is a trait so provisioning and launch logic can run against the
//! doubles in [`testing`].

pub mod command;
pub mod engine;
pub mod fetch;
pub mod os_release;
pub mod packages;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use command::{CommandError, CommandOutput, CommandRunner, CommandSpec, SystemCommandRunner};
pub use engine::{ComposeEngine, ContainerEngine, ServiceDefinition};
pub use fetch::{FetchError, HttpKeyFetcher, KeyFetcher};
pub use os_release::OsRelease;
pub use packages::{AptPackageManager, PackageManager};
