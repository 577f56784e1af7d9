//! ---
//! arb_section: "05-service-launch"
//! arb_subsection: "module"
//! arb_type: "source"
//! arb_scope: "code"
//! arb_description: "Launch and bootstrap error taxonomy."
//! arb_version: "v0.1.0"
//! arb_owner: "ops"
//! ---
use std::io;
use std::path::PathBuf;

use arb_deploy_host::CommandError;
use arb_deploy_provision::ProvisioningError;
use thiserror::Error;

/// The config or a state file could not be put in place.
#[derive(Debug, Error)]
pub enum PreconditionError {
    #[error("cannot prepare {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{path:?} exists but is not a regular file; remove it and re-run")]
    NotAFile { path: PathBuf },
}

/// The image build failed. The engine's own diagnostic is the source.
#[derive(Debug, Error)]
#[error("building service '{service}' failed")]
pub struct BuildError {
    pub service: String,
    #[source]
    pub source: CommandError,
}

/// The container could not be started.
#[derive(Debug, Error)]
#[error("starting service '{service}' failed")]
pub struct StartError {
    pub service: String,
    #[source]
    pub source: CommandError,
}

/// Any fatal launcher failure.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error(transparent)]
    Precondition(#[from] PreconditionError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Start(#[from] StartError),
}

impl LaunchError {
    /// Exit status of the engine command that failed, if any.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            LaunchError::Precondition(_) => None,
            LaunchError::Build(err) => err.source.exit_code(),
            LaunchError::Start(err) => err.source.exit_code(),
        }
    }
}

/// Any fatal failure across a full bootstrap.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error(transparent)]
    Provisioning(#[from] ProvisioningError),
    #[error(transparent)]
    Precondition(#[from] PreconditionError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Start(#[from] StartError),
}

impl DeployError {
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            DeployError::Provisioning(err) => err.exit_code(),
            DeployError::Precondition(_) => None,
            DeployError::Build(err) => err.source.exit_code(),
            DeployError::Start(err) => err.source.exit_code(),
        }
    }
}

impl From<LaunchError> for DeployError {
    fn from(err: LaunchError) -> Self {
        match err {
            LaunchError::Precondition(err) => DeployError::Precondition(err),
            LaunchError::Build(err) => DeployError::Build(err),
            LaunchError::Start(err) => DeployError::Start(err),
        }
    }
}
