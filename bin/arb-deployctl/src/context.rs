//! ---
//! arb_section: "06-operator-cli"
//! arb_subsection: "binary"
//! arb_type: "source"
//! arb_scope: "code"
//! arb_description: "Configuration resolution for CLI commands."
//! arb_version: "v0.1.0"
//! arb_owner: "ops"
//! ---
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use arb_deploy_common::DeployConfig;

/// Effective configuration for one CLI invocation.
#[derive(Debug)]
pub struct DeployContext {
    pub config: DeployConfig,
    /// File the configuration came from; `None` means built-in defaults.
    pub source: Option<PathBuf>,
}

impl DeployContext {
    /// Resolve configuration: explicit `--config`, then `ARB_DEPLOY_CONFIG`,
    /// then the default search path, then built-in defaults.
    pub fn load(config: Option<&Path>, working_dir: Option<&Path>) -> Result<Self> {
        let (mut config, source) = match config {
            Some(path) => {
                let config = DeployConfig::from_path(path).with_context(|| {
                    format!("unable to load configuration from {}", path.display())
                })?;
                (config, Some(path.to_path_buf()))
            }
            None => {
                let loaded = DeployConfig::load_with_source(&DeployConfig::default_candidates())
                    .context("unable to load configuration")?;
                (loaded.config, loaded.source)
            }
        };
        if let Some(dir) = working_dir {
            config.launcher.working_dir = dir.to_path_buf();
        }
        Ok(Self { config, source })
    }
}
