//! ---
//! arb_section: "01-core-functionality"
//! arb_subsection: "module"
//! arb_type: "source"
//! arb_scope: "code"
//! arb_description: "Shared primitives and utilities for the bootstrap tooling."
//! arb_version: "v0.1.0"
//! arb_owner: "ops"
//! ---
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::logging::LogFormat;

fn default_legacy_packages() -> Vec<String> {
    [
        "docker.io",
        "docker-doc",
        "docker-compose",
        "docker-compose-v2",
        "podman-docker",
        "containerd",
        "runc",
    ]
    .into_iter()
    .map(str::to_owned)
    .collect()
}

fn default_prerequisite_packages() -> Vec<String> {
    vec!["ca-certificates".to_owned(), "curl".to_owned()]
}

fn default_runtime_packages() -> Vec<String> {
    [
        "docker-ce",
        "docker-ce-cli",
        "containerd.io",
        "docker-buildx-plugin",
        "docker-compose-plugin",
    ]
    .into_iter()
    .map(str::to_owned)
    .collect()
}

fn default_keyring_dir() -> PathBuf {
    PathBuf::from("/etc/apt/keyrings")
}

fn default_key_url() -> String {
    "https://download.docker.com/linux/ubuntu/gpg".to_owned()
}

fn default_key_file_name() -> String {
    "docker.asc".to_owned()
}

fn default_repository_url() -> String {
    "https://download.docker.com/linux/ubuntu".to_owned()
}

fn default_channel() -> String {
    "stable".to_owned()
}

fn default_source_list_path() -> PathBuf {
    PathBuf::from("/etc/apt/sources.list.d/docker.list")
}

fn default_os_release_path() -> PathBuf {
    PathBuf::from("/etc/os-release")
}

fn default_fetch_attempts() -> u32 {
    4
}

fn default_fetch_base_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_fetch_jitter() -> Duration {
    Duration::from_millis(250)
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(20)
}

fn default_working_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_compose_file() -> PathBuf {
    PathBuf::from("docker-compose.yml")
}

fn default_service_name() -> String {
    "bot".to_owned()
}

fn default_env_file() -> String {
    ".env".to_owned()
}

fn default_state_files() -> Vec<String> {
    vec![
        "bot_execution.log".to_owned(),
        "active_trades.json".to_owned(),
        "trade_history.csv".to_owned(),
    ]
}

fn default_required_env_keys() -> Vec<String> {
    [
        "BINANCE_API_KEY",
        "BINANCE_SECRET",
        "BYBIT_API_KEY",
        "BYBIT_SECRET",
        "BITGET_API_KEY",
        "BITGET_SECRET",
        "BITGET_PASSPHRASE",
    ]
    .into_iter()
    .map(str::to_owned)
    .collect()
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

/// Errors raised while loading or validating the deployment configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration from {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration at {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("configuration validation failed:\n{details}")]
    Validation { details: String },
}

/// Primary configuration object for the bootstrap tooling.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeployConfig {
    #[serde(default)]
    pub provision: ProvisionConfig,
    #[serde(default)]
    pub launcher: LauncherConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where a [`DeployConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedDeployConfig {
    pub config: DeployConfig,
    /// `None` when no file was found and built-in defaults are in effect.
    pub source: Option<PathBuf>,
}

impl DeployConfig {
    pub const ENV_CONFIG_PATH: &'static str = "ARB_DEPLOY_CONFIG";

    /// Locations inspected when no explicit configuration path is supplied.
    pub fn default_candidates() -> Vec<PathBuf> {
        vec![
            PathBuf::from("arb-deploy.toml"),
            PathBuf::from("/etc/arb-deploy/arb-deploy.toml"),
        ]
    }

    /// Load configuration, respecting the `ARB_DEPLOY_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self, ConfigError> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration together with the effective source path.
    ///
    /// A path named by `ARB_DEPLOY_CONFIG` must exist. Candidates are tried in
    /// order; when none exists the built-in defaults are returned so that a bare
    /// host can be bootstrapped without any file on disk.
    pub fn load_with_source<P: AsRef<Path>>(
        candidates: &[P],
    ) -> Result<LoadedDeployConfig, ConfigError> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedDeployConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        for candidate in candidates {
            let path = candidate.as_ref();
            if path.exists() {
                let config = Self::from_path(path)?;
                return Ok(LoadedDeployConfig {
                    config,
                    source: Some(path.to_path_buf()),
                });
            }
        }

        debug!("no configuration file found; using built-in defaults");
        let config = Self::default();
        config.validate()?;
        Ok(LoadedDeployConfig {
            config,
            source: None,
        })
    }

    /// Load and validate a specific file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str::<DeployConfig>(&contents).map_err(|source| {
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants, reporting every violation at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        self.provision.collect_errors(&mut errors);
        self.launcher.collect_errors(&mut errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation {
                details: errors.join("\n"),
            })
        }
    }
}

impl std::str::FromStr for DeployConfig {
    type Err = ConfigError;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        let config: DeployConfig =
            toml::from_str(content).map_err(|source| ConfigError::Parse {
                path: PathBuf::from("<inline>"),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }
}

/// Host provisioning settings: packages, vendor repository, and key retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionConfig {
    #[serde(default = "default_legacy_packages")]
    pub legacy_packages: Vec<String>,
    #[serde(default = "default_prerequisite_packages")]
    pub prerequisite_packages: Vec<String>,
    #[serde(default = "default_runtime_packages")]
    pub runtime_packages: Vec<String>,
    #[serde(default = "default_keyring_dir")]
    pub keyring_dir: PathBuf,
    #[serde(default = "default_key_url")]
    pub key_url: String,
    #[serde(default = "default_key_file_name")]
    pub key_file_name: String,
    /// Optional hex SHA-256 pin for the downloaded signing key.
    #[serde(default)]
    pub expected_key_sha256: Option<String>,
    #[serde(default = "default_repository_url")]
    pub repository_url: String,
    #[serde(default = "default_channel")]
    pub channel: String,
    #[serde(default = "default_source_list_path")]
    pub source_list_path: PathBuf,
    #[serde(default = "default_os_release_path")]
    pub os_release_path: PathBuf,
    #[serde(default)]
    pub fetch: FetchPolicyConfig,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            legacy_packages: default_legacy_packages(),
            prerequisite_packages: default_prerequisite_packages(),
            runtime_packages: default_runtime_packages(),
            keyring_dir: default_keyring_dir(),
            key_url: default_key_url(),
            key_file_name: default_key_file_name(),
            expected_key_sha256: None,
            repository_url: default_repository_url(),
            channel: default_channel(),
            source_list_path: default_source_list_path(),
            os_release_path: default_os_release_path(),
            fetch: FetchPolicyConfig::default(),
        }
    }
}

impl ProvisionConfig {
    /// Full path of the stored signing key.
    pub fn key_path(&self) -> PathBuf {
        self.keyring_dir.join(&self.key_file_name)
    }

    fn collect_errors(&self, errors: &mut Vec<String>) {
        if self.runtime_packages.is_empty() {
            errors.push("provision.runtime_packages must list at least one package".to_owned());
        }
        for (field, value) in [
            ("provision.key_url", &self.key_url),
            ("provision.repository_url", &self.repository_url),
        ] {
            if let Err(err) = Url::parse(value) {
                errors.push(format!("{field} '{value}' is not a valid URL: {err}"));
            }
        }
        if self.key_file_name.trim().is_empty() || self.key_file_name.contains('/') {
            errors.push(format!(
                "provision.key_file_name '{}' must be a plain file name",
                self.key_file_name
            ));
        }
        if self.channel.trim().is_empty() {
            errors.push("provision.channel may not be empty".to_owned());
        }
        if let Some(pin) = &self.expected_key_sha256 {
            if pin.len() != 64 || !pin.chars().all(|c| c.is_ascii_hexdigit()) {
                errors.push(
                    "provision.expected_key_sha256 must be 64 hexadecimal characters".to_owned(),
                );
            }
        }
        if self.fetch.max_attempts == 0 {
            errors.push("provision.fetch.max_attempts must be at least 1".to_owned());
        }
    }
}

/// Bounded retry policy for the signing-key download.
#[serde_as]
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FetchPolicyConfig {
    #[serde(default = "default_fetch_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_fetch_base_delay", rename = "base_delay_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub base_delay: Duration,
    #[serde(default = "default_fetch_jitter", rename = "jitter_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub jitter: Duration,
    #[serde(default = "default_fetch_timeout", rename = "timeout_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub timeout: Duration,
}

impl Default for FetchPolicyConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_fetch_attempts(),
            base_delay: default_fetch_base_delay(),
            jitter: default_fetch_jitter(),
            timeout: default_fetch_timeout(),
        }
    }
}

/// Settings for the single supervised service and its on-disk artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LauncherConfig {
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,
    #[serde(default = "default_compose_file")]
    pub compose_file: PathBuf,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_env_file")]
    pub env_file: String,
    #[serde(default = "default_state_files")]
    pub state_files: Vec<String>,
    /// Credential keys the bot reads from the env file.
    #[serde(default = "default_required_env_keys")]
    pub required_env_keys: Vec<String>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            working_dir: default_working_dir(),
            compose_file: default_compose_file(),
            project_name: None,
            service_name: default_service_name(),
            env_file: default_env_file(),
            state_files: default_state_files(),
            required_env_keys: default_required_env_keys(),
        }
    }
}

impl LauncherConfig {
    /// Path of the env/secrets file inside the working directory.
    pub fn env_path(&self) -> PathBuf {
        self.working_dir.join(&self.env_file)
    }

    /// Paths of the persisted-state files inside the working directory.
    pub fn state_paths(&self) -> Vec<PathBuf> {
        self.state_files
            .iter()
            .map(|name| self.working_dir.join(name))
            .collect()
    }

    fn collect_errors(&self, errors: &mut Vec<String>) {
        if self.service_name.trim().is_empty() {
            errors.push("launcher.service_name may not be empty".to_owned());
        }
        if let Some(project) = &self.project_name {
            if project.trim().is_empty() {
                errors.push("launcher.project_name may not be blank when set".to_owned());
            }
        }
        if !is_plain_relative(Path::new(&self.env_file)) {
            errors.push(format!(
                "launcher.env_file '{}' must be a relative path inside the working directory",
                self.env_file
            ));
        }
        for name in &self.state_files {
            if !is_plain_relative(Path::new(name)) {
                errors.push(format!(
                    "launcher.state_files entry '{}' must be a relative path inside the working directory",
                    name
                ));
            }
        }
    }
}

fn is_plain_relative(path: &Path) -> bool {
    !path.as_os_str().is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
}

/// Tracing output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory for the rolling JSON log file; console-only when unset.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_validate() {
        let config = DeployConfig::default();
        config.validate().expect("defaults must validate");
        assert_eq!(config.launcher.service_name, "bot");
        assert_eq!(config.launcher.state_files.len(), 3);
        assert_eq!(
            config.provision.key_path(),
            PathBuf::from("/etc/apt/keyrings/docker.asc")
        );
    }

    #[test]
    fn partial_document_keeps_defaults() {
        let config: DeployConfig = r#"
            [launcher]
            service_name = "arb-bot"

            [provision.fetch]
            max_attempts = 2
            base_delay_ms = 10
        "#
        .parse()
        .expect("config parses");
        assert_eq!(config.launcher.service_name, "arb-bot");
        assert_eq!(config.launcher.env_file, ".env");
        assert_eq!(config.provision.fetch.max_attempts, 2);
        assert_eq!(config.provision.fetch.base_delay, Duration::from_millis(10));
        assert_eq!(config.provision.fetch.timeout, Duration::from_secs(20));
    }

    #[test]
    fn validation_reports_every_problem() {
        let mut config = DeployConfig::default();
        config.launcher.state_files.push("../escape.csv".to_owned());
        config.launcher.service_name = " ".to_owned();
        config.provision.expected_key_sha256 = Some("abc".to_owned());
        config.provision.key_url = "not a url".to_owned();

        let err = config.validate().expect_err("invalid config");
        let message = err.to_string();
        assert!(message.contains("../escape.csv"));
        assert!(message.contains("service_name"));
        assert!(message.contains("expected_key_sha256"));
        assert!(message.contains("key_url"));
    }

    #[test]
    fn absolute_env_file_is_rejected() {
        let mut config = DeployConfig::default();
        config.launcher.env_file = "/etc/passwd".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn first_existing_candidate_wins() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        let present = dir.path().join("present.toml");
        fs::write(&present, "[launcher]\nservice_name = \"from-file\"\n").unwrap();

        let loaded = DeployConfig::load_with_source(&[missing, present.clone()]).unwrap();
        assert_eq!(loaded.source.as_deref(), Some(present.as_path()));
        assert_eq!(loaded.config.launcher.service_name, "from-file");
    }

    #[test]
    fn no_candidates_fall_back_to_defaults() {
        let dir = tempdir().unwrap();
        let loaded = DeployConfig::load_with_source(&[dir.path().join("nope.toml")]).unwrap();
        assert!(loaded.source.is_none());
        assert_eq!(loaded.config.launcher.compose_file, default_compose_file());
    }

    #[test]
    fn malformed_file_reports_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[launcher\nservice_name = ").unwrap();
        let err = DeployConfig::load_with_source(&[path]).expect_err("parse failure");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
