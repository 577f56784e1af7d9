//! ---
//! arb_section: "07-testing"
//! arb_subsection: "integration-tests"
//! arb_type: "source"
//! arb_scope: "code"
//! arb_description: "End-to-end provision-then-launch against host doubles."
//! arb_version: "v0.1.0"
//! arb_owner: "ops"
//! ---
use std::fs;
use std::sync::Arc;
use std::time::Duration;

use arb_deploy_common::DeployConfig;
use arb_deploy_host::testing::{
    FakeContainerEngine, FakeKeyFetcher, FakePackageManager, Journal, JournalReporter,
};
use arb_deploy_launcher::{bootstrap, DeployError, LauncherState, ServiceLauncher};
use arb_deploy_provision::{RetryPolicy, RuntimeProvisioner};
use tempfile::{tempdir, TempDir};

struct Fixture {
    root: TempDir,
    config: DeployConfig,
    journal: Journal,
    packages: Arc<FakePackageManager>,
    engine: FakeContainerEngine,
    fetcher: FakeKeyFetcher,
    reporter: JournalReporter,
}

impl Fixture {
    fn bare_host() -> Self {
        let root = tempdir().expect("tempdir");
        let host = root.path().join("host");
        let app = root.path().join("app");
        fs::create_dir_all(&host).unwrap();
        fs::create_dir_all(&app).unwrap();
        fs::write(host.join("os-release"), "ID=debian\nVERSION_CODENAME=bookworm\n").unwrap();

        let mut config = DeployConfig::default();
        config.provision.keyring_dir = host.join("keyrings");
        config.provision.source_list_path = host.join("docker.list");
        config.provision.os_release_path = host.join("os-release");
        config.launcher.working_dir = app;

        let journal = Journal::new();
        let packages = Arc::new(FakePackageManager::new(journal.clone()).with_installed(["docker.io"]));
        let mut mounts = config.launcher.state_paths();
        mounts.push(config.launcher.env_path());
        let engine = FakeContainerEngine::new(journal.clone())
            .available_when_installed(Arc::clone(&packages), "docker-ce")
            .with_mount_sources(mounts);
        let fetcher = FakeKeyFetcher::new(journal.clone(), "-----BEGIN PGP PUBLIC KEY BLOCK-----");
        let reporter = JournalReporter::new(journal.clone());
        Self {
            root,
            config,
            journal,
            packages,
            engine,
            fetcher,
            reporter,
        }
    }

    fn provisioner(&self) -> RuntimeProvisioner<'_> {
        RuntimeProvisioner::new(
            &self.config.provision,
            self.packages.as_ref(),
            &self.engine,
            &self.fetcher,
            &self.reporter,
        )
        .with_retry_policy(RetryPolicy::new(3, Duration::ZERO, Duration::ZERO))
    }

    fn launcher(&self) -> ServiceLauncher<'_> {
        ServiceLauncher::new(&self.config.launcher, &self.engine, &self.reporter)
    }

    fn app_file(&self, name: &str) -> std::path::PathBuf {
        self.root.path().join("app").join(name)
    }
}

#[test]
fn bare_host_ends_with_one_running_service() {
    let fixture = Fixture::bare_host();
    let mut launcher = fixture.launcher();

    let report = bootstrap(&fixture.provisioner(), &mut launcher).expect("bootstrap succeeds");

    assert!(!report.provision.already_satisfied);
    assert!(report.launch.config_created);
    assert_eq!(report.launch.log_command, "docker compose logs -f bot");
    assert_eq!(fixture.engine.instances("bot").len(), 1);
    assert_eq!(launcher.state(), LauncherState::Running);
    for name in [".env", "bot_execution.log", "active_trades.json", "trade_history.csv"] {
        assert_eq!(fs::metadata(fixture.app_file(name)).unwrap().len(), 0, "{name}");
    }
}

#[test]
fn provisioning_completes_before_any_launch_step() {
    let fixture = Fixture::bare_host();
    bootstrap(&fixture.provisioner(), &mut fixture.launcher()).unwrap();

    let journal = &fixture.journal;
    let runtime_installed = journal.position("apt:install docker-ce").unwrap();
    let provisioned = journal.position("milestone:provision-completed").unwrap();
    let config = journal.position("milestone:config-placeholder-created").unwrap();
    let state = journal.position("milestone:state-files-ensured").unwrap();
    let build = journal.position("engine:build").unwrap();
    let start = journal.position("engine:start bot").unwrap();
    let running = journal.position("milestone:service-running").unwrap();
    let hint = journal.position("milestone:log-hint").unwrap();

    let order = [runtime_installed, provisioned, config, state, build, start, running, hint];
    assert!(
        order.windows(2).all(|pair| pair[0] < pair[1]),
        "{:?}",
        journal.entries()
    );
}

#[test]
fn rerun_is_quiet_and_replaces_the_container() {
    let fixture = Fixture::bare_host();
    bootstrap(&fixture.provisioner(), &mut fixture.launcher()).unwrap();
    fs::write(fixture.app_file(".env"), "BINANCE_API_KEY=k\n").unwrap();
    fs::write(fixture.app_file("active_trades.json"), "{}").unwrap();
    let first = fixture.engine.instances("bot");
    let packages = fixture.packages.installed();
    fixture.journal.clear();

    let report = bootstrap(&fixture.provisioner(), &mut fixture.launcher()).unwrap();

    assert!(report.provision.already_satisfied);
    assert!(!report.launch.config_created);
    assert!(report.launch.state_files_created.is_empty());
    assert_eq!(fixture.journal.count("apt:"), 0);
    assert_eq!(fixture.packages.installed(), packages);
    let second = fixture.engine.instances("bot");
    assert_eq!(second.len(), 1);
    assert_ne!(first, second);
    assert_eq!(
        fs::read_to_string(fixture.app_file(".env")).unwrap(),
        "BINANCE_API_KEY=k\n"
    );
    assert_eq!(fs::read_to_string(fixture.app_file("active_trades.json")).unwrap(), "{}");
}

#[test]
fn failed_provisioning_launches_nothing() {
    let fixture = Fixture::bare_host();
    fixture.packages.fail_next_install();

    let err = bootstrap(&fixture.provisioner(), &mut fixture.launcher()).unwrap_err();

    assert!(matches!(err, DeployError::Provisioning(_)), "{err}");
    assert_eq!(err.exit_code(), Some(100));
    assert_eq!(fixture.journal.count("engine:"), 0);
    assert!(!fixture.app_file(".env").exists());
    assert!(!fixture.app_file("bot_execution.log").exists());
}

#[test]
fn build_failure_propagates_engine_status() {
    let fixture = Fixture::bare_host();
    fixture.engine.fail_next_build(17);
    let mut launcher = fixture.launcher();

    let err = bootstrap(&fixture.provisioner(), &mut launcher).unwrap_err();

    assert!(matches!(err, DeployError::Build(_)), "{err}");
    assert_eq!(err.exit_code(), Some(17));
    assert_eq!(fixture.journal.count("milestone:service-running"), 0);
    assert_eq!(fixture.journal.count("milestone:log-hint"), 0);
    assert_ne!(launcher.state(), LauncherState::Running);
}
