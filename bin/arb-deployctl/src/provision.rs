//! ---
//! arb_section: "06-operator-cli"
//! arb_subsection: "binary"
//! arb_type: "source"
//! arb_scope: "code"
//! arb_description: "Provision and bootstrap commands."
//! arb_version: "v0.1.0"
//! arb_owner: "ops"
//! ---
use anyhow::{Context, Result};
use arb_deploy_common::ConsoleReporter;
use arb_deploy_host::{AptPackageManager, ComposeEngine, HttpKeyFetcher};
use arb_deploy_launcher::ServiceLauncher;
use arb_deploy_logging::{deploy_info, LogContext};
use arb_deploy_provision::RuntimeProvisioner;

use crate::context::DeployContext;

pub fn provision(ctx: &DeployContext) -> Result<()> {
    let packages = AptPackageManager::system();
    let engine = ComposeEngine::system();
    let fetcher = HttpKeyFetcher::new(ctx.config.provision.fetch.timeout)
        .context("unable to prepare the key download client")?;
    let provisioner = RuntimeProvisioner::new(
        &ctx.config.provision,
        &packages,
        &engine,
        &fetcher,
        &ConsoleReporter,
    );
    let report = provisioner
        .run()
        .context("container runtime provisioning failed")?;
    deploy_info!(
        context = LogContext::new().with_component("arb-deployctl").with_step("provision"),
        "provisioning finished (already satisfied: {})",
        report.already_satisfied
    );
    Ok(())
}

pub fn bootstrap(ctx: &DeployContext) -> Result<()> {
    let packages = AptPackageManager::system();
    let engine = ComposeEngine::system();
    let fetcher = HttpKeyFetcher::new(ctx.config.provision.fetch.timeout)
        .context("unable to prepare the key download client")?;
    let provisioner = RuntimeProvisioner::new(
        &ctx.config.provision,
        &packages,
        &engine,
        &fetcher,
        &ConsoleReporter,
    );
    let mut launcher = ServiceLauncher::new(&ctx.config.launcher, &engine, &ConsoleReporter);
    arb_deploy_launcher::bootstrap(&provisioner, &mut launcher).context("bootstrap failed")?;
    Ok(())
}
