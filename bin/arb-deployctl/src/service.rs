//! ---
//! arb_section: "06-operator-cli"
//! arb_subsection: "binary"
//! arb_type: "source"
//! arb_scope: "code"
//! arb_description: "Service preparation, launch and observation commands."
//! arb_version: "v0.1.0"
//! arb_owner: "ops"
//! ---
use anyhow::{Context, Result};
use arb_deploy_common::ConsoleReporter;
use arb_deploy_host::{ComposeEngine, ContainerEngine};
use arb_deploy_launcher::ServiceLauncher;

use crate::context::DeployContext;

pub fn prepare(ctx: &DeployContext) -> Result<()> {
    let engine = ComposeEngine::system();
    let mut launcher = ServiceLauncher::new(&ctx.config.launcher, &engine, &ConsoleReporter);
    launcher
        .check_preconditions()
        .context("unable to prepare the service files")?;
    Ok(())
}

pub fn launch(ctx: &DeployContext) -> Result<()> {
    let engine = ComposeEngine::system();
    let mut launcher = ServiceLauncher::new(&ctx.config.launcher, &engine, &ConsoleReporter);
    launcher.launch().context("service launch failed")?;
    Ok(())
}

pub fn status(ctx: &DeployContext) -> Result<()> {
    let engine = ComposeEngine::system();
    let launcher = ServiceLauncher::new(&ctx.config.launcher, &engine, &ConsoleReporter);
    let instances = engine
        .running_instances(launcher.service())
        .context("unable to query running containers")?;
    let service = &launcher.service().service_name;
    if instances.is_empty() {
        println!("Service '{service}' has no running containers.");
    } else {
        println!("Service '{service}' running as: {}", instances.join(", "));
    }
    launcher.report_status();
    Ok(())
}

pub fn logs(ctx: &DeployContext) -> Result<()> {
    let engine = ComposeEngine::system();
    let service = arb_deploy_host::ServiceDefinition::from_config(&ctx.config.launcher);
    engine
        .follow_logs(&service)
        .with_context(|| format!("unable to follow logs for '{}'", service.service_name))
}
