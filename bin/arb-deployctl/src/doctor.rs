//! ---
//! arb_section: "06-operator-cli"
//! arb_subsection: "binary"
//! arb_type: "source"
//! arb_scope: "code"
//! arb_description: "Read-only host and workspace diagnostics."
//! arb_version: "v0.1.0"
//! arb_owner: "ops"
//! ---
use anyhow::Result;
use arb_deploy_common::VersionInfo;
use arb_deploy_host::{AptPackageManager, ComposeEngine, ContainerEngine, PackageManager};
use arb_deploy_launcher::audit_credentials;

use crate::context::DeployContext;

pub fn run(ctx: &DeployContext) -> Result<()> {
    let launcher = &ctx.config.launcher;
    println!("{}", VersionInfo::current().banner());
    match &ctx.source {
        Some(path) => println!("config:       {}", path.display()),
        None => println!("config:       built-in defaults"),
    }
    println!("working dir:  {}", launcher.working_dir.display());

    let env_path = launcher.env_path();
    if env_path.is_file() {
        match audit_credentials(&env_path, &launcher.required_env_keys) {
            Ok(audit) if audit.is_complete() => println!("credentials:  complete"),
            Ok(audit) => println!("credentials:  missing {}", audit.missing.join(", ")),
            Err(err) => println!("credentials:  unreadable ({err})"),
        }
    } else {
        println!(
            "credentials:  {} not found; run `arb-deployctl prepare`",
            env_path.display()
        );
    }

    for path in launcher.state_paths() {
        let state = if path.is_file() {
            "present"
        } else if path.exists() {
            "NOT A FILE"
        } else {
            "missing"
        };
        println!("state file:   {} ({state})", path.display());
    }

    let packages = AptPackageManager::system();
    for package in &ctx.config.provision.runtime_packages {
        let state = match packages.is_installed(package) {
            Ok(true) => "installed".to_owned(),
            Ok(false) => "not installed".to_owned(),
            Err(err) if err.is_not_found() => "unknown (no dpkg on this host)".to_owned(),
            Err(err) => format!("unknown ({err})"),
        };
        println!("package:      {package} ({state})");
    }

    let engine = match ComposeEngine::system().is_available() {
        Ok(true) => "available".to_owned(),
        Ok(false) => "unavailable".to_owned(),
        Err(err) => format!("probe failed ({err})"),
    };
    println!("engine:       {engine}");
    Ok(())
}
