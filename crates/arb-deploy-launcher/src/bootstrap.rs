//! ---
//! arb_section: "05-service-launch"
//! arb_subsection: "module"
//! arb_type: "source"
//! arb_scope: "code"
//! arb_description: "Provision-then-launch sequencing."
//! arb_version: "v0.1.0"
//! arb_owner: "ops"
//! ---
use arb_deploy_provision::{ProvisionReport, RuntimeProvisioner};

use crate::{DeployError, LaunchReport, ServiceLauncher};

/// Outcome of a complete bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    pub provision: ProvisionReport,
    pub launch: LaunchReport,
}

/// Provision the runtime, then launch the service. Nothing is launched unless
/// provisioning completed.
pub fn bootstrap(
    provisioner: &RuntimeProvisioner<'_>,
    launcher: &mut ServiceLauncher<'_>,
) -> Result<BootstrapReport, DeployError> {
    let provision = provisioner.run()?;
    let launch = launcher.launch()?;
    Ok(BootstrapReport { provision, launch })
}
