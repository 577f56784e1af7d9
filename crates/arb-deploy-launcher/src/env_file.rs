//! ---
//! arb_section: "05-service-launch"
//! arb_subsection: "module"
//! arb_type: "source"
//! arb_scope: "code"
//! arb_description: "Credential audit of the service env file."
//! arb_version: "v0.1.0"
//! arb_owner: "ops"
//! ---
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use arb_deploy_common::kv::parse_assignments;

/// Result of checking the env file for the credentials the bot reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialAudit {
    pub path: PathBuf,
    /// Required keys that are absent or have an empty value, in required order.
    pub missing: Vec<String>,
}

impl CredentialAudit {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Read `path` and report which of `required` lack a value. Values are never logged.
pub fn audit_credentials(path: &Path, required: &[String]) -> io::Result<CredentialAudit> {
    let content = fs::read_to_string(path)?;
    Ok(audit_content(path, &content, required))
}

fn audit_content(path: &Path, content: &str, required: &[String]) -> CredentialAudit {
    let assignments = parse_assignments(content);
    let missing = required
        .iter()
        .filter(|key| {
            assignments
                .get(key.as_str())
                .map_or(true, |value| value.trim().is_empty())
        })
        .cloned()
        .collect();
    CredentialAudit {
        path: path.to_path_buf(),
        missing,
    }
}
