//! ---
//! arb_section: "02-host-capabilities"
//! arb_subsection: "module"
//! arb_type: "source"
//! arb_scope: "code"
//! arb_description: "Host distribution detection from os-release."
//! arb_version: "v0.1.0"
//! arb_owner: "ops"
//! ---
use std::fs;
use std::io;
use std::path::Path;

use arb_deploy_common::kv::parse_assignments;
use indexmap::IndexMap;

/// Parsed `/etc/os-release`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OsRelease {
    fields: IndexMap<String, String>,
}

impl OsRelease {
    pub fn read(path: impl AsRef<Path>) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    pub fn parse(content: &str) -> Self {
        Self {
            fields: parse_assignments(content),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Distribution identifier such as `ubuntu` or `debian`.
    pub fn id(&self) -> Option<&str> {
        self.get("ID")
    }

    /// Release codename used in APT source entries.
    ///
    /// Falls back to `UBUNTU_CODENAME` for derivatives (Mint, Pop!_OS) whose
    /// own codename is unknown to the vendor repository.
    pub fn codename(&self) -> Option<&str> {
        match self.id() {
            Some("ubuntu") | Some("debian") | None => self
                .get("VERSION_CODENAME")
                .or_else(|| self.get("UBUNTU_CODENAME")),
            Some(_) => self
                .get("UBUNTU_CODENAME")
                .or_else(|| self.get("VERSION_CODENAME")),
        }
    }
}
