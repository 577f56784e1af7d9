//! ---
//! arb_section: "01-core-functionality"
//! arb_subsection: "module"
//! arb_type: "source"
//! arb_scope: "code"
//! arb_description: "Shared primitives and utilities for the bootstrap tooling."
//! arb_version: "v0.1.0"
//! arb_owner: "ops"
//! ---
use serde::Serialize;

/// Build metadata reported by `--version`.
#[derive(Debug, Clone, Serialize)]
pub struct VersionInfo {
    /// Workspace semantic version.
    pub semver: String,
    /// Host architecture and operating system the binary was compiled for.
    pub target: String,
    /// Cargo profile used during compilation.
    pub profile: String,
}

impl VersionInfo {
    #[must_use]
    pub fn current() -> Self {
        Self {
            semver: env!("CARGO_PKG_VERSION").to_owned(),
            target: format!("{}-{}", std::env::consts::ARCH, std::env::consts::OS),
            profile: if cfg!(debug_assertions) {
                "debug".to_owned()
            } else {
                "release".to_owned()
            },
        }
    }

    /// Human readable banner used in logging surfaces.
    #[must_use]
    pub fn banner(&self) -> String {
        format!("arb-deploy v{}", self.semver)
    }

    /// Extended string containing build metadata suitable for `--version` flags.
    #[must_use]
    pub fn extended(&self) -> String {
        format!(
            "{banner}\nTarget: {target}\nProfile: {profile}",
            banner = self.banner(),
            target = self.target,
            profile = self.profile
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extended_contains_semver() {
        let info = VersionInfo::current();
        let extended = info.extended();
        assert!(extended.contains(&info.semver));
        assert!(extended.starts_with("arb-deploy v"));
    }
}
