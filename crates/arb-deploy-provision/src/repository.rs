//! ---
//! arb_section: "04-provisioning"
//! arb_subsection: "module"
//! arb_type: "source"
//! arb_scope: "code"
//! arb_description: "Signing key and APT source entry persistence."
//! arb_version: "v0.1.0"
//! arb_owner: "ops"
//! ---
//! On-disk half of repository registration. The key and the source entry are
//! checked independently so a run interrupted between the two converges on
//! the next attempt.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

/// Render the single source entry line for the vendor repository.
pub fn source_entry(
    architecture: &str,
    key_path: &Path,
    repository_url: &str,
    codename: &str,
    channel: &str,
) -> String {
    format!(
        "deb [arch={architecture} signed-by={}] {} {codename} {channel}",
        key_path.display(),
        repository_url.trim_end_matches('/'),
    )
}

/// Whether a usable key is already stored. A zero-length file left behind by
/// an interrupted download counts as absent.
pub fn key_present(path: &Path) -> io::Result<bool> {
    match fs::metadata(path) {
        Ok(meta) => Ok(meta.is_file() && meta.len() > 0),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Compare `bytes` against an optional pin, returning the actual digest on mismatch.
pub fn verify_pin(bytes: &[u8], expected: Option<&str>) -> Result<(), String> {
    match expected {
        None => Ok(()),
        Some(expected) => {
            let actual = sha256_hex(bytes);
            if actual.eq_ignore_ascii_case(expected.trim()) {
                Ok(())
            } else {
                Err(actual)
            }
        }
    }
}

/// Write `contents` next to `path` and rename it into place, world-readable.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staged = NamedTempFile::new_in(dir)?;
    staged.write_all(contents)?;
    staged.as_file().sync_all()?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        staged
            .as_file()
            .set_permissions(fs::Permissions::from_mode(0o644))?;
    }
    staged.persist(path).map_err(|err| err.error)?;
    Ok(())
}

/// Ensure the source list holds exactly `entry`. Returns `true` when the file
/// was (re)written and `false` when it already matched.
pub fn write_source_entry(path: &Path, entry: &str) -> io::Result<bool> {
    let expected = format!("{entry}\n");
    match fs::read_to_string(path) {
        Ok(current) if current == expected => return Ok(false),
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    write_atomic(path, expected.as_bytes())?;
    Ok(true)
}
