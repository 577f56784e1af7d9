//! ---
//! arb_section: "05-service-launch"
//! arb_subsection: "module"
//! arb_type: "source"
//! arb_scope: "code"
//! arb_description: "Create-if-absent handling for config and state files."
//! arb_version: "v0.1.0"
//! arb_owner: "ops"
//! ---
use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;

use crate::error::PreconditionError;

/// What [`create_if_absent`] found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactStatus {
    /// The file did not exist and was created empty.
    Created,
    /// A regular file was already there; it was not opened for writing.
    Present,
}

/// Create `path` as an empty file unless something already exists there.
///
/// The existence check and the creation are one `create_new` open, so
/// existing content is never truncated. A directory at `path` is rejected:
/// bind-mounting it would hand the service a directory where it expects a file.
pub fn create_if_absent(path: &Path) -> Result<ArtifactStatus, PreconditionError> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(_) => Ok(ArtifactStatus::Created),
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
            let meta = fs::metadata(path).map_err(|source| PreconditionError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            if meta.is_file() {
                Ok(ArtifactStatus::Present)
            } else {
                Err(PreconditionError::NotAFile {
                    path: path.to_path_buf(),
                })
            }
        }
        Err(source) => Err(PreconditionError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn creates_missing_file_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("active_trades.json");
        assert_eq!(create_if_absent(&path).unwrap(), ArtifactStatus::Created);
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn existing_content_is_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trade_history.csv");
        fs::write(&path, "ts,pair,pnl\n1,BTC/USDT,0.4\n").unwrap();
        assert_eq!(create_if_absent(&path).unwrap(), ArtifactStatus::Present);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "ts,pair,pnl\n1,BTC/USDT,0.4\n"
        );
    }

    #[test]
    fn directory_in_place_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bot_execution.log");
        fs::create_dir(&path).unwrap();
        let err = create_if_absent(&path).unwrap_err();
        assert!(matches!(err, PreconditionError::NotAFile { .. }), "{err}");
    }

    #[test]
    fn missing_parent_is_io_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent").join(".env");
        assert!(matches!(
            create_if_absent(&path).unwrap_err(),
            PreconditionError::Io { .. }
        ));
    }
}
