//! Locating and reading the RON configuration file
//!
//! Precedence:
//! 1. an explicit `--config` path
//! 2. the `COURIER_CONFIG` environment variable (the file must exist)
//! 3. `./courier.config.ron`
//! 4. `/etc/courier/courier.config.ron`
//!
//! When none of these exist the built-in defaults are used.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use anyhow::Context;
use courier_common::internal;

use crate::Courier;

pub const CONFIG_ENV: &str = "COURIER_CONFIG";

/// Default search locations, in order
pub fn default_paths() -> [PathBuf; 2] {
    [
        PathBuf::from("./courier.config.ron"),
        PathBuf::from("/etc/courier/courier.config.ron"),
    ]
}

/// Pick the configuration file to read, if any
///
/// # Errors
///
/// Returns an error if `from_env` is set but names a file that does not
/// exist.
pub fn locate(from_env: Option<OsString>, candidates: &[PathBuf]) -> anyhow::Result<Option<PathBuf>> {
    if let Some(path) = from_env.map(PathBuf::from) {
        if path.exists() {
            return Ok(Some(path));
        }
        anyhow::bail!(
            "{CONFIG_ENV} points to non-existent file: {}",
            path.display()
        );
    }

    Ok(candidates.iter().find(|path| path.exists()).cloned())
}

/// Read and validate a configuration file
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not valid RON, or fails
/// validation.
pub fn read(path: &Path) -> anyhow::Result<Courier> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;

    let courier = Courier::from_ron(&content)
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;

    Ok(courier)
}

/// Load the configuration following the documented precedence
///
/// # Errors
///
/// Returns an error if the selected file cannot be used.
pub fn load(explicit: Option<&Path>) -> anyhow::Result<Courier> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => locate(std::env::var_os(CONFIG_ENV), &default_paths())?,
    };

    if let Some(path) = path {
        internal!(level = INFO, "Using configuration from {}", path.display());
        read(&path)
    } else {
        internal!(level = INFO, "No configuration file found, using defaults");
        let courier = Courier::default();
        courier.validate()?;
        Ok(courier)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn environment_path_takes_precedence() {
        let mut from_env = tempfile::NamedTempFile::new().unwrap();
        writeln!(from_env, "()").unwrap();
        let fallback = tempfile::NamedTempFile::new().unwrap();

        let found = locate(
            Some(from_env.path().as_os_str().to_owned()),
            &[fallback.path().to_path_buf()],
        )
        .unwrap();

        assert_eq!(found.as_deref(), Some(from_env.path()));
    }

    #[test]
    fn missing_environment_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.ron");

        let err = locate(Some(missing.into_os_string()), &[]).unwrap_err();
        assert!(err.to_string().contains("non-existent file"));
    }

    #[test]
    fn first_existing_candidate_wins() {
        let dir = tempfile::tempdir().unwrap();
        let absent = dir.path().join("absent.ron");
        let present = dir.path().join("present.ron");
        let later = dir.path().join("later.ron");
        std::fs::write(&present, "()").unwrap();
        std::fs::write(&later, "()").unwrap();

        let found = locate(None, &[absent, present.clone(), later]).unwrap();
        assert_eq!(found, Some(present));
    }

    #[test]
    fn nothing_found() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(locate(None, &[dir.path().join("absent.ron")]).unwrap(), None);
    }

    #[test]
    fn unreadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read(&dir.path().join("absent.ron")).unwrap_err();
        assert!(err.to_string().starts_with("Failed to read config from"));
    }
}
