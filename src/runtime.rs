//! Helpers for locating the directory locald searches for its root
//! configuration file when none is given explicitly on the command line.
use std::{env, path::PathBuf};

/// Name of the root configuration file `locald` looks for in the
/// current directory and its ancestors when `--config` is not given.
pub const DEFAULT_CONFIG_FILENAME: &str = "locald.ini";

/// Walks up from `start` looking for a file named
/// [`DEFAULT_CONFIG_FILENAME`], returning its path if found.
///
/// Mirrors the original implementation's directory-climbing search:
/// starting at the current directory, check for `locald.ini`, and if
/// absent move to the parent, stopping at the filesystem root.
pub fn find_default_config(start: &std::path::Path) -> Option<PathBuf> {
    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(DEFAULT_CONFIG_FILENAME);
        if candidate.exists() {
            return Some(candidate);
        }

        if !dir.pop() {
            return None;
        }
    }
}

/// Returns the current working directory, used as the starting point
/// for [`find_default_config`].
pub fn current_dir() -> std::io::Result<PathBuf> {
    env::current_dir()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn finds_config_in_current_directory() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(DEFAULT_CONFIG_FILENAME);
        std::fs::write(&config_path, "[locald]\n").unwrap();

        let found = find_default_config(dir.path());
        assert_eq!(found, Some(config_path));
    }

    #[test]
    fn finds_config_in_ancestor_directory() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(DEFAULT_CONFIG_FILENAME);
        std::fs::write(&config_path, "[locald]\n").unwrap();

        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let found = find_default_config(&nested);
        assert_eq!(found, Some(config_path));
    }

    #[test]
    fn returns_none_when_absent() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("nowhere");
        std::fs::create_dir_all(&nested).unwrap();
        assert_eq!(find_default_config(&nested), None);
    }
}
