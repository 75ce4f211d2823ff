//! Application paths for config, captured sessions, and exports.

use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Application paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    /// Configuration directory.
    pub config: PathBuf,
    /// Data directory.
    pub data: PathBuf,
}

impl AppPaths {
    /// Create paths for the autocost application.
    #[must_use]
    pub fn new() -> Self {
        if let Some(proj_dirs) = ProjectDirs::from("dev", "autocost", "autocost") {
            Self {
                config: proj_dirs.config_dir().to_path_buf(),
                data: proj_dirs.data_dir().to_path_buf(),
            }
        } else {
            let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
            Self::under(&home)
        }
    }

    /// Paths rooted at `root` using the XDG layout (used for tests and fallbacks).
    #[must_use]
    pub fn under(root: &Path) -> Self {
        Self {
            config: root.join(".config/autocost"),
            data: root.join(".local/share/autocost"),
        }
    }

    /// Default config file.
    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        self.config.join("config.toml")
    }

    /// Directory for captured session snapshots.
    #[must_use]
    pub fn sessions_dir(&self) -> PathBuf {
        self.data.join("sessions")
    }

    /// Default root of billing exports.
    #[must_use]
    pub fn exports_dir(&self) -> PathBuf {
        self.data.join("exports")
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether `name` can be joined onto a directory without leaving it.
#[must_use]
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\', '\0'])
}

mod dirs {
    use std::path::PathBuf;

    pub fn home_dir() -> Option<PathBuf> {
        directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn under_root_layout() {
        let paths = AppPaths::under(Path::new("/tmp/home"));
        assert_eq!(
            paths.config_file(),
            PathBuf::from("/tmp/home/.config/autocost/config.toml")
        );
        assert_eq!(
            paths.sessions_dir(),
            PathBuf::from("/tmp/home/.local/share/autocost/sessions")
        );
        assert!(paths.exports_dir().ends_with("exports"));
    }

    #[test]
    fn plain_file_names() {
        assert!(is_plain_file_name("costs"));
        assert!(is_plain_file_name("my-profile.v2"));
        for name in ["", ".", "..", "../x", "a/b", "a\\b"] {
            assert!(!is_plain_file_name(name), "{name:?}");
        }
    }
}
