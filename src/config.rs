//! Configured defaults for recurring command line options.
//!
//! ghclass reads an optional TOML file, by default at
//! `<config dir>/ghclass/config.toml` and overridable through the
//! `GHCLASS_CONFIG` environment variable:
//!
//! ```toml
//! [defaults]
//! org_name = "cs101-2026"
//! github_base_url = "https://some.enterprise.host/api/v3"
//! user = "ta-bot"
//! students_file = "/home/teacher/students.txt"
//! ```
//!
//! An option with a configured default becomes optional on the command line
//! and is pre-filled with the configured value.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::errors::{GhclassError, Result};

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    defaults: Defaults,
}

/// Default values for the recurring command line options. A `None` field
/// means the corresponding option is mandatory on the command line.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Defaults {
    pub org_name: Option<String>,
    pub github_base_url: Option<String>,
    pub user: Option<String>,
    pub students_file: Option<String>,
}

/// The standard config file location.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("ghclass").join("config.toml"))
}

impl Defaults {
    /// Load defaults from `GHCLASS_CONFIG` if set, falling back to the
    /// standard location. A missing file means no defaults, which makes
    /// every recurring option mandatory.
    pub fn load() -> Result<Self> {
        let path = match std::env::var_os("GHCLASS_CONFIG") {
            Some(p) => PathBuf::from(p),
            None => match config_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };
        if path.is_file() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load defaults from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GhclassError::File(format!(
                "could not read config file '{}': {e}",
                path.display()
            ))
        })?;
        let config: ConfigFile = toml::from_str(&content).map_err(|e| {
            GhclassError::File(format!("invalid config file '{}': {e}", path.display()))
        })?;
        Ok(config.defaults)
    }

    /// Look up the configured default for a recognized option name.
    pub fn value(&self, name: &str) -> Option<&str> {
        match name {
            "org_name" => self.org_name.as_deref(),
            "github_base_url" => self.github_base_url.as_deref(),
            "user" => self.user.as_deref(),
            "students_file" => self.students_file.as_deref(),
            _ => None,
        }
    }

    /// An option is required exactly when it has no configured default.
    pub fn is_required(&self, name: &str) -> bool {
        self.value(name).is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_means_everything_required() {
        let defaults = Defaults::default();
        for name in ["org_name", "github_base_url", "user", "students_file"] {
            assert!(defaults.is_required(name));
        }
    }

    #[test]
    fn configured_values_make_options_optional() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            [defaults]
            org_name = "cs101-2026"
            user = "ta-bot"
            "#,
        )
        .unwrap();

        let defaults = Defaults::load_from(&path).unwrap();
        assert_eq!(defaults.value("org_name"), Some("cs101-2026"));
        assert_eq!(defaults.value("user"), Some("ta-bot"));
        assert!(!defaults.is_required("org_name"));
        assert!(defaults.is_required("github_base_url"));
        assert!(defaults.is_required("students_file"));
    }

    #[test]
    fn empty_file_parses_to_empty_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "").unwrap();

        let defaults = Defaults::load_from(&path).unwrap();
        assert!(defaults.is_required("org_name"));
    }

    #[test]
    fn malformed_toml_is_a_file_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[defaults\norg_name = ").unwrap();

        assert!(matches!(
            Defaults::load_from(&path),
            Err(GhclassError::File(_))
        ));
    }

    #[test]
    fn unrecognized_names_are_always_required() {
        let defaults = Defaults {
            org_name: Some("x".to_string()),
            ..Defaults::default()
        };
        assert!(defaults.is_required("no_such_option"));
    }
}
