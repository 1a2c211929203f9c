//! Suite inputs and persistent tuning.
//!
//! Two kinds of configuration feed a test run:
//!
//! - [`SuiteConfig`]: what the scenarios operate on, read once from the
//!   environment (`SQUISH_VSTOOLS_QTDIRS`, `SQUISH_VSTOOLS_WORKDIR`,
//!   `SQUISH_VSTOOLS_VERSION`).
//! - [`VsuiConfig`]: timing knobs stored in `~/.vsui/config.json`.
//!
//! # Example
//!
//! ```no_run
//! use vsui_core::config::{SuiteConfig, VsuiConfig};
//!
//! let suite = SuiteConfig::from_env().expect("bad environment");
//! if suite.qt_installations.is_empty() {
//!     eprintln!("No Qt versions known");
//! }
//!
//! // Defaults when the file is missing
//! let tuning = VsuiConfig::load();
//! let wait = tuning.wait_options();
//! # let _ = wait;
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::retry::RetryOptions;
use crate::wait::{WaitOptions, DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT};

pub const QT_DIRS_VAR: &str = "SQUISH_VSTOOLS_QTDIRS";
pub const WORKDIR_VAR: &str = "SQUISH_VSTOOLS_WORKDIR";
pub const VERSION_VAR: &str = "SQUISH_VSTOOLS_VERSION";

const CONFIG_DIR: &str = ".vsui";
const CONFIG_FILENAME: &str = "config.json";

/// Errors from reading suite configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{var}: empty Qt installation entry at position {index}")]
    EmptyEntry { var: &'static str, index: usize },

    #[error("{var}: Qt installation at '{path}' has no name")]
    EmptyName { var: &'static str, path: String },

    #[error("{var}: Qt installation '{name}' has no path")]
    MissingPath { var: &'static str, name: String },

    #[error("{var}: duplicate Qt installation name '{name}'")]
    DuplicateName { var: &'static str, name: String },

    #[error("{var}: '{value}' is not a version number")]
    InvalidVersion { var: &'static str, value: String },

    #[error("{var}: value is not valid Unicode")]
    NotUnicode { var: &'static str },
}

/// A Qt version registered by the configuration scenarios.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QtInstallation {
    pub name: String,
    pub path: PathBuf,
}

impl QtInstallation {
    /// Parses `name=path` or a bare path.
    ///
    /// A bare path is named after its last two components, so
    /// `C:\Qt\6.5.3\msvc2019_64` becomes `6.5.3_msvc2019_64`.
    fn parse(entry: &str) -> Option<Self> {
        if let Some((name, path)) = entry.split_once('=') {
            return Some(Self {
                name: name.trim().to_string(),
                path: PathBuf::from(path.trim()),
            });
        }
        let path = entry.trim();
        let parts: Vec<&str> = path
            .split(['/', '\\'])
            .filter(|p| !p.is_empty())
            .collect();
        let name = match parts.as_slice() {
            [] => return None,
            [only] => only.to_string(),
            [.., parent, last] => format!("{parent}_{last}"),
        };
        Some(Self {
            name,
            path: PathBuf::from(path),
        })
    }
}

/// Inputs of a test run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SuiteConfig {
    /// Qt versions to register, in declaration order.
    pub qt_installations: Vec<QtInstallation>,
    /// Directory new projects are created in.
    pub workdir: Option<PathBuf>,
    /// Expected IDE major version, if pinned.
    pub ide_version: Option<u32>,
}

impl SuiteConfig {
    /// Reads the suite variables from the process environment. Other
    /// variables are never looked at.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut vars = Vec::new();
        for var in [QT_DIRS_VAR, WORKDIR_VAR, VERSION_VAR] {
            if let Some(value) = std::env::var_os(var) {
                let value = value.into_string().map_err(|_| ConfigError::NotUnicode { var })?;
                vars.push((var, value));
            }
        }
        Self::from_vars(vars)
    }

    /// Reads from an explicit set of variables. Unset and empty variables
    /// are treated alike.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = SuiteConfig::default();
        for (key, value) in vars {
            let value = value.as_ref().trim();
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                QT_DIRS_VAR => config.qt_installations = parse_qt_dirs(value)?,
                WORKDIR_VAR => config.workdir = Some(PathBuf::from(value)),
                VERSION_VAR => {
                    config.ide_version = Some(parse_ide_version(value).ok_or_else(|| {
                        ConfigError::InvalidVersion {
                            var: VERSION_VAR,
                            value: value.to_string(),
                        }
                    })?)
                }
                _ => {}
            }
        }
        Ok(config)
    }

    /// Release year of the pinned IDE version, e.g. 2019 for 16.
    pub fn ide_release(&self) -> Option<u32> {
        self.ide_version.and_then(ide_release_year)
    }

    /// Existing work directory, if configured.
    pub fn existing_workdir(&self) -> Option<&Path> {
        self.workdir.as_deref().filter(|p| p.is_dir())
    }
}

/// Splits the `;`-separated Qt directory list. A trailing separator is
/// allowed; empty entries in between are not.
fn parse_qt_dirs(value: &str) -> Result<Vec<QtInstallation>, ConfigError> {
    let raw: Vec<&str> = value.trim_end_matches(';').split(';').collect();
    let mut installations: Vec<QtInstallation> = Vec::with_capacity(raw.len());
    for (index, entry) in raw.iter().enumerate() {
        let qt = QtInstallation::parse(entry).ok_or(ConfigError::EmptyEntry { var: QT_DIRS_VAR, index })?;
        if qt.name.is_empty() {
            return Err(ConfigError::EmptyName {
                var: QT_DIRS_VAR,
                path: qt.path.display().to_string(),
            });
        }
        if qt.path.as_os_str().is_empty() {
            return Err(ConfigError::MissingPath {
                var: QT_DIRS_VAR,
                name: qt.name,
            });
        }
        if installations.iter().any(|q| q.name == qt.name) {
            return Err(ConfigError::DuplicateName {
                var: QT_DIRS_VAR,
                name: qt.name,
            });
        }
        installations.push(qt);
    }
    Ok(installations)
}

/// Extracts the major version from strings such as `17`, `17.9.2` or
/// `Microsoft Visual Studio Community 2022 Version 17.9.2`.
pub fn parse_ide_version(text: &str) -> Option<u32> {
    let token = text
        .split_whitespace()
        .rev()
        .find(|t| t.chars().next().is_some_and(|c| c.is_ascii_digit()))?;
    token.split('.').next()?.parse().ok()
}

/// Product year of a Visual Studio major version.
pub fn ide_release_year(major: u32) -> Option<u32> {
    match major {
        15 => Some(2017),
        16 => Some(2019),
        17 => Some(2022),
        _ => None,
    }
}

fn millis(d: Duration) -> u64 {
    d.as_millis() as u64
}

/// Persistent timing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VsuiConfig {
    pub poll_interval_ms: u64,
    pub default_timeout_ms: u64,
    /// Budget for a busy placeholder to vanish after each menu open.
    pub settle_timeout_ms: u64,
    pub backoff_ms: u64,
    pub max_cycles: u32,
}

impl Default for VsuiConfig {
    fn default() -> Self {
        let retry = RetryOptions::default();
        Self {
            poll_interval_ms: millis(DEFAULT_POLL_INTERVAL),
            default_timeout_ms: millis(DEFAULT_TIMEOUT),
            settle_timeout_ms: millis(retry.settle.timeout),
            backoff_ms: millis(retry.backoff),
            max_cycles: retry.max_cycles,
        }
    }
}

/// Returns the `~/.vsui` directory.
pub fn vsui_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(CONFIG_DIR)
}

impl VsuiConfig {
    /// Load config from `~/.vsui/config.json`.
    ///
    /// Returns [`Default`] if the file does not exist or cannot be parsed.
    pub fn load() -> Self {
        Self::load_from(&vsui_dir().join(CONFIG_FILENAME))
    }

    pub fn load_from(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Save config to `~/.vsui/config.json`, creating the directory.
    pub fn save(&self) -> std::io::Result<()> {
        let dir = vsui_dir();
        std::fs::create_dir_all(&dir)?;
        self.save_to(&dir.join(CONFIG_FILENAME))
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Options for plain waits.
    pub fn wait_options(&self) -> WaitOptions {
        WaitOptions::from_millis(self.default_timeout_ms).interval(Duration::from_millis(self.poll_interval_ms))
    }

    /// Options for the menu retry loop.
    pub fn retry_options(&self) -> RetryOptions {
        RetryOptions {
            settle: WaitOptions::from_millis(self.settle_timeout_ms)
                .interval(RetryOptions::default().settle.interval),
            backoff: Duration::from_millis(self.backoff_ms),
            max_cycles: self.max_cycles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn reads_named_and_bare_qt_dirs() {
        let config = SuiteConfig::from_vars(vars(&[(
            QT_DIRS_VAR,
            r"Qt6=C:\Qt\6.5.3\msvc2019_64;C:\Qt\5.15.2\msvc2019_64;",
        )]))
        .unwrap();
        assert_eq!(
            config.qt_installations,
            vec![
                QtInstallation {
                    name: "Qt6".into(),
                    path: PathBuf::from(r"C:\Qt\6.5.3\msvc2019_64"),
                },
                QtInstallation {
                    name: "5.15.2_msvc2019_64".into(),
                    path: PathBuf::from(r"C:\Qt\5.15.2\msvc2019_64"),
                },
            ]
        );
    }

    #[test]
    fn unset_variables_leave_defaults() {
        let config = SuiteConfig::from_vars(vars(&[("PATH", "/usr/bin"), (WORKDIR_VAR, "  ")])).unwrap();
        assert_eq!(config, SuiteConfig::default());
    }

    #[test]
    fn rejects_bad_qt_dirs() {
        assert!(matches!(
            SuiteConfig::from_vars(vars(&[(QT_DIRS_VAR, "a=/qt/a;;b=/qt/b")])),
            Err(ConfigError::EmptyEntry { index: 1, .. })
        ));
        assert!(matches!(
            SuiteConfig::from_vars(vars(&[(QT_DIRS_VAR, "a=")])),
            Err(ConfigError::MissingPath { .. })
        ));
        assert!(matches!(
            SuiteConfig::from_vars(vars(&[(QT_DIRS_VAR, "a=/x;a=/y")])),
            Err(ConfigError::DuplicateName { .. })
        ));
    }

    #[test]
    fn rejects_unnamed_qt_dir() {
        let err = SuiteConfig::from_vars(vars(&[(QT_DIRS_VAR, "=/opt/qt")])).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyName { ref path, .. } if path == "/opt/qt"));
        assert_eq!(err.to_string(), "SQUISH_VSTOOLS_QTDIRS: Qt installation at '/opt/qt' has no name");
        assert!(matches!(
            SuiteConfig::from_vars(vars(&[(QT_DIRS_VAR, " = ")])),
            Err(ConfigError::EmptyName { .. })
        ));
    }

    // The only test touching the process environment.
    #[cfg(unix)]
    #[test]
    fn from_env_ignores_foreign_non_unicode_variables() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let junk = OsStr::from_bytes(b"\xff\xfe");
        std::env::set_var("VSUI_TEST_JUNK", junk);
        std::env::set_var(VERSION_VAR, "16.11");
        let config = SuiteConfig::from_env().unwrap();
        assert_eq!(config.ide_version, Some(16));
        assert_eq!(config.ide_release(), Some(2019));

        std::env::set_var(VERSION_VAR, junk);
        let err = SuiteConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::NotUnicode { var: VERSION_VAR }));

        std::env::remove_var(VERSION_VAR);
        std::env::remove_var("VSUI_TEST_JUNK");
    }

    #[test]
    fn reads_workdir_and_version() {
        let config = SuiteConfig::from_vars(vars(&[(WORKDIR_VAR, "/tmp/work"), (VERSION_VAR, "17.9")])).unwrap();
        assert_eq!(config.workdir, Some(PathBuf::from("/tmp/work")));
        assert_eq!(config.ide_version, Some(17));

        let err = SuiteConfig::from_vars(vars(&[(VERSION_VAR, "latest")])).unwrap_err();
        assert_eq!(err.to_string(), "SQUISH_VSTOOLS_VERSION: 'latest' is not a version number");
    }

    #[test]
    fn existing_workdir_checks_the_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SuiteConfig {
            workdir: Some(dir.path().to_path_buf()),
            ..SuiteConfig::default()
        };
        assert!(config.existing_workdir().is_some());
        config.workdir = Some(dir.path().join("missing"));
        assert!(config.existing_workdir().is_none());
    }

    #[test]
    fn ide_version_from_about_text() {
        assert_eq!(parse_ide_version("Microsoft Visual Studio Community 2022 Version 17.9.2"), Some(17));
        assert_eq!(parse_ide_version("16"), Some(16));
        assert_eq!(parse_ide_version("no digits here"), None);
    }

    #[test]
    fn release_years() {
        assert_eq!(ide_release_year(16), Some(2019));
        assert_eq!(ide_release_year(17), Some(2022));
        assert_eq!(ide_release_year(99), None);
        assert_eq!(SuiteConfig::default().ide_release(), None);
    }

    #[test]
    fn default_config_matches_wait_defaults() {
        let config = VsuiConfig::default();
        assert_eq!(config.wait_options(), WaitOptions::default());
        assert_eq!(config.retry_options(), RetryOptions::default());
    }

    #[test]
    fn deserialize_partial_json() {
        let loaded: VsuiConfig = serde_json::from_str(r#"{"max_cycles": 5}"#).unwrap();
        assert_eq!(loaded.max_cycles, 5);
        assert_eq!(loaded.poll_interval_ms, 500);
    }

    #[test]
    fn save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = VsuiConfig {
            backoff_ms: 250,
            ..VsuiConfig::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(VsuiConfig::load_from(&path), config);
        assert_eq!(VsuiConfig::load_from(&dir.path().join("missing.json")), VsuiConfig::default());
    }
}
