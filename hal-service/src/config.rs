// SPDX-License-Identifier: GPL-3.0-only

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "/usr/local/etc/hald.toml";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LoggingLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LoggingLevel {
    pub fn as_directive(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    pub devd_socket: PathBuf,
    pub reconnect_delay_secs: u64,
    pub helper_timeout_ms: u64,
    pub helper_path: Vec<PathBuf>,
    pub rescan_interval_secs: u64,
    pub probe_smbios: bool,
    pub log_level: LoggingLevel,
    pub log_file: Option<PathBuf>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            devd_socket: PathBuf::from("/var/run/devd.pipe"),
            reconnect_delay_secs: 5,
            helper_timeout_ms: 10_000,
            helper_path: vec![PathBuf::from("/usr/local/libexec")],
            rescan_interval_secs: 0,
            probe_smbios: false,
            log_level: LoggingLevel::Info,
            log_file: None,
        }
    }
}

impl DaemonConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// An explicit path must exist; the default one may be missing.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let path = Path::new(DEFAULT_CONFIG_PATH);
                if path.exists() {
                    Self::load(path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn helper_timeout(&self) -> Duration {
        Duration::from_millis(self.helper_timeout_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    /// `None` when periodic rescans are disabled.
    pub fn rescan_interval(&self) -> Option<Duration> {
        (self.rescan_interval_secs > 0).then(|| Duration::from_secs(self.rescan_interval_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config: DaemonConfig = toml::from_str("").expect("parse");
        assert_eq!(config, DaemonConfig::default());
        assert_eq!(config.helper_timeout(), Duration::from_secs(10));
        assert_eq!(config.rescan_interval(), None);
    }

    #[test]
    fn fields_override_defaults() {
        let config: DaemonConfig = toml::from_str(
            r#"
            devd_socket = "/tmp/devd.sock"
            helper_path = ["/opt/hal/libexec", "/usr/libexec"]
            rescan_interval_secs = 30
            probe_smbios = true
            log_level = "debug"
            log_file = "/var/log/hald.log"
            "#,
        )
        .expect("parse");

        assert_eq!(config.devd_socket, PathBuf::from("/tmp/devd.sock"));
        assert_eq!(config.helper_path.len(), 2);
        assert_eq!(config.rescan_interval(), Some(Duration::from_secs(30)));
        assert!(config.probe_smbios);
        assert_eq!(config.log_level, LoggingLevel::Debug);
        assert_eq!(config.log_file, Some(PathBuf::from("/var/log/hald.log")));
        assert_eq!(config.reconnect_delay(), Duration::from_secs(5));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<DaemonConfig>("devd_pipe = \"/x\"").is_err());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = DaemonConfig::load_or_default(Some(Path::new("/nonexistent/hald.toml")))
            .expect_err("missing file");
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
