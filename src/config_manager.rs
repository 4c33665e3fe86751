use std::{
    fs::File,
    io::{self, BufReader},
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::control_mode::ControlMode;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/amilo-fand/config.json";

const DEFAULT_PORT_DEVICE: &str = "/dev/port";
const DEFAULT_EC_REGISTERS: &str = "/sys/kernel/debug/ec/ec0/io";
const DEFAULT_BASE_INTERVAL_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to open configuration file {path:?}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse configuration file {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("The base interval must be at least one second")]
    InvalidInterval,
    #[error("Invalid initial fan command: {0:?}")]
    InvalidInitialCommand(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusKind {
    System,
    Session,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    // Device giving access to the I/O ports
    pub port_device: PathBuf,
    // EC register window of the ec_sys module
    pub ec_registers: PathBuf,

    // Period of the disable zone, the other zones use twice this
    pub base_interval_secs: u64,

    // Command applied at start-up
    pub initial_command: char,

    pub bus: BusKind,

    // Add the raw register values to the status report
    pub debug_status: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            port_device: PathBuf::from(DEFAULT_PORT_DEVICE),
            ec_registers: PathBuf::from(DEFAULT_EC_REGISTERS),
            base_interval_secs: DEFAULT_BASE_INTERVAL_SECS,
            initial_command: 'S',
            bus: BusKind::System,
            debug_status: false,
        }
    }
}

impl DaemonConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!("Parsing config file at: {:?}", path);

        let file = File::open(path).map_err(|source| ConfigError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let config: DaemonConfig = serde_json::from_reader(BufReader::new(file))
            .map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        config.validate()?;

        Ok(config)
    }

    // Fall back to the defaults when the file is missing or bad
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(ConfigError::Open { source, .. })
                if source.kind() == io::ErrorKind::NotFound =>
            {
                info!("No configuration at {:?}, using defaults", path);
                Self::default()
            }
            Err(err) => {
                warn!("{err}, using defaults");
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_interval_secs == 0 {
            return Err(ConfigError::InvalidInterval);
        }

        self.initial_mode()?;

        Ok(())
    }

    pub fn base_interval(&self) -> Duration {
        Duration::from_secs(self.base_interval_secs)
    }

    pub fn initial_mode(&self) -> Result<ControlMode, ConfigError> {
        let invalid = ConfigError::InvalidInitialCommand(self.initial_command);

        if !self.initial_command.is_ascii() {
            return Err(invalid);
        }

        ControlMode::try_from(self.initial_command as u8).map_err(|_| invalid)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_start_in_software_mode() {
        let config = DaemonConfig::default();

        assert_eq!(config.initial_mode().unwrap(), ControlMode::SoftwareManaged);
        assert_eq!(config.base_interval(), Duration::from_secs(10));
        assert_eq!(config.bus, BusKind::System);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let file = write_config(r#"{ "initial_command": "A", "bus": "session" }"#);

        let config = DaemonConfig::load(file.path()).unwrap();

        assert_eq!(config.initial_mode().unwrap(), ControlMode::Auto);
        assert_eq!(config.bus, BusKind::Session);
        assert_eq!(config.port_device, PathBuf::from("/dev/port"));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let file = write_config(r#"{ "base_interval_secs": 0 }"#);

        assert!(matches!(
            DaemonConfig::load(file.path()),
            Err(ConfigError::InvalidInterval)
        ));
    }

    #[test]
    fn unknown_command_is_rejected() {
        let file = write_config(r#"{ "initial_command": "Q" }"#);

        assert!(matches!(
            DaemonConfig::load(file.path()),
            Err(ConfigError::InvalidInitialCommand('Q'))
        ));
    }

    #[test]
    fn non_ascii_command_is_rejected() {
        let config = DaemonConfig {
            initial_command: 'Ş',
            ..Default::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn broken_file_falls_back_to_defaults() {
        let file = write_config("{ not json");

        assert!(matches!(
            DaemonConfig::load(file.path()),
            Err(ConfigError::Parse { .. })
        ));
        assert_eq!(DaemonConfig::load_or_default(file.path()), DaemonConfig::default());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        assert_eq!(DaemonConfig::load_or_default(&path), DaemonConfig::default());
    }
}
