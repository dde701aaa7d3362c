//! Configuration file support for ymflash.
//!
//! Configuration is loaded from multiple sources with the following priority (highest first):
//! 1. Command-line arguments
//! 2. Environment variables (YMFLASH_*)
//! 3. Local config file (./ymflash.toml)
//! 4. Global config file (~/.config/ymflash/config.toml)
//!
//! An explicit `--config PATH` replaces the search of 3 and 4.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use directories::ProjectDirs;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use ymflash::{BlockSize, Checksum, InteractOptions};

/// Name of the local config file.
pub const LOCAL_CONFIG_FILE: &str = "ymflash.toml";

/// Serial port settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConfig {
    /// Preferred serial port (e.g., "/dev/ttyACM0" or "COM3").
    pub serial: Option<String>,
    /// Default baud rate.
    pub baud: Option<u32>,
}

/// YMODEM settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Block size in bytes (128 or 1024).
    pub block_size: Option<usize>,
    /// Whether the device is expected to be in listening mode already.
    pub listening_mode: Option<bool>,
    /// Checksum mode ("zeroed" or "crc16").
    pub checksum: Option<Checksum>,
    /// Put each file's name in its header instead of "binary".
    pub file_names: Option<bool>,
}

/// Console exchange timing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractConfig {
    /// Silence that ends a burst of device output.
    pub quiet_period_ms: Option<u64>,
    /// Silence after which an exchange fails.
    pub idle_timeout_ms: Option<u64>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Port configuration.
    #[serde(default)]
    pub port: PortConfig,
    /// Transfer configuration.
    #[serde(default)]
    pub transfer: TransferConfig,
    /// Interactive exchange configuration.
    #[serde(default)]
    pub interact: InteractConfig,
}

impl Config {
    /// Load configuration from the global and local files.
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(global_path) = Self::global_config_path() {
            if let Some(global_config) = Self::load_from_file(&global_path) {
                debug!("Loaded global config from {}", global_path.display());
                config.merge(global_config);
            }
        }

        if let Some(local_config) = Self::load_from_file(Path::new(LOCAL_CONFIG_FILE)) {
            debug!("Loaded local config from {LOCAL_CONFIG_FILE}");
            config.merge(local_config);
        }

        config
    }

    /// Load configuration from a specific file path (--config flag).
    pub fn load_from_path(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load a config file found by the search, warning on bad content.
    fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!("Failed to parse config file {}: {}", path.display(), e);
                    None
                },
            },
            Err(e) => {
                warn!("Failed to read config file {}: {}", path.display(), e);
                None
            },
        }
    }

    /// Get the global configuration directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "ymflash").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the global configuration file path.
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Merge another config into this one; values set in `other` win.
    fn merge(&mut self, other: Self) {
        if other.port.serial.is_some() {
            self.port.serial = other.port.serial;
        }
        if other.port.baud.is_some() {
            self.port.baud = other.port.baud;
        }

        if other.transfer.block_size.is_some() {
            self.transfer.block_size = other.transfer.block_size;
        }
        if other.transfer.listening_mode.is_some() {
            self.transfer.listening_mode = other.transfer.listening_mode;
        }
        if other.transfer.checksum.is_some() {
            self.transfer.checksum = other.transfer.checksum;
        }
        if other.transfer.file_names.is_some() {
            self.transfer.file_names = other.transfer.file_names;
        }

        if other.interact.quiet_period_ms.is_some() {
            self.interact.quiet_period_ms = other.interact.quiet_period_ms;
        }
        if other.interact.idle_timeout_ms.is_some() {
            self.interact.idle_timeout_ms = other.interact.idle_timeout_ms;
        }
    }

    /// Configured block size, validated.
    pub fn block_size(&self) -> anyhow::Result<Option<BlockSize>> {
        self.transfer
            .block_size
            .map(BlockSize::try_from)
            .transpose()
            .context("Invalid [transfer] block_size in config")
    }

    /// Interactive exchange timing with configured overrides applied.
    pub fn interact_options(&self) -> InteractOptions {
        let mut options = InteractOptions::default();
        if let Some(ms) = self.interact.quiet_period_ms {
            options.quiet_period = Duration::from_millis(ms);
        }
        if let Some(ms) = self.interact.idle_timeout_ms {
            options.idle_timeout = Duration::from_millis(ms);
        }
        options
    }

    /// Remember `serial` as the preferred port.
    ///
    /// Written to the local file if one exists, the global file otherwise.
    pub fn remember_port(&mut self, serial: &str) -> anyhow::Result<()> {
        self.port.serial = Some(serial.to_string());

        let path = if Path::new(LOCAL_CONFIG_FILE).exists() {
            PathBuf::from(LOCAL_CONFIG_FILE)
        } else if let Some(global_dir) = Self::global_config_dir() {
            fs::create_dir_all(&global_dir)?;
            global_dir.join("config.toml")
        } else {
            PathBuf::from(LOCAL_CONFIG_FILE)
        };

        self.save_port_to(&path)
    }

    /// Update the `[port]` section of the file at `path`, keeping the rest.
    fn save_port_to(&self, path: &Path) -> anyhow::Result<()> {
        let mut on_disk = Self::load_from_file(path).unwrap_or_default();
        on_disk.port = self.port.clone();

        let content = toml::to_string_pretty(&on_disk)?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        info!("Saved port configuration to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.port.serial.is_none());
        assert!(config.port.baud.is_none());
        assert!(config.transfer.block_size.is_none());
        assert!(config.transfer.checksum.is_none());
        assert_eq!(config.interact_options(), InteractOptions::default());
    }

    #[test]
    fn test_config_merge_overrides_set_values() {
        let mut base = Config::default();
        base.port.serial = Some("/dev/ttyUSB0".to_string());
        base.port.baud = Some(9600);

        let mut other = Config::default();
        other.port.baud = Some(28800);
        other.transfer.block_size = Some(1024);

        base.merge(other);

        assert_eq!(base.port.serial.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(base.port.baud, Some(28800));
        assert_eq!(base.transfer.block_size, Some(1024));
    }

    #[test]
    fn test_config_merge_does_not_overwrite_with_none() {
        let mut base = Config::default();
        base.transfer.listening_mode = Some(false);
        base.interact.idle_timeout_ms = Some(9000);

        base.merge(Config::default());

        assert_eq!(base.transfer.listening_mode, Some(false));
        assert_eq!(base.interact.idle_timeout_ms, Some(9000));
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
[port]
serial = "/dev/ttyACM0"
baud = 28800

[transfer]
block_size = 1024
listening_mode = false
checksum = "crc16"
file_names = true

[interact]
quiet_period_ms = 100
idle_timeout_ms = 8000
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.port.serial.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(config.port.baud, Some(28800));
        assert_eq!(config.block_size().unwrap(), Some(BlockSize::OneK));
        assert_eq!(config.transfer.listening_mode, Some(false));
        assert_eq!(config.transfer.checksum, Some(Checksum::Crc16));
        assert_eq!(config.transfer.file_names, Some(true));

        let options = config.interact_options();
        assert_eq!(options.quiet_period, Duration::from_millis(100));
        assert_eq!(options.idle_timeout, Duration::from_millis(8000));
    }

    #[test]
    fn test_config_from_partial_toml() {
        let config: Config = toml::from_str("[transfer]\nchecksum = \"zeroed\"\n").unwrap();
        assert!(config.port.serial.is_none());
        assert_eq!(config.transfer.checksum, Some(Checksum::Zeroed));
    }

    #[test]
    fn test_invalid_block_size_is_reported() {
        let config: Config = toml::from_str("[transfer]\nblock_size = 512\n").unwrap();
        assert!(config.block_size().is_err());
    }

    #[test]
    fn test_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(&path, "[port]\nserial = \"/dev/ttyACM1\"\n").unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.port.serial.as_deref(), Some("/dev/ttyACM1"));
    }

    #[test]
    fn test_load_from_path_missing_or_invalid() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load_from_path(&dir.path().join("missing.toml")).is_err());

        let bad = dir.path().join("bad.toml");
        fs::write(&bad, "[port\n").unwrap();
        assert!(Config::load_from_path(&bad).is_err());
    }

    #[test]
    fn test_save_port_keeps_other_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ymflash.toml");
        fs::write(&path, "[transfer]\nblock_size = 1024\n").unwrap();

        let mut config = Config::default();
        config.port.serial = Some("/dev/ttyACM0".to_string());
        config.save_port_to(&path).unwrap();

        let saved = Config::load_from_path(&path).unwrap();
        assert_eq!(saved.port.serial.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(saved.transfer.block_size, Some(1024));
    }

    #[test]
    fn test_global_config_path() {
        if let Some(p) = Config::global_config_path() {
            let p = p.to_string_lossy();
            assert!(p.contains("ymflash"));
            assert!(p.ends_with("config.toml"));
        }
    }
}
