//! Configuration file persistence.
//!
//! The controller reads one JSON file at startup. Default location:
//! - Linux: ~/.config/gpu-fan-control/config.json (root: /root/.config/...)

use std::path::{Path, PathBuf};

use crate::config::FanConfig;
use crate::error::ConfigError;

// =============================================================================
// Config Path
// =============================================================================

const APP_NAME: &str = "gpu-fan-control";
const CONFIG_FILE: &str = "config.json";

/// Get the configuration directory path.
pub fn get_config_dir() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|p| p.join(APP_NAME))
        .ok_or(ConfigError::NoConfigDir)
}

/// Get the full path to the config file.
pub fn get_config_path() -> Result<PathBuf, ConfigError> {
    Ok(get_config_dir()?.join(CONFIG_FILE))
}

// =============================================================================
// Storage Functions
// =============================================================================

/// Load configuration from `path`. Fields missing from the file take their defaults.
pub fn load_config(path: &Path) -> Result<FanConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Save configuration to `path`, creating parent directories as needed.
pub fn save_config(path: &Path, config: &FanConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let content = serde_json::to_string_pretty(config).map_err(ConfigError::Serialize)?;

    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Write `config` to `path` unless a file is already there.
///
/// Returns `true` if a file was created.
pub fn ensure_config_exists(path: &Path, config: &FanConfig) -> Result<bool, ConfigError> {
    if path.exists() {
        return Ok(false);
    }
    save_config(path, config)?;
    Ok(true)
}

/// Resolve the startup configuration.
///
/// An explicit path must exist. Without one, the default path is used
/// if present, otherwise the built-in defaults.
pub fn resolve_config(
    explicit: Option<&Path>,
) -> Result<(FanConfig, Option<PathBuf>), ConfigError> {
    if let Some(path) = explicit {
        return Ok((load_config(path)?, Some(path.to_path_buf())));
    }

    let path = get_config_path()?;
    if path.exists() {
        Ok((load_config(&path)?, Some(path)))
    } else {
        Ok((FanConfig::default(), None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Aggregation, Preset};

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);
        let mut config = Preset::Conservative.to_config();
        config.aggregation = Aggregation::Mean;
        config.ipmi.zones = vec![0x00, 0x01];

        save_config(&path, &config).unwrap();
        assert_eq!(load_config(&path).unwrap(), config);
    }

    #[test]
    fn test_ensure_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        assert!(ensure_config_exists(&path, &FanConfig::default()).unwrap());
        std::fs::write(&path, r#"{"min_speed": 30}"#).unwrap();
        assert!(!ensure_config_exists(&path, &FanConfig::default()).unwrap());
        assert_eq!(load_config(&path).unwrap().min_speed, 30);
    }

    #[test]
    fn test_missing_explicit_path_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        assert!(matches!(
            resolve_config(Some(&path)),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "{ min_speed: ").unwrap();
        assert!(matches!(
            load_config(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_loaded_inverted_range_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, r#"{"temp_low": 70, "temp_high": 60}"#).unwrap();
        let (config, source) = resolve_config(Some(&path)).unwrap();
        assert_eq!(source.as_deref(), Some(path.as_path()));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTemperatureRange { .. })
        ));
    }
}
