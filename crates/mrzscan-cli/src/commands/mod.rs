//! CLI subcommands.

pub mod config;
pub mod crop;
pub mod mrz;
pub mod output;
pub mod scan;

use std::path::{Path, PathBuf};

use tracing::debug;

use mrzscan_core::ScanConfig;

/// Config file under the platform config directory.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mrzscan")
        .join("config.json")
}

/// File the config commands operate on.
pub fn config_file(explicit: Option<&str>) -> PathBuf {
    explicit.map(PathBuf::from).unwrap_or_else(default_config_path)
}

/// Load the configuration used by a command.
///
/// An explicit path must exist; the default file is optional.
pub fn load_config(explicit: Option<&str>) -> anyhow::Result<ScanConfig> {
    if let Some(path) = explicit {
        let path = Path::new(path);
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        return Ok(ScanConfig::from_file(path)?);
    }

    let path = default_config_path();
    if path.exists() {
        debug!("Loading config from {}", path.display());
        Ok(ScanConfig::from_file(&path)?)
    } else {
        Ok(ScanConfig::default())
    }
}
