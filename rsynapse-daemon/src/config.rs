use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Overrides the config file location.
pub const CONFIG_ENV: &str = "RSYNAPSE_CONFIG";

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub plugins: PluginsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PluginsConfig {
    /// Directory scanned for `.so` plugins. A leading `~/` expands to the
    /// home directory.
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Reads the config file, falling back to defaults when it does not exist.
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config at: {:?}", path))?;
        Self::from_toml_str(&raw).with_context(|| format!("Invalid config at: {:?}", path))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn plugin_dir(&self) -> Option<PathBuf> {
        match &self.plugins.dir {
            Some(dir) => Some(expand_home(dir)),
            None => default_plugin_dir(),
        }
    }
}

pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join("rsynapse").join("config.toml"))
}

fn default_plugin_dir() -> Option<PathBuf> {
    if cfg!(debug_assertions) {
        // In debug builds, use the local target directory.
        Some(PathBuf::from("./target/debug/"))
    } else {
        dirs::home_dir().map(|mut path| {
            path.push(".local/lib/rsynapse/plugins/");
            path
        })
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}
