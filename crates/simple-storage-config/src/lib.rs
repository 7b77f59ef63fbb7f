use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_AUTHORITY: &str = "com.android.externalstorage.documents";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },
}

/// What to do when a directory is wanted where a file of that name exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCollision {
    #[default]
    Fail,
    CreateSibling,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Root directory of the `primary` volume.
    pub primary_root: PathBuf,
    /// App-private directory on primary storage, measured for space queries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_directory: Option<PathBuf>,
    #[serde(default = "default_authority")]
    pub authority: String,
    #[serde(default)]
    pub file_collision: FileCollision,
    /// Removable volumes backed by local directories, keyed by storage id.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub volumes: BTreeMap<String, PathBuf>,
}

fn default_authority() -> String {
    DEFAULT_AUTHORITY.to_string()
}

impl Config {
    pub fn new(primary_root: impl Into<PathBuf>) -> Self {
        Self {
            primary_root: primary_root.into(),
            app_directory: None,
            authority: default_authority(),
            file_collision: FileCollision::default(),
            volumes: BTreeMap::new(),
        }
    }

    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let mut config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;
        config.expand_paths();

        Ok(Some(config))
    }

    pub fn load() -> Result<Option<Self>, ConfigError> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        self.save_to_path(&config_path)
    }

    pub fn config_path() -> PathBuf {
        let config_dir = shellexpand::tilde("~/.config/simple-storage");
        PathBuf::from(config_dir.as_ref()).join("config.toml")
    }

    /// Expand shell variables and tilde in every configured path
    fn expand_paths(&mut self) {
        expand_in_place(&mut self.primary_root);
        if let Some(app_directory) = self.app_directory.as_mut() {
            expand_in_place(app_directory);
        }
        for path in self.volumes.values_mut() {
            expand_in_place(path);
        }
    }

    fn expand_path(path: &Path) -> Option<PathBuf> {
        let path_str = path.to_string_lossy();
        match shellexpand::full(&path_str) {
            Ok(expanded) => Some(PathBuf::from(expanded.as_ref())),
            Err(_) => None,
        }
    }
}

fn expand_in_place(path: &mut PathBuf) {
    if let Some(expanded) = Config::expand_path(path) {
        *path = expanded;
    }
}
