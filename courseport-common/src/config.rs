//! Configuration loading and data folder resolution
//!
//! Resolution priority for the data folder:
//! 1. `COURSEPORT_DATA` environment variable
//! 2. `data_folder` key in the TOML config file
//! 3. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Service configuration resolved from environment + TOML + defaults
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address the HTTP listener binds to
    pub bind_addr: String,
    /// Folder holding the database and uploaded sheet files
    pub data_folder: PathBuf,
    /// Rows processed per orchestrator tick
    pub page_size: usize,
}

/// On-disk TOML shape; all keys optional
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    bind_addr: Option<String>,
    data_folder: Option<PathBuf>,
    page_size: Option<usize>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5740".to_string(),
            data_folder: default_data_folder(),
            page_size: 50,
        }
    }
}

impl ServiceConfig {
    /// Resolve configuration from the environment and the config file
    pub fn resolve() -> Self {
        let file = load_config_file()
            .and_then(|path| read_config_file(&path).ok())
            .unwrap_or_default();

        let mut config = ServiceConfig::default();

        if let Some(bind) = file.bind_addr {
            config.bind_addr = bind;
        }
        if let Some(folder) = file.data_folder {
            config.data_folder = folder;
        }
        if let Some(page_size) = file.page_size {
            config.page_size = page_size;
        }

        // Environment overrides
        if let Ok(folder) = std::env::var("COURSEPORT_DATA") {
            config.data_folder = PathBuf::from(folder);
        }
        if let Ok(bind) = std::env::var("COURSEPORT_BIND") {
            config.bind_addr = bind;
        }
        if let Ok(page_size) = std::env::var("COURSEPORT_PAGE_SIZE") {
            match page_size.parse() {
                Ok(n) if n > 0 => config.page_size = n,
                _ => tracing::warn!(
                    value = %page_size,
                    "Ignoring invalid COURSEPORT_PAGE_SIZE"
                ),
            }
        }

        config
    }

    /// Path of the SQLite database inside the data folder
    pub fn database_path(&self) -> PathBuf {
        self.data_folder.join("courseport.db")
    }

    /// Create the data folder if it does not exist yet
    pub fn ensure_data_folder(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_folder)?;
        Ok(())
    }
}

/// Get configuration file path for the platform
fn load_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("courseport").join("config.toml"));

    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/courseport/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

fn read_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read config failed: {}", e)))?;
    toml::from_str(&content).map_err(|e| Error::Config(format!("Parse config failed: {}", e)))
}

/// Get OS-dependent default data folder path
fn default_data_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("courseport"))
        .unwrap_or_else(|| PathBuf::from("./courseport_data"))
}
