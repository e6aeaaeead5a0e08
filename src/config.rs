//! Configuration Management
//!
//! Optional defaults for firecrud, read from
//! `<config dir>/firecrud/config.json`. Command-line flags always win.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Collection used when none is configured
pub const DEFAULT_COLLECTION: &str = "users";

/// Page size used by scans when none is configured
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Firebase / GCP project ID
    #[serde(default)]
    pub project_id: Option<String>,
    /// Service account key file
    #[serde(default)]
    pub credentials_file: Option<PathBuf>,
    /// Firestore collection holding the documents
    #[serde(default)]
    pub collection: Option<String>,
    /// Page size for scans
    #[serde(default)]
    pub page_size: Option<u32>,
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("firecrud").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load configuration from `path`; missing or unreadable files give defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring invalid config {:?}: {}", path, e);
                Self::default()
            }),
            Err(e) => {
                tracing::warn!("Cannot read config {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Get effective project (CLI > config > environment / gcloud default)
    pub fn effective_project(&self, cli: Option<&str>) -> Option<String> {
        cli.map(str::to_string)
            .or_else(|| self.project_id.clone())
            .or_else(crate::gcp::auth::get_default_project)
    }

    /// Get effective credentials file (CLI > config)
    pub fn effective_credentials(&self, cli: Option<&Path>) -> Option<PathBuf> {
        cli.map(Path::to_path_buf)
            .or_else(|| self.credentials_file.clone())
    }

    /// Get effective collection (CLI > config > "users")
    pub fn effective_collection(&self, cli: Option<&str>) -> String {
        cli.map(str::to_string)
            .or_else(|| self.collection.clone())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_COLLECTION.to_string())
    }

    /// Get effective scan page size
    pub fn effective_page_size(&self) -> u32 {
        self.page_size
            .filter(|size| *size > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE)
    }
}
