//! Application configuration persisted as JSON.
//! 以 JSON 儲存的應用程式設定。

use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::util::write_atomic;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot {op} config file {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("config file {} is not valid: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory holding the `workspace_<id>` folders. Relative paths resolve
    /// against the process working directory.
    #[serde(default = "default_workspaces_root")]
    pub workspaces_root: PathBuf,
    #[serde(default = "default_workspace_name")]
    pub default_workspace_name: String,
    /// Create a first workspace when the root holds none.
    #[serde(default = "default_true")]
    pub create_default_workspace: bool,
}

fn default_workspaces_root() -> PathBuf {
    PathBuf::from("workspaces")
}

fn default_workspace_name() -> String {
    "My Workspace".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspaces_root: default_workspaces_root(),
            default_workspace_name: default_workspace_name(),
            create_default_workspace: true,
        }
    }
}

impl AppConfig {
    /// Restores defaults for blank values and trims the workspace name.
    pub fn sanitize(&mut self) {
        if self.workspaces_root.as_os_str().is_empty() {
            self.workspaces_root = default_workspaces_root();
        }
        let trimmed = self.default_workspace_name.trim();
        if trimmed.is_empty() {
            self.default_workspace_name = default_workspace_name();
        } else if trimmed.len() != self.default_workspace_name.len() {
            self.default_workspace_name = trimmed.to_string();
        }
    }
}

/// Configuration bound to the file it was read from.
/// 與來源檔案綁定的設定。
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    config: AppConfig,
}

impl ConfigStore {
    /// Reads `path`; a file that does not exist yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let mut config = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice::<AppConfig>(&bytes).map_err(|source| {
                ConfigError::Json {
                    path: path.clone(),
                    source,
                }
            })?,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "config file absent; using defaults");
                AppConfig::default()
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    op: "read",
                    path,
                    source,
                })
            }
        };
        config.sanitize();
        Ok(Self { path, config })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Applies `edit`, re-sanitizes and writes the file.
    pub fn update<F>(&mut self, edit: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut AppConfig),
    {
        edit(&mut self.config);
        self.config.sanitize();
        self.save()
    }

    fn save(&self) -> Result<(), ConfigError> {
        let payload = serde_json::to_vec_pretty(&self.config).map_err(|source| {
            ConfigError::Json {
                path: self.path.clone(),
                source,
            }
        })?;
        write_atomic(&self.path, &payload).map_err(|source| ConfigError::Io {
            op: "write",
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), "config saved");
        Ok(())
    }

    pub fn into_config(self) -> AppConfig {
        self.config
    }
}
