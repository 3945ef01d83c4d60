use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::config::{
    ConfigError, DEFAULT_MAX_INPUT_TOKENS, DEFAULT_REQUEST_TIMEOUT_SECS, ROLES_FILE_NAME,
};
use crate::models::{ModelConfig, ProviderConfig, ProviderKind, RoleConfig};
use crate::providers::local::LocalClient;

/// Typed read/update access to the persisted configuration.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Provider entries exactly as stored, `$VARNAME` keys unresolved.
    fn providers(&self) -> Vec<ProviderConfig>;
    fn default_model(&self) -> Option<String>;
    fn roles(&self) -> Vec<RoleConfig>;
    fn request_timeout(&self) -> Duration;
    fn temperature(&self) -> Option<f32>;

    /// Refresh one provider's model list from its live endpoint and persist
    /// it. Returns the new list.
    async fn sync_models_for_provider(
        &mut self,
        name: &str,
        http: &Client,
    ) -> Result<Vec<ModelConfig>, ConfigError>;
}

/// Top-level layout of `configs.yaml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default, alias = "model", skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub clients: Vec<ProviderConfig>,
}

/// `roles.yaml` is either `roles: [...]` or a bare list.
#[derive(Deserialize)]
#[serde(untagged)]
enum RolesDocument {
    Wrapped { roles: Vec<RoleConfig> },
    List(Vec<RoleConfig>),
}

pub struct YamlConfigStore {
    config_path: PathBuf,
    roles_path: PathBuf,
    config: AppConfig,
    roles: Vec<RoleConfig>,
}

impl YamlConfigStore {
    /// Load the config file and the roles catalog. `roles_path` defaults to
    /// `roles.yaml` beside the config file.
    pub fn load(config_path: &Path, roles_path: Option<&Path>) -> Result<Self, ConfigError> {
        let roles_path = match roles_path {
            Some(path) => path.to_path_buf(),
            None => config_path
                .parent()
                .map(|dir| dir.join(ROLES_FILE_NAME))
                .unwrap_or_else(|| PathBuf::from(ROLES_FILE_NAME)),
        };

        let contents = fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
            path: config_path.to_path_buf(),
            source,
        })?;
        let config: AppConfig = if contents.trim().is_empty() {
            AppConfig::default()
        } else {
            serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: config_path.to_path_buf(),
                source,
            })?
        };
        tracing::info!(
            "Loaded {} provider(s) from {}",
            config.clients.len(),
            config_path.display()
        );

        let roles = Self::load_roles(&roles_path)?;

        Ok(Self {
            config_path: config_path.to_path_buf(),
            roles_path,
            config,
            roles,
        })
    }

    fn load_roles(path: &Path) -> Result<Vec<RoleConfig>, ConfigError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("Roles file {} not found, no roles available", path.display());
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }

        let document: RolesDocument =
            serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        let roles = match document {
            RolesDocument::Wrapped { roles } | RolesDocument::List(roles) => roles,
        };
        tracing::debug!("Loaded {} role(s) from {}", roles.len(), path.display());
        Ok(roles)
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn roles_path(&self) -> &Path {
        &self.roles_path
    }

    /// Write the config file atomically through a temp file in the same directory.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = self.config_path.as_path();
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };

        let parent = path.parent().filter(|dir| !dir.as_os_str().is_empty());
        if let Some(dir) = parent {
            fs::create_dir_all(dir).map_err(write_err)?;
        }

        let contents = serde_yaml::to_string(&self.config).map_err(ConfigError::Serialize)?;
        let mut temp_file = match parent {
            Some(dir) => NamedTempFile::new_in(dir),
            None => NamedTempFile::new(),
        }
        .map_err(write_err)?;

        temp_file.write_all(contents.as_bytes()).map_err(write_err)?;
        temp_file.as_file_mut().sync_all().map_err(write_err)?;
        temp_file.persist(path).map_err(|e| write_err(e.error))?;

        tracing::info!("Saved configuration to {}", path.display());
        Ok(())
    }

    fn find_client(&self, name: &str) -> Option<usize> {
        let clients = &self.config.clients;
        if let Some(idx) = clients.iter().position(|c| c.key() == name) {
            return Some(idx);
        }
        let mut by_type = clients
            .iter()
            .enumerate()
            .filter(|(_, c)| c.provider_type == name);
        match (by_type.next(), by_type.next()) {
            (Some((idx, _)), None) => Some(idx),
            _ => None,
        }
    }
}

/// Keep the models still served, in their stored order, then append the new ones.
fn merge_models(current: &[ModelConfig], upstream: &[String]) -> Vec<ModelConfig> {
    let mut merged: Vec<ModelConfig> = current
        .iter()
        .filter(|m| upstream.contains(&m.name))
        .cloned()
        .collect();
    for name in upstream {
        if !merged.iter().any(|m| &m.name == name) {
            merged.push(ModelConfig::new(name.clone(), Some(DEFAULT_MAX_INPUT_TOKENS)));
        }
    }
    merged
}

#[async_trait]
impl ConfigStore for YamlConfigStore {
    fn providers(&self) -> Vec<ProviderConfig> {
        self.config.clients.clone()
    }

    fn default_model(&self) -> Option<String> {
        self.config.default.clone()
    }

    fn roles(&self) -> Vec<RoleConfig> {
        self.roles.clone()
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.config
                .request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    fn temperature(&self) -> Option<f32> {
        self.config.temperature
    }

    async fn sync_models_for_provider(
        &mut self,
        name: &str,
        http: &Client,
    ) -> Result<Vec<ModelConfig>, ConfigError> {
        let idx = self
            .find_client(name)
            .ok_or_else(|| ConfigError::UnknownProvider(name.to_string()))?;

        let client = &self.config.clients[idx];
        if client.kind() != Some(ProviderKind::OpenAiCompatible) {
            return Err(ConfigError::Sync {
                provider: name.to_string(),
                reason: format!(
                    "model sync is only supported for openai-compatible providers, not '{}'",
                    client.provider_type
                ),
            });
        }

        let upstream = LocalClient::fetch_model_names(http, &client.api_base)
            .await
            .map_err(|e| ConfigError::Sync {
                provider: name.to_string(),
                reason: e.to_string(),
            })?;

        let merged = merge_models(&client.models, &upstream);
        let added = merged
            .iter()
            .filter(|m| client.find_model(&m.name).is_none())
            .count();
        let removed = client.models.len() + added - merged.len();
        tracing::info!(
            "Synced {}: {} added, {} removed, {} total",
            name,
            added,
            removed,
            merged.len()
        );

        self.config.clients[idx].models = merged.clone();
        self.save()?;
        Ok(merged)
    }
}
