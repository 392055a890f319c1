use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use log::info;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::backend::{AuthSession, RestBackend};
use crate::chat::delivery_status::{DeliveryTimings, DEFAULT_DELIVERED_AFTER_MS, DEFAULT_READ_AFTER_MS};
use crate::models::CurrentUser;

pub const ENV_BACKEND_URL: &str = "VERICHAT_BACKEND_URL";
pub const ENV_ANON_KEY: &str = "VERICHAT_ANON_KEY";

/// Session tokens are stored base64-encoded, never in the clear.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SavedSession {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl SavedSession {
    pub fn new(session: &AuthSession) -> Self {
        SavedSession {
            user_id: session.user_id.clone(),
            email: session.email.clone(),
            access_token: session.access_token.as_ref().map(|t| BASE64.encode(t)),
            refresh_token: session.refresh_token.as_ref().map(|t| BASE64.encode(t)),
        }
    }

    pub fn to_session(&self) -> AuthSession {
        let decode = |encoded: &String| {
            String::from_utf8(BASE64.decode(encoded).unwrap_or_default()).unwrap_or_default()
        };
        AuthSession {
            user_id: self.user_id.clone(),
            email: self.email.clone(),
            access_token: self.access_token.as_ref().map(decode),
            refresh_token: self.refresh_token.as_ref().map(decode),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anon_key: Option<String>,
    pub user: CurrentUser,
    pub delivered_after_ms: u64,
    pub read_after_ms: u64,
    pub seed_demo_data: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SavedSession>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            backend_url: None,
            anon_key: None,
            user: CurrentUser::new("me", "Me"),
            delivered_after_ms: DEFAULT_DELIVERED_AFTER_MS,
            read_after_ms: DEFAULT_READ_AFTER_MS,
            seed_demo_data: true,
            session: None,
        }
    }
}

impl AppConfig {
    pub fn timings(&self) -> Result<DeliveryTimings> {
        DeliveryTimings::from_millis(self.delivered_after_ms, self.read_after_ms)
    }

    /// Overrides from `lookup`, which is `std::env::var` outside of tests.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BACKEND_URL).filter(|v| !v.is_empty()) {
            self.backend_url = Some(url);
        }
        if let Some(key) = lookup(ENV_ANON_KEY).filter(|v| !v.is_empty()) {
            self.anon_key = Some(key);
        }
    }

    /// Record the backend's current session. Returns whether the stored one
    /// changed and the file needs saving.
    pub fn remember_session(&mut self, session: Option<&AuthSession>) -> bool {
        let saved = session.map(SavedSession::new);
        if saved == self.session {
            return false;
        }
        info!(
            "Stored session updated for {}",
            saved.as_ref().map(|s| s.user_id.as_str()).unwrap_or("nobody")
        );
        self.session = saved;
        true
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    /// The hosted service client, if the service is configured.
    pub fn backend(&self) -> Result<RestBackend> {
        let url = self
            .backend_url
            .as_deref()
            .ok_or_else(|| anyhow!("Missing backend URL (set {} or backend_url in config)", ENV_BACKEND_URL))?;
        let key = self
            .anon_key
            .as_deref()
            .ok_or_else(|| anyhow!("Missing backend key (set {} or anon_key in config)", ENV_ANON_KEY))?;

        let backend = RestBackend::new(url, key);
        Ok(match &self.session {
            Some(saved) => backend.with_session(saved.to_session()),
            None => backend,
        })
    }
}

pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| anyhow!("Could not determine config directory"))?
        .join("verichat");

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

static CONFIG_PATH_OVERRIDE: OnceCell<PathBuf> = OnceCell::new();

/// Use `path` instead of the default config location. Only the first call wins.
pub fn set_config_path_override(path: PathBuf) {
    if CONFIG_PATH_OVERRIDE.set(path).is_err() {
        log::warn!("Config path override already set; ignoring");
    }
}

pub fn get_config_path() -> Result<PathBuf> {
    if let Some(path) = CONFIG_PATH_OVERRIDE.get() {
        return Ok(path.clone());
    }
    Ok(get_config_dir()?.join("config.json"))
}

/// Loads the config file, falling back to defaults when it doesn't exist.
/// Validates the delivery timings.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        info!("No config at {}, using defaults", path.display());
        return Ok(AppConfig::default());
    }

    let mut file = File::open(path)?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;

    let config: AppConfig = serde_json::from_str(&contents)
        .with_context(|| format!("Invalid config file {}", path.display()))?;
    config.timings()?;
    info!("Loaded config for {} from {}", config.user.id, path.display());

    Ok(config)
}

pub fn save_config_to(path: &Path, config: &AppConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, config)?;

    info!("Config saved to {}", path.display());
    Ok(())
}

pub fn load_config() -> Result<AppConfig> {
    let mut config = load_config_from(&get_config_path()?)?;
    config.apply_env_overrides();
    Ok(config)
}

pub fn save_config(config: &AppConfig) -> Result<()> {
    save_config_to(&get_config_path()?, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_replace_file_values() {
        let mut config = AppConfig {
            backend_url: Some("https://file.example".to_string()),
            ..AppConfig::default()
        };
        config.apply_overrides(|key| match key {
            ENV_BACKEND_URL => Some("https://env.example".to_string()),
            ENV_ANON_KEY => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.backend_url.as_deref(), Some("https://env.example"));
        assert_eq!(config.anon_key, None);
    }

    #[test]
    fn test_saved_session_is_encoded() {
        let session = AuthSession {
            user_id: "u1".to_string(),
            email: None,
            access_token: Some("secret-token".to_string()),
            refresh_token: None,
        };
        let saved = SavedSession::new(&session);
        assert_ne!(saved.access_token.as_deref(), Some("secret-token"));
        assert_eq!(saved.to_session(), session);
    }

    #[test]
    fn test_remember_session_reports_changes() {
        let mut session = AuthSession {
            user_id: "u1".to_string(),
            email: None,
            access_token: Some("old".to_string()),
            refresh_token: Some("r1".to_string()),
        };
        let mut config = AppConfig::default();

        assert!(config.remember_session(Some(&session)));
        assert!(!config.remember_session(Some(&session)));

        session.access_token = Some("renewed".to_string());
        session.refresh_token = Some("r2".to_string());
        assert!(config.remember_session(Some(&session)));
        assert_eq!(config.session.as_ref().unwrap().to_session(), session);

        assert!(config.remember_session(None));
        assert_eq!(config.session, None);
    }

    #[test]
    fn test_backend_requires_url_and_key() {
        let mut config = AppConfig::default();
        assert!(config.backend().is_err());
        config.backend_url = Some("https://example.test".to_string());
        config.anon_key = Some("anon".to_string());
        assert!(config.backend().is_ok());
    }
}
