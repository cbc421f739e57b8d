use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const DEFAULT_ENV_PREFIX: &str = "SOCIAL_CONNECT";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default = "default_instagram")]
    pub instagram: ProviderConfig,
    #[serde(default = "default_facebook")]
    pub facebook: ProviderConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            timeout: default_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".into()
}

fn default_user_agent() -> String {
    format!("social-connect/{}", crate::VERSION)
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// Callback route registered with every provider.
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    #[serde(default = "default_dashboard_path")]
    pub dashboard_path: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            redirect_uri: default_redirect_uri(),
            dashboard_path: default_dashboard_path(),
        }
    }
}

fn default_redirect_uri() -> String {
    "http://127.0.0.1:3000/auth/callback".into()
}

fn default_dashboard_path() -> String {
    "/dashboard".into()
}

/// Static OAuth settings for providers whose authorize URL is built locally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ProviderConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub auth_url: String,
}

fn default_instagram() -> ProviderConfig {
    ProviderConfig {
        client_id: String::new(),
        scopes: vec![
            "instagram_business_basic".into(),
            "instagram_business_manage_comments".into(),
        ],
        auth_url: "https://www.instagram.com/oauth/authorize".into(),
    }
}

fn default_facebook() -> ProviderConfig {
    ProviderConfig {
        client_id: String::new(),
        scopes: vec![
            "pages_show_list".into(),
            "pages_read_engagement".into(),
            "pages_manage_engagement".into(),
        ],
        auth_url: "https://www.facebook.com/v18.0/dialog/oauth".into(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthConfig {
    #[serde(default = "default_min_exchange_interval", with = "humantime_serde")]
    pub min_exchange_interval: Duration,
    #[serde(default = "default_pending_ttl", with = "humantime_serde")]
    pub pending_ttl: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            min_exchange_interval: default_min_exchange_interval(),
            pending_ttl: default_pending_ttl(),
        }
    }
}

fn default_min_exchange_interval() -> Duration {
    Duration::from_millis(2000)
}

fn default_pending_ttl() -> Duration {
    Duration::from_secs(15 * 60)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

impl Config {
    pub fn with_defaults() -> Self {
        Self {
            instagram: default_instagram(),
            facebook: default_facebook(),
            ..Self::default()
        }
    }
}

/// Defaults, then the YAML file (explicit path or the per-user default),
/// then `<PREFIX>_SECTION__FIELD` environment overrides.
pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::with_defaults();
    let file = options.config_file.or_else(default_config_path);
    if let Some(path) = file.filter(|path| path.exists()) {
        cfg = merge_config(cfg, read_config_file(&path)?);
    }
    load_env(
        &mut cfg,
        options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX),
    );
    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("config: failed to read {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("config: failed to parse {}", path.display()))?;
    Ok(config)
}

fn merge_provider(base: &mut ProviderConfig, other: ProviderConfig) {
    if !other.client_id.is_empty() {
        base.client_id = other.client_id;
    }
    if !other.scopes.is_empty() {
        base.scopes = other.scopes;
    }
    if !other.auth_url.is_empty() {
        base.auth_url = other.auth_url;
    }
}

fn merge_config(mut base: Config, other: Config) -> Config {
    if !other.backend.base_url.is_empty() {
        base.backend.base_url = other.backend.base_url;
    }
    if !other.backend.user_agent.is_empty() {
        base.backend.user_agent = other.backend.user_agent;
    }
    if !other.backend.timeout.is_zero() {
        base.backend.timeout = other.backend.timeout;
    }

    if !other.app.redirect_uri.is_empty() {
        base.app.redirect_uri = other.app.redirect_uri;
    }
    if !other.app.dashboard_path.is_empty() {
        base.app.dashboard_path = other.app.dashboard_path;
    }

    merge_provider(&mut base.instagram, other.instagram);
    merge_provider(&mut base.facebook, other.facebook);

    base.auth.min_exchange_interval = other.auth.min_exchange_interval;
    if !other.auth.pending_ttl.is_zero() {
        base.auth.pending_ttl = other.auth.pending_ttl;
    }

    if other.storage.path.is_some() {
        base.storage.path = other.storage.path;
    }

    base
}

fn load_env(cfg: &mut Config, prefix: &str) {
    let prefix = format!("{}_", prefix.to_uppercase());
    let overrides: HashMap<String, String> = env::vars()
        .filter_map(|(key, value)| {
            let field = key
                .strip_prefix(&prefix)?
                .to_ascii_lowercase()
                .replace("__", ".");
            Some((field, value))
        })
        .collect();
    for (field, value) in overrides {
        apply_env_value(cfg, &field, value);
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "backend.base_url" => cfg.backend.base_url = value,
        "backend.user_agent" => cfg.backend.user_agent = value,
        "backend.timeout" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.backend.timeout = duration;
            }
        }
        "app.redirect_uri" => cfg.app.redirect_uri = value,
        "app.dashboard_path" => cfg.app.dashboard_path = value,
        "instagram.client_id" => cfg.instagram.client_id = value,
        "instagram.scopes" => cfg.instagram.scopes = split_list(&value),
        "instagram.auth_url" => cfg.instagram.auth_url = value,
        "facebook.client_id" => cfg.facebook.client_id = value,
        "facebook.scopes" => cfg.facebook.scopes = split_list(&value),
        "facebook.auth_url" => cfg.facebook.auth_url = value,
        "auth.min_exchange_interval" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.auth.min_exchange_interval = duration;
            }
        }
        "auth.pending_ttl" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.auth.pending_ttl = duration;
            }
        }
        "storage.path" => cfg.storage.path = Some(PathBuf::from(value)),
        _ => {}
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("social-connect").join("config.yaml"))
}
