//! Per-platform OAuth handshakes.
//!
//! Each provider shapes its handshake differently (authorization code,
//! implicit-grant token, server-minted correlation state), so every platform
//! gets its own [`PlatformAuth`] implementation and the dispatcher picks one
//! through the [`Registry`].

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::backend::Backend;
use crate::config::{Config, ProviderConfig};
use crate::error::{AuthError, Result};
use crate::platform::Platform;

pub mod facebook;
pub mod google;
pub mod instagram;
pub mod linkedin;
pub mod twitter;
pub mod youtube;

pub use facebook::FacebookAuth;
pub use google::GoogleSignIn;
pub use instagram::InstagramAuth;
pub use linkedin::LinkedinAuth;
pub use twitter::TwitterAuth;
pub use youtube::YoutubeAuth;

pub trait PlatformAuth: Send + Sync {
    fn platform(&self) -> Platform;

    /// Provider authorization URL. May persist a correlation value locally
    /// before returning.
    fn auth_url(&self) -> Result<String>;

    /// Exchanges a single-use code (or an implicit-grant token) with the
    /// backend. Callers must route this through an
    /// [`ExchangeGuard`](crate::guard::ExchangeGuard).
    fn handle_callback(&self, identifier: &str, state: Option<&str>) -> Result<AuthStatus>;

    /// Idempotent read of the backend's view of the connection.
    fn check_status(&self) -> Result<AuthStatus>;
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AuthStatus {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, alias = "authenticated", alias = "is_authenticated")]
    pub auth_status: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AuthStatus {
    /// A 2xx exchange response that reports neither success nor a live
    /// connection is still a rejection.
    pub(crate) fn confirm(self, fallback: &str) -> Result<Self> {
        if self.success || self.auth_status {
            Ok(self)
        } else {
            Err(AuthError::Backend {
                status: 200,
                message: self
                    .message
                    .filter(|msg| !msg.trim().is_empty())
                    .unwrap_or_else(|| fallback.to_string()),
            })
        }
    }
}

/// Body returned by endpoints that mint an authorization URL server-side.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AuthUrlResponse {
    #[serde(alias = "auth_url", alias = "authorization_url")]
    pub url: String,
    #[serde(default)]
    pub state: Option<String>,
}

/// Builds an authorize URL for providers configured entirely client-side.
pub(crate) fn authorize_url(
    provider: &ProviderConfig,
    redirect_uri: &str,
    response_type: &str,
    state: &str,
) -> Result<String> {
    if provider.client_id.trim().is_empty() {
        return Err(AuthError::Config(format!(
            "{state}: client id is required"
        )));
    }
    let mut auth = Url::parse(&provider.auth_url)?;
    auth.query_pairs_mut()
        .append_pair("client_id", &provider.client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("scope", &provider.scopes.join(","))
        .append_pair("response_type", response_type)
        .append_pair("state", state);
    Ok(auth.to_string())
}

#[derive(Default)]
pub struct Registry {
    clients: HashMap<Platform, Arc<dyn PlatformAuth>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wires the production client for every platform.
    pub fn standard(backend: Arc<Backend>, cfg: &Config) -> Self {
        let redirect_uri = cfg.app.redirect_uri.clone();
        let mut registry = Self::new();
        registry.register(Arc::new(InstagramAuth::new(
            backend.clone(),
            cfg.instagram.clone(),
            redirect_uri.clone(),
        )));
        registry.register(Arc::new(YoutubeAuth::new(backend.clone())));
        registry.register(Arc::new(TwitterAuth::new(backend.clone())));
        registry.register(Arc::new(LinkedinAuth::new(backend.clone())));
        registry.register(Arc::new(FacebookAuth::new(
            backend,
            cfg.facebook.clone(),
            redirect_uri,
        )));
        registry
    }

    /// Replaces any client already registered for the same platform.
    pub fn register(&mut self, client: Arc<dyn PlatformAuth>) {
        self.clients.insert(client.platform(), client);
    }

    pub fn get(&self, platform: Platform) -> Option<Arc<dyn PlatformAuth>> {
        self.clients.get(&platform).cloned()
    }
}
