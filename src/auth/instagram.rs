use std::sync::Arc;

use serde_json::json;

use super::{authorize_url, AuthStatus, PlatformAuth};
use crate::backend::Backend;
use crate::config::ProviderConfig;
use crate::error::Result;
use crate::platform::Platform;

const AUTH_PATH: &str = "/api/v1/comment-automation/instagram/auth";
const CHECK_PATH: &str = "/api/v1/comment-automation/instagram/auth/check";

/// Authorization-code flow whose URL is assembled from static app settings.
pub struct InstagramAuth {
    backend: Arc<Backend>,
    provider: ProviderConfig,
    redirect_uri: String,
}

impl InstagramAuth {
    pub fn new(backend: Arc<Backend>, provider: ProviderConfig, redirect_uri: String) -> Self {
        Self {
            backend,
            provider,
            redirect_uri,
        }
    }
}

impl PlatformAuth for InstagramAuth {
    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    fn auth_url(&self) -> Result<String> {
        authorize_url(
            &self.provider,
            &self.redirect_uri,
            "code",
            Platform::Instagram.as_str(),
        )
    }

    fn handle_callback(&self, code: &str, _state: Option<&str>) -> Result<AuthStatus> {
        let status: AuthStatus = self.backend.post_json(
            AUTH_PATH,
            &json!({ "code": code }),
            "Failed to authenticate with Instagram",
        )?;
        status.confirm("Failed to authenticate with Instagram")
    }

    fn check_status(&self) -> Result<AuthStatus> {
        self.backend
            .get_json(CHECK_PATH, "Failed to check Instagram authentication status")
    }
}
