use std::sync::Arc;

use serde_json::json;

use super::{authorize_url, AuthStatus, PlatformAuth};
use crate::backend::Backend;
use crate::config::ProviderConfig;
use crate::error::Result;
use crate::platform::Platform;

const AUTH_PATH: &str = "/api/v1/comment-automation/facebook/auth";
const CHECK_PATH: &str = "/api/v1/comment-automation/facebook/auth/check";

/// Implicit-grant flow: the provider hands back a token in the URL fragment
/// rather than a code in the query string.
pub struct FacebookAuth {
    backend: Arc<Backend>,
    provider: ProviderConfig,
    redirect_uri: String,
}

impl FacebookAuth {
    pub fn new(backend: Arc<Backend>, provider: ProviderConfig, redirect_uri: String) -> Self {
        Self {
            backend,
            provider,
            redirect_uri,
        }
    }
}

impl PlatformAuth for FacebookAuth {
    fn platform(&self) -> Platform {
        Platform::Facebook
    }

    fn auth_url(&self) -> Result<String> {
        authorize_url(
            &self.provider,
            &self.redirect_uri,
            "token",
            Platform::Facebook.as_str(),
        )
    }

    fn handle_callback(&self, access_token: &str, _state: Option<&str>) -> Result<AuthStatus> {
        let status: AuthStatus = self.backend.post_json(
            AUTH_PATH,
            &json!({ "access_token": access_token }),
            "Failed to authenticate with Facebook",
        )?;
        status.confirm("Failed to authenticate with Facebook")
    }

    fn check_status(&self) -> Result<AuthStatus> {
        self.backend
            .get_json(CHECK_PATH, "Failed to check Facebook authentication status")
    }
}
