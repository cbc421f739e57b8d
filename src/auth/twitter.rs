use std::sync::Arc;

use serde_json::json;

use super::{AuthStatus, AuthUrlResponse, PlatformAuth};
use crate::backend::Backend;
use crate::error::Result;
use crate::platform::Platform;

const URL_PATH: &str = "/api/v1/twitter/auth/url";
const CALLBACK_PATH: &str = "/api/v1/twitter/auth/callback";
const STATUS_PATH: &str = "/api/v1/twitter/auth/status";

/// Twitter's PKCE verifier lives in the backend session, so the code is
/// forwarded together with the state the backend issued.
pub struct TwitterAuth {
    backend: Arc<Backend>,
}

impl TwitterAuth {
    pub fn new(backend: Arc<Backend>) -> Self {
        Self { backend }
    }
}

impl PlatformAuth for TwitterAuth {
    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    fn auth_url(&self) -> Result<String> {
        let resp: AuthUrlResponse = self
            .backend
            .get_json(URL_PATH, "Failed to get Twitter authorization URL")?;
        Ok(resp.url)
    }

    fn handle_callback(&self, code: &str, state: Option<&str>) -> Result<AuthStatus> {
        let status: AuthStatus = self.backend.post_json(
            CALLBACK_PATH,
            &json!({
                "code": code,
                "state": state.unwrap_or(Platform::Twitter.as_str()),
            }),
            "Failed to authenticate with Twitter",
        )?;
        status.confirm("Failed to authenticate with Twitter")
    }

    fn check_status(&self) -> Result<AuthStatus> {
        self.backend
            .get_json(STATUS_PATH, "Failed to check Twitter authentication status")
    }
}
