use std::sync::Arc;

use serde_json::json;

use super::{AuthStatus, AuthUrlResponse, PlatformAuth};
use crate::backend::Backend;
use crate::error::Result;
use crate::platform::Platform;

const URL_PATH: &str = "/api/v1/youtube/auth/url";
const AUTH_PATH: &str = "/api/v1/comment-automation/youtube/auth";
const CHECK_PATH: &str = "/api/v1/comment-automation/youtube/auth/check";

pub struct YoutubeAuth {
    backend: Arc<Backend>,
}

impl YoutubeAuth {
    pub fn new(backend: Arc<Backend>) -> Self {
        Self { backend }
    }
}

impl PlatformAuth for YoutubeAuth {
    fn platform(&self) -> Platform {
        Platform::Youtube
    }

    // Google consent URL, built server-side with `state=youtube`.
    fn auth_url(&self) -> Result<String> {
        let resp: AuthUrlResponse = self
            .backend
            .get_json(URL_PATH, "Failed to get YouTube authorization URL")?;
        Ok(resp.url)
    }

    fn handle_callback(&self, code: &str, _state: Option<&str>) -> Result<AuthStatus> {
        let status: AuthStatus = self.backend.post_json(
            AUTH_PATH,
            &json!({ "code": code }),
            "Failed to authenticate with YouTube",
        )?;
        status.confirm("Failed to authenticate with YouTube")
    }

    fn check_status(&self) -> Result<AuthStatus> {
        self.backend
            .get_json(CHECK_PATH, "Failed to check YouTube authentication status")
    }
}
