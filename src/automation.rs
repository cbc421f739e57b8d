use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::backend::Backend;
use crate::error::{AuthError, Result};
use crate::platform::Platform;

const START_PATH: &str = "/api/v1/comment-automation/start";
const YOUTUBE_START_PATH: &str = "/api/v1/comment-automation/youtube/start";
const YOUTUBE_STATUS_PATH: &str = "/api/v1/comment-automation/youtube/status";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomationRequest {
    pub tone: String,
    pub style: String,
    pub platform: Platform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AutomationStats {
    #[serde(default)]
    pub comments_processed: u64,
    #[serde(default)]
    pub successful_responses: u64,
    #[serde(default)]
    pub failed_responses: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AutomationResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub stats: AutomationStats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automation_id: Option<String>,
}

/// `Manual` processes the current backlog once; `Auto` keeps replying in
/// the background and must be polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutomationMode {
    #[default]
    Manual,
    Auto,
}

impl fmt::Display for AutomationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AutomationMode::Manual => f.write_str("manual"),
            AutomationMode::Auto => f.write_str("auto"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AutomationStatus {
    #[serde(default)]
    pub automation_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub stats: AutomationStats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AutomationStatus {
    pub fn is_finished(&self) -> bool {
        matches!(
            self.status.as_str(),
            "completed" | "failed" | "stopped" | "cancelled"
        )
    }
}

#[derive(Serialize)]
struct YoutubeStartBody<'a> {
    #[serde(flatten)]
    request: &'a AutomationRequest,
    mode: AutomationMode,
}

/// Single-shot triggers for backend comment-reply jobs. Nothing here
/// retries or polls on its own.
pub struct AutomationService {
    backend: Arc<Backend>,
}

impl AutomationService {
    pub fn new(backend: Arc<Backend>) -> Self {
        Self { backend }
    }

    pub fn start(&self, request: &AutomationRequest) -> Result<AutomationResponse> {
        validate(request)?;
        let resp: AutomationResponse =
            self.backend
                .post_json(START_PATH, request, "Failed to start automation")?;
        info!(
            platform = %request.platform,
            processed = resp.stats.comments_processed,
            succeeded = resp.stats.successful_responses,
            failed = resp.stats.failed_responses,
            "automation run finished"
        );
        Ok(resp)
    }

    /// YouTube-specific start that can leave a job running; the returned
    /// `automation_id` feeds [`AutomationService::status`].
    pub fn start_youtube(
        &self,
        request: &AutomationRequest,
        mode: AutomationMode,
    ) -> Result<AutomationResponse> {
        validate(request)?;
        let body = YoutubeStartBody { request, mode };
        let resp: AutomationResponse = self.backend.post_json(
            YOUTUBE_START_PATH,
            &body,
            "Failed to start YouTube automation",
        )?;
        if mode == AutomationMode::Auto && resp.automation_id.is_none() {
            return Err(AuthError::Decode(
                "automation id missing from auto-mode response".into(),
            ));
        }
        Ok(resp)
    }

    pub fn status(&self, automation_id: &str) -> Result<AutomationStatus> {
        let id = automation_id.trim();
        if id.is_empty() {
            return Err(AuthError::InvalidRequest("automation id required".into()));
        }
        let path = format!("{YOUTUBE_STATUS_PATH}/{id}");
        self.backend
            .get_json(&path, "Failed to get automation status")
    }
}

fn validate(request: &AutomationRequest) -> Result<()> {
    if request.tone.trim().is_empty() || request.style.trim().is_empty() {
        return Err(AuthError::InvalidRequest("tone and style are required".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_omits_absent_post_url() {
        let request = AutomationRequest {
            tone: "casual".into(),
            style: "concise".into(),
            platform: Platform::Instagram,
            post_url: None,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"tone": "casual", "style": "concise", "platform": "instagram"})
        );
    }

    #[test]
    fn youtube_body_flattens_request() {
        let request = AutomationRequest {
            tone: "friendly".into(),
            style: "detailed".into(),
            platform: Platform::Youtube,
            post_url: Some("https://youtu.be/abc".into()),
        };
        let body = YoutubeStartBody {
            request: &request,
            mode: AutomationMode::Auto,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "tone": "friendly",
                "style": "detailed",
                "platform": "youtube",
                "post_url": "https://youtu.be/abc",
                "mode": "auto"
            })
        );
    }

    #[test]
    fn missing_stats_default_to_zero() {
        let resp: AutomationResponse = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert_eq!(resp.stats, AutomationStats::default());
    }
}
