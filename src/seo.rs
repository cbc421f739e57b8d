use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::backend::Backend;
use crate::error::{AuthError, Result};
use crate::platform::Platform;

const OPTIMIZE_PATH: &str = "/api/v1/seo/optimize";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeoRequest {
    pub content: String,
    pub platform: Platform,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct SeoResponse {
    #[serde(default, alias = "optimized")]
    pub optimized_content: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub score: Option<f64>,
}

pub struct SeoService {
    backend: Arc<Backend>,
}

impl SeoService {
    pub fn new(backend: Arc<Backend>) -> Self {
        Self { backend }
    }

    pub fn optimize(&self, request: &SeoRequest) -> Result<SeoResponse> {
        if request.content.trim().is_empty() {
            return Err(AuthError::InvalidRequest("content to optimize is required".into()));
        }
        self.backend
            .post_json(OPTIMIZE_PATH, request, "Failed to optimize content")
    }
}
