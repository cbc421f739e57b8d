use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::backend::Backend;
use crate::error::{AuthError, Result};
use crate::storage::keys;

const SIGN_IN_PATH: &str = "/api/v1/auth/google";

/// Exchanges a Google Identity credential for the app's own bearer token.
pub struct GoogleSignIn {
    backend: Arc<Backend>,
}

#[derive(Debug, Deserialize)]
struct SignInResponse {
    #[serde(default, alias = "token")]
    access_token: String,
    #[serde(default)]
    detail: Option<String>,
}

impl GoogleSignIn {
    pub fn new(backend: Arc<Backend>) -> Self {
        Self { backend }
    }

    /// Stores the issued token under `token` so later requests authenticate.
    pub fn sign_in(&self, credential: &str) -> Result<String> {
        let resp: SignInResponse = self.backend.post_json(
            SIGN_IN_PATH,
            &json!({ "credential": credential }),
            "Google sign-in failed",
        )?;
        if resp.access_token.is_empty() {
            return Err(AuthError::Backend {
                status: 200,
                message: resp
                    .detail
                    .unwrap_or_else(|| "Google sign-in failed".to_string()),
            });
        }
        self.backend
            .store()
            .set(keys::TOKEN, &resp.access_token)
            .map_err(AuthError::storage)?;
        info!("signed in with google");
        Ok(resp.access_token)
    }
}
