use std::sync::Arc;

use serde_json::json;
use tracing::{debug, warn};

use super::{AuthStatus, AuthUrlResponse, PlatformAuth};
use crate::backend::Backend;
use crate::error::{AuthError, Result};
use crate::platform::Platform;

const URL_PATH: &str = "/api/v1/linkedin/auth/url";
const CALLBACK_PATH: &str = "/api/v1/linkedin/auth/callback";
const STATUS_PATH: &str = "/api/v1/linkedin/auth/status";

/// LinkedIn's `state` is minted by the backend and kept locally until the
/// redirect returns; the exchange is refused unless both values agree.
pub struct LinkedinAuth {
    backend: Arc<Backend>,
}

impl LinkedinAuth {
    pub fn new(backend: Arc<Backend>) -> Self {
        Self { backend }
    }

    /// The correlation value persisted by the last `auth_url` call, if any.
    pub fn stored_state(&self) -> Result<Option<String>> {
        self.backend
            .store()
            .get(&Platform::Linkedin.auth_state_key())
            .map_err(AuthError::storage)
    }
}

impl PlatformAuth for LinkedinAuth {
    fn platform(&self) -> Platform {
        Platform::Linkedin
    }

    fn auth_url(&self) -> Result<String> {
        let resp: AuthUrlResponse = self
            .backend
            .get_json(URL_PATH, "Failed to get LinkedIn authorization URL")?;
        let state = resp
            .state
            .filter(|state| !state.is_empty())
            .ok_or_else(|| AuthError::Decode("LinkedIn authorization state missing".into()))?;
        self.backend
            .store()
            .set(&Platform::Linkedin.auth_state_key(), &state)
            .map_err(AuthError::storage)?;
        debug!("stored linkedin correlation state");
        Ok(resp.url)
    }

    fn handle_callback(&self, code: &str, state: Option<&str>) -> Result<AuthStatus> {
        let stored = self.stored_state()?;
        let state = match (stored.as_deref(), state) {
            (Some(expected), Some(returned)) if !expected.is_empty() && expected == returned => {
                returned
            }
            _ => {
                warn!(
                    stored = stored.is_some(),
                    "linkedin state missing or mismatched"
                );
                return Err(AuthError::StateMismatch);
            }
        };

        let result: Result<AuthStatus> = self.backend.post_json(
            CALLBACK_PATH,
            &json!({ "code": code, "state": state }),
            "Failed to authenticate with LinkedIn",
        );
        // The code is spent either way; a stale state must not validate a
        // later redirect.
        self.backend
            .store()
            .remove(&Platform::Linkedin.auth_state_key())
            .map_err(AuthError::storage)?;
        result?.confirm("Failed to authenticate with LinkedIn")
    }

    fn check_status(&self) -> Result<AuthStatus> {
        self.backend
            .get_json(STATUS_PATH, "Failed to check LinkedIn authentication status")
    }
}
