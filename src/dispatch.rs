//! Callback dispatch: the single entry point reached after every provider
//! redirect.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use url::{form_urlencoded, Url};

use crate::auth::{AuthStatus, GoogleSignIn, PlatformAuth, Registry};
use crate::error::{AuthError, Result};
use crate::guard::ExchangeGuard;
use crate::pending::{PendingModalState, PendingStore};
use crate::platform::Platform;
use crate::storage::{keys, Store};

/// Query and fragment parameters a provider may hand back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub credential: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
    pub fragment: Option<String>,
}

impl CallbackParams {
    /// Accepts an absolute URL or a path with query and fragment.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let url = match Url::parse(input) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                Url::parse("http://callback.local/")?.join(input)?
            }
            Err(err) => return Err(AuthError::Unrecognized(err.to_string())),
        };

        let mut params = Self::default();
        for (key, value) in url.query_pairs() {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            let slot = match &*key {
                "code" => &mut params.code,
                "credential" => &mut params.credential,
                "state" => &mut params.state,
                "error" => &mut params.error,
                "error_description" => &mut params.error_description,
                _ => continue,
            };
            *slot = Some(value.to_string());
        }
        params.fragment = url
            .fragment()
            .map(|fragment| fragment.trim_start_matches('#'))
            .filter(|fragment| !fragment.is_empty())
            .map(str::to_string);
        Ok(params)
    }

    pub fn fragment_pairs(&self) -> HashMap<String, String> {
        self.fragment
            .as_deref()
            .map(|fragment| {
                form_urlencoded::parse(fragment.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Value remembered to skip re-processing the same redirect.
    fn dedup_key(&self) -> Option<String> {
        self.code
            .as_ref()
            .map(|code| format!("code:{code}"))
            .or_else(|| {
                self.credential
                    .as_ref()
                    .map(|credential| format!("credential:{credential}"))
            })
            .or_else(|| {
                self.fragment
                    .as_ref()
                    .map(|fragment| format!("fragment:{fragment}"))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Google,
    Platform(Platform),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Google {
        credential: String,
    },
    Platform {
        platform: Platform,
        identifier: String,
        state: Option<String>,
    },
}

impl Route {
    pub fn target(&self) -> Target {
        match self {
            Route::Google { .. } => Target::Google,
            Route::Platform { platform, .. } => Target::Platform(*platform),
        }
    }
}

/// Decides which handshake a redirect belongs to.
///
/// `linkedin_state` is the correlation value stored when a LinkedIn flow was
/// started. A code carrying a state that names no platform is only accepted
/// as LinkedIn while such a flow is pending.
pub fn classify(params: &CallbackParams, linkedin_state: Option<&str>) -> Result<Route> {
    if let Some(error) = &params.error {
        let description = params
            .error_description
            .clone()
            .unwrap_or_else(|| error.clone());
        return Err(AuthError::Provider {
            error: error.clone(),
            description,
        });
    }

    if params.code.is_none() && params.credential.is_none() && params.fragment.is_none() {
        return Err(AuthError::MissingCode);
    }

    if let Some(credential) = &params.credential {
        return Ok(Route::Google {
            credential: credential.clone(),
        });
    }

    if let Some(code) = &params.code {
        let state = params.state.as_deref().unwrap_or_default();
        for platform in [Platform::Instagram, Platform::Twitter, Platform::Youtube] {
            if state == platform.as_str() {
                return Ok(Route::Platform {
                    platform,
                    identifier: code.clone(),
                    state: Some(state.to_string()),
                });
            }
        }
        if state.is_empty() {
            return Err(AuthError::Unrecognized(
                "authorization code without a state parameter".into(),
            ));
        }
        return match linkedin_state {
            Some(expected) if expected == state => Ok(Route::Platform {
                platform: Platform::Linkedin,
                identifier: code.clone(),
                state: Some(state.to_string()),
            }),
            Some(_) => Err(AuthError::StateMismatch),
            None => Err(AuthError::Unrecognized(format!(
                "no pending sign-in matches state {state:?}"
            ))),
        };
    }

    let pairs = params.fragment_pairs();
    let token = ["long_lived_token", "access_token"]
        .iter()
        .filter_map(|key| pairs.get(*key))
        .find(|token| !token.is_empty());
    match token {
        Some(token) => Ok(Route::Platform {
            platform: Platform::Facebook,
            identifier: token.clone(),
            state: pairs.get("state").cloned(),
        }),
        None => Err(AuthError::Unrecognized(
            "fragment carries no access token".into(),
        )),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub target: Target,
    pub message: String,
    pub redirect_to: String,
    pub restored: Option<PendingModalState>,
    pub status: Option<AuthStatus>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum DispatchState {
    #[default]
    Idle,
    Processing(Target),
    Succeeded(Completion),
    Failed(String),
}

impl DispatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DispatchState::Succeeded(_) | DispatchState::Failed(_))
    }
}

pub struct Dispatcher {
    registry: Registry,
    google: Option<GoogleSignIn>,
    guard: ExchangeGuard,
    pending: PendingStore,
    store: Arc<Store>,
    dashboard_path: String,
    last_input: Mutex<Option<String>>,
    state: Mutex<DispatchState>,
}

impl Dispatcher {
    pub fn new(
        registry: Registry,
        store: Arc<Store>,
        guard: ExchangeGuard,
        pending: PendingStore,
    ) -> Self {
        Self {
            registry,
            google: None,
            guard,
            pending,
            store,
            dashboard_path: "/dashboard".into(),
            last_input: Mutex::new(None),
            state: Mutex::new(DispatchState::Idle),
        }
    }

    pub fn with_google(mut self, google: GoogleSignIn) -> Self {
        self.google = Some(google);
        self
    }

    pub fn with_dashboard_path(mut self, path: impl Into<String>) -> Self {
        self.dashboard_path = path.into();
        self
    }

    pub fn client(&self, platform: Platform) -> Option<Arc<dyn PlatformAuth>> {
        self.registry.get(platform)
    }

    pub fn state(&self) -> DispatchState {
        self.state.lock().clone()
    }

    pub fn handle(&self, url: &str) -> DispatchState {
        match CallbackParams::parse(url) {
            Ok(params) => self.handle_params(&params),
            Err(err) => self.fail(err),
        }
    }

    pub fn handle_params(&self, params: &CallbackParams) -> DispatchState {
        if let Some(key) = params.dedup_key() {
            let mut last = self.last_input.lock();
            if last.as_deref() == Some(key.as_str()) {
                debug!("callback already processed, skipping");
                drop(last);
                return self.state();
            }
            *last = Some(key);
        }

        let linkedin_state = match self.store.get(&Platform::Linkedin.auth_state_key()) {
            Ok(state) => state,
            Err(err) => return self.fail(AuthError::storage(err)),
        };
        let route = match classify(params, linkedin_state.as_deref()) {
            Ok(route) => route,
            Err(err) => return self.fail(err),
        };

        debug!(target_kind = ?route.target(), "dispatching callback");
        self.set_state(DispatchState::Processing(route.target()));

        let result = match route {
            Route::Google { credential } => self.complete_google(&credential),
            Route::Platform {
                platform,
                identifier,
                state,
            } => self.complete_platform(platform, &identifier, state.as_deref()),
        };
        match result {
            Ok(completion) => {
                info!(message = %completion.message, redirect = %completion.redirect_to, "callback handled");
                self.set_state(DispatchState::Succeeded(completion));
                self.state()
            }
            Err(err) => self.fail(err),
        }
    }

    fn complete_platform(
        &self,
        platform: Platform,
        identifier: &str,
        state: Option<&str>,
    ) -> Result<Completion> {
        let client = self
            .registry
            .get(platform)
            .ok_or_else(|| AuthError::Config(format!("no client registered for {platform}")))?;
        let status = self.guard.exchange(platform, identifier, || {
            client.handle_callback(identifier, state)
        })?;

        let restored = match self.pending.take(platform) {
            Ok(restored) => restored,
            Err(err) => {
                warn!(%platform, error = %err, "could not restore pending state");
                None
            }
        };

        Ok(Completion {
            target: Target::Platform(platform),
            message: format!("{} connected successfully!", platform.display_name()),
            redirect_to: self.dashboard_path.clone(),
            restored,
            status: Some(status),
        })
    }

    fn complete_google(&self, credential: &str) -> Result<Completion> {
        let google = self
            .google
            .as_ref()
            .ok_or_else(|| AuthError::Config("google sign-in is not configured".into()))?;
        google.sign_in(credential)?;
        let redirect_to = self
            .store
            .take(keys::REDIRECT_PATH)
            .map_err(AuthError::storage)?
            .filter(|path| !path.is_empty())
            .unwrap_or_else(|| self.dashboard_path.clone());
        Ok(Completion {
            target: Target::Google,
            message: "Signed in successfully!".into(),
            redirect_to,
            restored: None,
            status: None,
        })
    }

    fn fail(&self, err: AuthError) -> DispatchState {
        warn!(error = %err, "callback failed");
        let state = DispatchState::Failed(err.to_string());
        self.set_state(state.clone());
        state
    }

    fn set_state(&self, state: DispatchState) {
        *self.state.lock() = state;
    }
}
