use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::{Client as HttpClient, Response};
use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::error::{AuthError, Result};
use crate::storage::{keys, Store};

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Option<Duration>,
    pub http_client: Option<HttpClient>,
}

/// JSON client for the product's REST API.
///
/// Every request carries the session cookie jar and, when a login token is
/// stored locally, an `Authorization: Bearer` header.
pub struct Backend {
    http: HttpClient,
    base_url: Url,
    user_agent: String,
    store: Arc<Store>,
}

impl Backend {
    pub fn new(store: Arc<Store>, config: ClientConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(AuthError::Config("backend base url required".into()));
        }
        let base_url = Url::parse(config.base_url.trim_end_matches('/'))?;
        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .cookie_store(true)
                .timeout(config.timeout.unwrap_or(Duration::from_secs(30)))
                .build()
                .map_err(|err| AuthError::Config(format!("build http client: {err}")))?,
        };
        let user_agent = if config.user_agent.trim().is_empty() {
            format!("social-connect/{}", crate::VERSION)
        } else {
            config.user_agent
        };

        Ok(Self {
            http,
            base_url,
            user_agent,
            store,
        })
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn get_json<T>(&self, path: &str, fallback: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let resp = self.request(Method::GET, path, None, fallback)?;
        Ok(resp.json()?)
    }

    pub fn post_json<B, T>(&self, path: &str, body: &B, fallback: &str) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body)?;
        let resp = self.request(Method::POST, path, Some(body), fallback)?;
        Ok(resp.json()?)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        let joined = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Ok(Url::parse(&joined)?)
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        fallback: &str,
    ) -> Result<Response> {
        let url = self.endpoint(path)?;
        debug!(%method, %url, "backend request");

        let mut req = self
            .http
            .request(method, url)
            .header(USER_AGENT, self.user_agent.clone())
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json");
        if let Some(token) = self.store.get(keys::TOKEN).map_err(AuthError::storage)? {
            if !token.is_empty() {
                req = req.bearer_auth(token);
            }
        }
        if let Some(body) = body {
            req = req.json(&body);
        }

        let resp = req.send().map_err(|err| {
            warn!(path, error = %err, "backend request failed");
            AuthError::from(err)
        })?;
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let text = resp.text().unwrap_or_default();
        let message = error_message(&text).unwrap_or_else(|| fallback.to_string());
        warn!(path, status = status.as_u16(), %message, "backend rejected request");
        Err(AuthError::Backend {
            status: status.as_u16(),
            message,
        })
    }
}

/// Pulls a displayable message out of an error body: `detail` first (plain
/// string or a list of `{msg}` validation entries), then `message`.
pub fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("detail") {
        Some(Value::String(detail)) if !detail.trim().is_empty() => {
            return Some(detail.clone());
        }
        Some(Value::Array(items)) => {
            let joined = items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    other => other
                        .get("msg")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                })
                .collect::<Vec<_>>()
                .join("; ");
            if !joined.is_empty() {
                return Some(joined);
            }
        }
        _ => {}
    }
    value
        .get("message")
        .and_then(Value::as_str)
        .filter(|msg| !msg.trim().is_empty())
        .map(str::to_string)
}
