mod common;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{ok, store, MockBackend};
use serde_json::json;
use social_connect::auth::{AuthStatus, GoogleSignIn, PlatformAuth, Registry};
use social_connect::config::Config;
use social_connect::dispatch::{DispatchState, Dispatcher, Target};
use social_connect::guard::ExchangeGuard;
use social_connect::pending::{PendingModalState, PendingStore};
use social_connect::storage::{keys, Store};
use social_connect::{AuthError, Platform, Result};
use url::Url;

fn config() -> Config {
    let mut cfg = Config::with_defaults();
    cfg.instagram.client_id = "ig-client".into();
    cfg.facebook.client_id = "fb-client".into();
    cfg.app.redirect_uri = "http://127.0.0.1:3000/auth/callback".into();
    cfg
}

fn dispatcher(mock: &MockBackend, store: Arc<Store>) -> Dispatcher {
    let backend = mock.backend(store.clone());
    Dispatcher::new(
        Registry::standard(backend.clone(), &config()),
        store.clone(),
        ExchangeGuard::default(),
        PendingStore::new(store, Duration::from_secs(900)),
    )
    .with_google(GoogleSignIn::new(backend))
}

fn connected() -> (u16, String) {
    ok(json!({ "success": true, "auth_status": true }))
}

fn completion(state: DispatchState) -> social_connect::dispatch::Completion {
    match state {
        DispatchState::Succeeded(completion) => completion,
        other => panic!("expected success, got {other:?}"),
    }
}

#[test]
fn instagram_auth_url_carries_client_redirect_and_state() {
    let mock = MockBackend::start(|_, _, _| (404, "{}".into()));
    let dispatcher = dispatcher(&mock, store());

    let raw = dispatcher
        .client(Platform::Instagram)
        .unwrap()
        .auth_url()
        .unwrap();
    assert!(raw.contains("redirect_uri=http%3A%2F%2F127.0.0.1%3A3000%2Fauth%2Fcallback"));

    let url = Url::parse(&raw).unwrap();
    let pairs: BTreeMap<_, _> = url.query_pairs().into_owned().collect();
    assert_eq!(pairs["client_id"], "ig-client");
    assert_eq!(pairs["redirect_uri"], "http://127.0.0.1:3000/auth/callback");
    assert_eq!(pairs["response_type"], "code");
    assert_eq!(pairs["state"], "instagram");
    assert!(mock.requests().is_empty());
}

#[test]
fn instagram_callback_restores_pending_settings_once() {
    let mock = MockBackend::start(|_, path, _| match path {
        "/api/v1/comment-automation/instagram/auth" => connected(),
        _ => (404, "{}".into()),
    });
    let store = store();
    let dispatcher = dispatcher(&mock, store.clone());

    let mut settings = BTreeMap::new();
    settings.insert("tone".to_string(), json!("casual"));
    settings.insert("style".to_string(), json!("concise"));
    let saved = PendingModalState::new(settings);
    PendingStore::new(store.clone(), Duration::from_secs(900))
        .save(Platform::Instagram, &saved)
        .unwrap();

    let url = "/auth/callback?code=abc123&state=instagram";
    let done = completion(dispatcher.handle(url));
    assert_eq!(done.target, Target::Platform(Platform::Instagram));
    assert_eq!(done.message, "Instagram connected successfully!");
    assert_eq!(done.redirect_to, "/dashboard");
    let restored = done.restored.expect("pending settings restored");
    assert_eq!(restored.setting("tone"), Some("casual"));
    assert_eq!(restored, saved);

    let exchange = mock
        .last("/api/v1/comment-automation/instagram/auth")
        .unwrap();
    assert_eq!(exchange.method, "POST");
    assert_eq!(exchange.json(), json!({ "code": "abc123" }));
    assert!(store
        .get(&Platform::Instagram.return_state_key())
        .unwrap()
        .is_none());

    // Re-delivering the same redirect is a no-op.
    assert!(matches!(dispatcher.handle(url), DispatchState::Succeeded(_)));
    assert_eq!(mock.count("/api/v1/comment-automation/instagram/auth"), 1);
}

#[test]
fn provider_error_fails_without_backend_call() {
    let mock = MockBackend::start(|_, _, _| connected());
    let dispatcher = dispatcher(&mock, store());

    let state = dispatcher
        .handle("/auth/callback?error=access_denied&error_description=User+denied+access");
    assert_eq!(state, DispatchState::Failed("User denied access".into()));
    assert!(mock.requests().is_empty());
}

#[test]
fn missing_code_is_reported() {
    let mock = MockBackend::start(|_, _, _| connected());
    let dispatcher = dispatcher(&mock, store());

    assert_eq!(
        dispatcher.handle("/auth/callback"),
        DispatchState::Failed("No authentication code found".into())
    );
    assert!(mock.requests().is_empty());
}

#[test]
fn linkedin_state_mismatch_never_reaches_backend() {
    let mock = MockBackend::start(|_, _, _| connected());
    let store = store();
    store
        .set(&Platform::Linkedin.auth_state_key(), "expected-state")
        .unwrap();
    let dispatcher = dispatcher(&mock, store);

    let state = dispatcher.handle("/auth/callback?code=li-code&state=forged");
    assert_eq!(
        state,
        DispatchState::Failed(AuthError::StateMismatch.to_string())
    );
    assert!(mock.requests().is_empty());
}

#[test]
fn linkedin_round_trip_consumes_stored_state() {
    let mock = MockBackend::start(|_, path, _| match path {
        "/api/v1/linkedin/auth/url" => ok(json!({
            "url": "https://www.linkedin.com/oauth/v2/authorization?state=s-123",
            "state": "s-123",
        })),
        "/api/v1/linkedin/auth/callback" => connected(),
        _ => (404, "{}".into()),
    });
    let store = store();
    let dispatcher = dispatcher(&mock, store.clone());

    let url = dispatcher
        .client(Platform::Linkedin)
        .unwrap()
        .auth_url()
        .unwrap();
    assert!(url.starts_with("https://www.linkedin.com/"));
    assert_eq!(
        store.get("linkedin_auth_state").unwrap().as_deref(),
        Some("s-123")
    );

    let done = completion(dispatcher.handle("/auth/callback?code=li-code&state=s-123"));
    assert_eq!(done.message, "LinkedIn connected successfully!");
    let exchange = mock.last("/api/v1/linkedin/auth/callback").unwrap();
    assert_eq!(exchange.json(), json!({ "code": "li-code", "state": "s-123" }));
    assert!(store.get("linkedin_auth_state").unwrap().is_none());
}

#[test]
fn facebook_exchanges_long_lived_token() {
    let mock = MockBackend::start(|_, path, _| match path {
        "/api/v1/comment-automation/facebook/auth" => connected(),
        _ => (404, "{}".into()),
    });
    let dispatcher = dispatcher(&mock, store());

    let done = completion(dispatcher.handle(
        "/auth/callback#access_token=short-token&long_lived_token=long-token&state=facebook",
    ));
    assert_eq!(done.target, Target::Platform(Platform::Facebook));
    let exchange = mock
        .last("/api/v1/comment-automation/facebook/auth")
        .unwrap();
    assert_eq!(exchange.json(), json!({ "access_token": "long-token" }));
}

#[test]
fn backend_detail_becomes_failure_message() {
    let mock = MockBackend::start(|_, _, _| {
        (400, json!({ "detail": "Invalid authorization code" }).to_string())
    });
    let dispatcher = dispatcher(&mock, store());

    assert_eq!(
        dispatcher.handle("/auth/callback?code=bad&state=youtube"),
        DispatchState::Failed("Invalid authorization code".into())
    );
}

#[test]
fn stored_token_is_sent_as_bearer() {
    let mock = MockBackend::start(|_, _, _| connected());
    let store = store();
    store.set(keys::TOKEN, "session-token").unwrap();
    let dispatcher = dispatcher(&mock, store);

    completion(dispatcher.handle("/auth/callback?code=tw-code&state=twitter"));
    let exchange = mock.last("/api/v1/twitter/auth/callback").unwrap();
    assert_eq!(
        exchange.authorization.as_deref(),
        Some("Bearer session-token")
    );
    assert_eq!(
        exchange.json(),
        json!({ "code": "tw-code", "state": "twitter" })
    );
}

#[test]
fn google_credential_stores_token_and_follows_redirect_path() {
    let mock = MockBackend::start(|_, path, _| match path {
        "/api/v1/auth/google" => ok(json!({ "access_token": "app-token" })),
        _ => (404, "{}".into()),
    });
    let store = store();
    store
        .set(keys::REDIRECT_PATH, "/tools/caption-writer")
        .unwrap();
    let dispatcher = dispatcher(&mock, store.clone());

    let done = completion(dispatcher.handle("/auth/callback?credential=google-jwt"));
    assert_eq!(done.target, Target::Google);
    assert_eq!(done.redirect_to, "/tools/caption-writer");
    assert_eq!(store.get(keys::TOKEN).unwrap().as_deref(), Some("app-token"));
    assert!(store.get(keys::REDIRECT_PATH).unwrap().is_none());
    assert_eq!(
        mock.last("/api/v1/auth/google").unwrap().json(),
        json!({ "credential": "google-jwt" })
    );
}

struct CountingAuth {
    platform: Platform,
    calls: Arc<AtomicUsize>,
}

impl PlatformAuth for CountingAuth {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn auth_url(&self) -> Result<String> {
        Ok(format!("https://provider.test/{}", self.platform))
    }

    fn handle_callback(&self, _identifier: &str, _state: Option<&str>) -> Result<AuthStatus> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(AuthStatus {
            success: true,
            ..AuthStatus::default()
        })
    }

    fn check_status(&self) -> Result<AuthStatus> {
        Ok(AuthStatus::default())
    }
}

#[test]
fn each_callback_reaches_exactly_one_client() {
    let cases = [
        (Platform::Instagram, "/auth/callback?code=c&state=instagram"),
        (Platform::Youtube, "/auth/callback?code=c&state=youtube"),
        (Platform::Twitter, "/auth/callback?code=c&state=twitter"),
        (Platform::Linkedin, "/auth/callback?code=c&state=opaque-li"),
        (Platform::Facebook, "/auth/callback#access_token=fb"),
    ];

    for (expected, url) in cases {
        let store = Arc::new(Store::open_in_memory().unwrap());
        store
            .set(&Platform::Linkedin.auth_state_key(), "opaque-li")
            .unwrap();
        let mut registry = Registry::new();
        let counters: Vec<_> = Platform::ALL
            .into_iter()
            .map(|platform| {
                let calls = Arc::new(AtomicUsize::new(0));
                registry.register(Arc::new(CountingAuth {
                    platform,
                    calls: calls.clone(),
                }));
                (platform, calls)
            })
            .collect();
        let dispatcher = Dispatcher::new(
            registry,
            store.clone(),
            ExchangeGuard::default(),
            PendingStore::new(store, Duration::from_secs(60)),
        );

        let done = completion(dispatcher.handle(url));
        assert_eq!(done.target, Target::Platform(expected));
        for (platform, calls) in counters {
            let want = usize::from(platform == expected);
            assert_eq!(calls.load(Ordering::SeqCst), want, "{url} -> {platform}");
        }
    }
}
