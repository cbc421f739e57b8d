use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use once_cell::sync::Lazy;
use serde_json::Value;
use tiny_http::{Header, Method, Response, Server};
use tracing::{info, warn};
use url::Url;

use crate::auth::{GoogleSignIn, PlatformAuth, Registry};
use crate::automation::{AutomationMode, AutomationRequest, AutomationService};
use crate::backend::{self, Backend};
use crate::config::{self, Config};
use crate::dispatch::{DispatchState, Dispatcher};
use crate::guard::ExchangeGuard;
use crate::pending::{PendingModalState, PendingStore};
use crate::platform::Platform;
use crate::seo::{SeoRequest, SeoService};
use crate::storage::{self, keys, Store};
use crate::tools::{self, Category};

pub const HELP: &str = "social-connect - Connect social accounts and drive comment automation.

Usage: social-connect [--config PATH] <command> [args]

Commands:
  connect <platform> [--set key=value]...   Authorize a platform and wait for its callback
  callback <url>                            Handle a provider redirect URL
  serve                                     Listen on the callback route until stopped
  status [platform]                         Show connection status
  tools [category]                          List dashboard tools
  automate <platform> --tone T --style S [--post-url U] [--mode manual|auto]
  automation-status <id>                    Poll a YouTube auto-mode job
  seo <platform> <content> [--keyword K]... Optimize post copy for discoverability
  login-token <token>                       Store the bearer token used for API calls
  logout                                    Forget the stored bearer token

Flags:
  --version, -V        Show version and exit
  --help,    -h        Show this help message";

/// Served for bare hits on the callback route: fragments never reach the
/// server, so the page re-submits `location.hash` as a query parameter.
static FRAGMENT_BOUNCE: Lazy<String> = Lazy::new(|| {
    r#"<!DOCTYPE html>
<html lang="en">
  <head><meta charset="utf-8" /><title>Connecting...</title></head>
  <body>
    <p>Completing sign-in...</p>
    <script>
      var hash = window.location.hash.replace(/^#/, "");
      var next = window.location.pathname + (hash ? "?fragment=" + encodeURIComponent(hash) : "?callback=empty");
      window.location.replace(next);
    </script>
  </body>
</html>"#
        .to_string()
});

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Version,
    Connect {
        platform: Platform,
        settings: BTreeMap<String, Value>,
    },
    Callback {
        url: String,
    },
    Serve,
    Status {
        platform: Option<Platform>,
    },
    Tools {
        category: Option<Category>,
    },
    Automate {
        request: AutomationRequest,
        mode: Option<AutomationMode>,
    },
    AutomationStatus {
        id: String,
    },
    Seo {
        request: SeoRequest,
    },
    LoginToken {
        token: String,
    },
    Logout,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub config_file: Option<PathBuf>,
    pub command: Command,
}

pub fn parse_args<I>(args: I) -> Result<Invocation>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let mut config_file = None;
    let mut positional = Vec::new();
    let mut flags: Vec<(String, String)> = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => {
                return Ok(Invocation {
                    config_file,
                    command: Command::Help,
                })
            }
            "--version" | "-V" => {
                return Ok(Invocation {
                    config_file,
                    command: Command::Version,
                })
            }
            "--config" => {
                let path = args.next().context("--config requires a path")?;
                config_file = Some(PathBuf::from(path));
            }
            flag if flag.starts_with("--") => {
                let value = args
                    .next()
                    .with_context(|| format!("{flag} requires a value"))?;
                flags.push((flag.trim_start_matches("--").to_string(), value));
            }
            _ => positional.push(arg),
        }
    }

    let flag = |name: &str| {
        flags
            .iter()
            .rev()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
    };
    let platform_arg = |idx: usize| -> Result<Platform> {
        let raw = positional.get(idx).context("a platform is required")?;
        raw.parse::<Platform>().map_err(|err| anyhow!(err))
    };

    let command = match positional.first().map(String::as_str) {
        None => Command::Help,
        Some("connect") => {
            let mut settings = BTreeMap::new();
            for (_, value) in flags.iter().filter(|(key, _)| key == "set") {
                let (k, v) = value
                    .split_once('=')
                    .with_context(|| format!("--set expects key=value, got {value:?}"))?;
                settings.insert(k.trim().to_string(), Value::from(v.trim()));
            }
            Command::Connect {
                platform: platform_arg(1)?,
                settings,
            }
        }
        Some("callback") => Command::Callback {
            url: positional
                .get(1)
                .cloned()
                .context("callback requires a url")?,
        },
        Some("serve") => Command::Serve,
        Some("status") => Command::Status {
            platform: if positional.len() > 1 {
                Some(platform_arg(1)?)
            } else {
                None
            },
        },
        Some("tools") => Command::Tools {
            category: match positional.get(1) {
                Some(raw) => Some(raw.parse::<Category>().map_err(|err| anyhow!(err))?),
                None => None,
            },
        },
        Some("automate") => {
            let mode = match flag("mode") {
                Some(raw) => Some(match raw.as_str() {
                    "auto" => AutomationMode::Auto,
                    "manual" => AutomationMode::Manual,
                    other => bail!("unknown automation mode: {other}"),
                }),
                None => None,
            };
            Command::Automate {
                request: AutomationRequest {
                    platform: platform_arg(1)?,
                    tone: flag("tone").context("automate requires --tone")?,
                    style: flag("style").context("automate requires --style")?,
                    post_url: flag("post-url"),
                },
                mode,
            }
        }
        Some("automation-status") => Command::AutomationStatus {
            id: positional
                .get(1)
                .cloned()
                .context("automation-status requires an id")?,
        },
        Some("seo") => Command::Seo {
            request: SeoRequest {
                platform: platform_arg(1)?,
                content: positional
                    .get(2..)
                    .map(|words| words.join(" "))
                    .filter(|content| !content.trim().is_empty())
                    .context("seo requires content to optimize")?,
                keywords: flags
                    .iter()
                    .filter(|(key, _)| key == "keyword")
                    .map(|(_, value)| value.clone())
                    .collect(),
            },
        },
        Some("login-token") => Command::LoginToken {
            token: positional
                .get(1)
                .cloned()
                .context("login-token requires a token")?,
        },
        Some("logout") => Command::Logout,
        Some(other) => bail!("unknown command: {other}"),
    };

    Ok(Invocation {
        config_file,
        command,
    })
}

/// Everything a command needs, wired from one [`Config`].
pub struct Services {
    pub config: Config,
    pub store: Arc<Store>,
    pub backend: Arc<Backend>,
    pub dispatcher: Dispatcher,
    pub pending: PendingStore,
    pub automation: AutomationService,
    pub seo: SeoService,
}

impl Services {
    pub fn build(config: Config) -> Result<Self> {
        let store = Arc::new(
            Store::open(storage::Options {
                path: config.storage.path.clone(),
            })
            .context("open storage")?,
        );
        Self::with_store(config, store)
    }

    pub fn with_store(config: Config, store: Arc<Store>) -> Result<Self> {
        let backend = Arc::new(
            Backend::new(
                store.clone(),
                backend::ClientConfig {
                    base_url: config.backend.base_url.clone(),
                    user_agent: config.backend.user_agent.clone(),
                    timeout: Some(config.backend.timeout),
                    http_client: None,
                },
            )
            .context("build backend client")?,
        );
        let registry = Registry::standard(backend.clone(), &config);
        let dispatcher = Dispatcher::new(
            registry,
            store.clone(),
            ExchangeGuard::new(config.auth.min_exchange_interval),
            PendingStore::new(store.clone(), config.auth.pending_ttl),
        )
        .with_google(GoogleSignIn::new(backend.clone()))
        .with_dashboard_path(config.app.dashboard_path.clone());

        Ok(Self {
            pending: PendingStore::new(store.clone(), config.auth.pending_ttl),
            automation: AutomationService::new(backend.clone()),
            seo: SeoService::new(backend.clone()),
            config,
            store,
            backend,
            dispatcher,
        })
    }
}

pub fn run(invocation: Invocation) -> Result<()> {
    match invocation.command {
        Command::Help => {
            println!("{HELP}");
            return Ok(());
        }
        Command::Version => {
            println!("social-connect {}", crate::VERSION);
            return Ok(());
        }
        Command::Tools { category } => {
            print_tools(category);
            return Ok(());
        }
        _ => {}
    }

    let cfg = config::load(config::LoadOptions {
        config_file: invocation.config_file,
        env_prefix: None,
    })
    .context("load config")?;
    let services = Services::build(cfg)?;

    match invocation.command {
        Command::Connect { platform, settings } => connect(&services, platform, settings),
        Command::Callback { url } => report(services.dispatcher.handle(&url)),
        Command::Serve => {
            let listener = CallbackListener::bind(&services.config.app.redirect_uri)?;
            println!("Listening for callbacks on {}", listener.redirect_uri());
            listener.serve(&services.dispatcher, false).map(|_| ())
        }
        Command::Status { platform } => status(&services, platform),
        Command::Automate { request, mode } => automate(&services, request, mode),
        Command::AutomationStatus { id } => {
            let status = services.automation.status(&id)?;
            println!(
                "{}: {} (processed {}, replied {}, failed {})",
                id,
                status.status,
                status.stats.comments_processed,
                status.stats.successful_responses,
                status.stats.failed_responses
            );
            Ok(())
        }
        Command::Seo { request } => {
            let resp = services.seo.optimize(&request)?;
            println!("{}", resp.optimized_content);
            if !resp.hashtags.is_empty() {
                println!("\n{}", resp.hashtags.join(" "));
            }
            for suggestion in &resp.suggestions {
                println!("  - {suggestion}");
            }
            if let Some(score) = resp.score {
                println!("Score: {score:.0}");
            }
            Ok(())
        }
        Command::LoginToken { token } => {
            services.store.set(keys::TOKEN, token.trim())?;
            println!("Token stored.");
            Ok(())
        }
        Command::Logout => {
            services.store.remove(keys::TOKEN)?;
            println!("Signed out.");
            Ok(())
        }
        Command::Help | Command::Version | Command::Tools { .. } => Ok(()),
    }
}

fn connect(
    services: &Services,
    platform: Platform,
    settings: BTreeMap<String, Value>,
) -> Result<()> {
    let (listener, url) = prepare_connect(services, platform, settings)?;
    println!(
        "Open this URL to connect {}:\n\n  {}\n",
        platform.display_name(),
        url
    );
    if let Err(err) = webbrowser::open(&url) {
        warn!(error = %err, "could not open browser");
    }

    let state = listener.serve(&services.dispatcher, true)?;
    report(state)
}

/// Binds the listener, builds the authorize URL against the address actually
/// bound, then records the pending settings.
fn prepare_connect(
    services: &Services,
    platform: Platform,
    settings: BTreeMap<String, Value>,
) -> Result<(CallbackListener, String)> {
    let listener = CallbackListener::bind(&services.config.app.redirect_uri)?;

    let mut cfg = services.config.clone();
    cfg.app.redirect_uri = listener.redirect_uri().to_string();
    let client = Registry::standard(services.backend.clone(), &cfg)
        .get(platform)
        .with_context(|| format!("no client registered for {platform}"))?;
    let url = client.auth_url()?;

    if !settings.is_empty() {
        services
            .pending
            .save(platform, &PendingModalState::new(settings))?;
    }
    Ok((listener, url))
}

fn report(state: DispatchState) -> Result<()> {
    match state {
        DispatchState::Succeeded(done) => {
            println!("{}", done.message);
            if let Some(restored) = done.restored {
                for (key, value) in &restored.settings {
                    println!("  restored {key} = {}", display_value(value));
                }
            }
            println!("Continue at {}", done.redirect_to);
            Ok(())
        }
        DispatchState::Failed(message) => bail!(message),
        DispatchState::Idle | DispatchState::Processing(_) => {
            bail!("authentication did not complete")
        }
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn status(services: &Services, platform: Option<Platform>) -> Result<()> {
    let platforms = match platform {
        Some(platform) => vec![platform],
        None => Platform::ALL.to_vec(),
    };
    for platform in platforms {
        let Some(client) = services.dispatcher.client(platform) else {
            continue;
        };
        match client.check_status() {
            Ok(status) if status.auth_status => {
                println!("{:<10} connected", platform.display_name())
            }
            Ok(_) => println!("{:<10} not connected", platform.display_name()),
            Err(err) => println!("{:<10} unknown ({err})", platform.display_name()),
        }
    }
    Ok(())
}

fn automate(
    services: &Services,
    request: AutomationRequest,
    mode: Option<AutomationMode>,
) -> Result<()> {
    let resp = match (request.platform, mode) {
        (Platform::Youtube, Some(mode)) => services.automation.start_youtube(&request, mode)?,
        (_, Some(AutomationMode::Auto)) => {
            bail!("auto mode is only available for YouTube")
        }
        _ => services.automation.start(&request)?,
    };
    if let Some(id) = resp.automation_id.as_deref() {
        println!("Automation started: {id}");
        println!("Check progress with: social-connect automation-status {id}");
    }
    println!(
        "Processed {} comments: {} replied, {} failed",
        resp.stats.comments_processed, resp.stats.successful_responses, resp.stats.failed_responses
    );
    Ok(())
}

fn print_tools(category: Option<Category>) {
    let listed = match category {
        Some(category) => tools::by_category(category),
        None => tools::all().iter().collect(),
    };
    for tool in listed {
        let platforms = tool
            .platforms
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let badge = if tool.coming_soon { " (coming soon)" } else { "" };
        println!(
            "{:<32} {:<11} {:<40} {}{}",
            tool.name, tool.category, platforms, tool.url, badge
        );
    }
}

/// Loopback listener bound to the configured callback route.
pub struct CallbackListener {
    server: Server,
    path: String,
    redirect_uri: String,
}

impl CallbackListener {
    pub fn bind(redirect_uri: &str) -> Result<Self> {
        let mut redirect = Url::parse(redirect_uri).context("callback: parse redirect uri")?;
        let host = redirect.host_str().unwrap_or("127.0.0.1").to_string();
        let port = redirect.port_or_known_default().unwrap_or(0);
        let path = if redirect.path().is_empty() {
            "/".to_string()
        } else {
            redirect.path().to_string()
        };

        let server = Server::http(format!("{host}:{port}"))
            .map_err(|err| anyhow!("callback: listen on {host}:{port}: {err}"))?;
        let bound = server
            .server_addr()
            .to_ip()
            .context("callback: listener has no ip address")?;
        redirect
            .set_port(Some(bound.port()))
            .map_err(|_| anyhow!("callback: cannot set port on {redirect_uri}"))?;
        let redirect_uri = redirect.to_string();
        info!(%redirect_uri, "callback listener ready");
        Ok(Self {
            server,
            path,
            redirect_uri,
        })
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Dispatches callbacks until one finishes when `once` is set, otherwise
    /// until the server stops. Stray or malformed requests are answered and
    /// skipped.
    pub fn serve(&self, dispatcher: &Dispatcher, once: bool) -> Result<DispatchState> {
        for request in self.server.incoming_requests() {
            if request.method() != &Method::Get {
                let _ = request.respond(Response::from_string("method not allowed").with_status_code(405));
                continue;
            }
            let url = match Url::parse(&format!("http://callback.local{}", request.url())) {
                Ok(url) => url,
                Err(err) => {
                    warn!(request_url = %request.url(), error = %err, "rejecting malformed callback request");
                    let _ = request.respond(Response::from_string("bad request").with_status_code(400));
                    continue;
                }
            };
            if url.path() != self.path {
                let _ = request.respond(Response::from_string("not found").with_status_code(404));
                continue;
            }
            if url.query().is_none() {
                let _ = request.respond(html(FRAGMENT_BOUNCE.clone(), 200));
                continue;
            }

            let fragment = url
                .query_pairs()
                .find(|(key, _)| key == "fragment")
                .map(|(_, value)| value.into_owned());
            let target = match fragment {
                Some(fragment) => format!("{}#{}", self.path, fragment),
                None => request.url().to_string(),
            };

            let state = dispatcher.handle(&target);
            let page = match &state {
                DispatchState::Succeeded(done) => render_page("Connected", &done.message, 200),
                DispatchState::Failed(message) => {
                    render_page("Authentication failed", message, 400)
                }
                _ => render_page("Working", "Authentication is still in progress.", 202),
            };
            let _ = request.respond(page);
            if once && state.is_terminal() {
                return Ok(state);
            }
        }
        Ok(dispatcher.state())
    }
}

fn html(body: String, status: u16) -> Response<std::io::Cursor<Vec<u8>>> {
    let response = Response::from_string(body).with_status_code(status);
    match Header::from_bytes(&b"Content-Type"[..], &b"text/html; charset=utf-8"[..]) {
        Ok(header) => response.with_header(header),
        Err(_) => response,
    }
}

fn render_page(title: &str, message: &str, status: u16) -> Response<std::io::Cursor<Vec<u8>>> {
    let body = format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head><meta charset="utf-8" /><title>{title}</title></head>
  <body>
    <main>
      <h1>{title}</h1>
      <p>{message}</p>
      <p>You can close this tab and return to the terminal.</p>
    </main>
  </body>
</html>"#,
        title = escape_html(title),
        message = escape_html(message),
    );
    html(body, status)
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
