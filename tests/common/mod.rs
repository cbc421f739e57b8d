#![allow(dead_code)]

use std::io::Read;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use social_connect::backend::{Backend, ClientConfig};
use social_connect::storage::Store;
use tiny_http::{Header, Response, Server};

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub body: String,
    pub authorization: Option<String>,
}

impl Recorded {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("request body is json")
    }
}

type Handler = dyn Fn(&str, &str, &str) -> (u16, String) + Send + Sync;

/// Loopback stand-in for the product API. Every request is recorded and
/// answered by `handler(method, path, body)`.
pub struct MockBackend {
    server: Arc<Server>,
    pub base_url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
    thread: Option<JoinHandle<()>>,
}

impl MockBackend {
    pub fn start<F>(handler: F) -> Self
    where
        F: Fn(&str, &str, &str) -> (u16, String) + Send + Sync + 'static,
    {
        let server = Arc::new(Server::http("127.0.0.1:0").expect("bind mock backend"));
        let base_url = format!("http://{}", server.server_addr());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handler: Arc<Handler> = Arc::new(handler);

        let thread = {
            let server = server.clone();
            let requests = requests.clone();
            thread::spawn(move || {
                for mut request in server.incoming_requests() {
                    let mut body = String::new();
                    let _ = request.as_reader().read_to_string(&mut body);
                    let method = request.method().to_string();
                    let path = request
                        .url()
                        .split('?')
                        .next()
                        .unwrap_or_default()
                        .to_string();
                    let authorization = request
                        .headers()
                        .iter()
                        .find(|header| header.field.equiv("Authorization"))
                        .map(|header| header.value.as_str().to_string());
                    requests.lock().push(Recorded {
                        method: method.clone(),
                        path: path.clone(),
                        body: body.clone(),
                        authorization,
                    });

                    let (status, payload) = handler(&method, &path, &body);
                    let header =
                        Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                            .expect("static header");
                    let _ = request.respond(
                        Response::from_string(payload)
                            .with_status_code(status)
                            .with_header(header),
                    );
                }
            })
        };

        Self {
            server,
            base_url,
            requests,
            thread: Some(thread),
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().clone()
    }

    pub fn count(&self, path: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|recorded| recorded.path == path)
            .count()
    }

    pub fn last(&self, path: &str) -> Option<Recorded> {
        self.requests
            .lock()
            .iter()
            .rev()
            .find(|recorded| recorded.path == path)
            .cloned()
    }

    pub fn backend(&self, store: Arc<Store>) -> Arc<Backend> {
        Arc::new(
            Backend::new(
                store,
                ClientConfig {
                    base_url: self.base_url.clone(),
                    user_agent: "social-connect-tests".into(),
                    timeout: Some(std::time::Duration::from_secs(5)),
                    http_client: None,
                },
            )
            .expect("build backend"),
        )
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

pub fn ok(body: serde_json::Value) -> (u16, String) {
    (200, body.to_string())
}

pub fn store() -> Arc<Store> {
    Arc::new(Store::open_in_memory().expect("open in-memory store"))
}
