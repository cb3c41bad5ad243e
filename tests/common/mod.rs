#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Method, Request},
    response::Response,
    Router,
};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tower::ServiceExt;

use staffgate::auth::{CredentialVerifier, Identity};
use staffgate::config::AppConfig;
use staffgate::database::{Database, MemoryDatabase};
use staffgate::lifecycle::{
    Completion, Coordinator, Lifecycle, LifecycleState, ShutdownBudget, ShutdownNotice,
};
use staffgate::{build_router, AppState};

pub const JWT_SECRET: &str = "integration-jwt-secret";
pub const SUPREME_SECRET: &str = "integration-throne-key";

/// Default peer address for in-process requests
pub fn client_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 40000))
}

pub fn test_config(overrides: &[(&str, &str)]) -> AppConfig {
    let env: Vec<(String, String)> = [
        ("JWT_SECRET", JWT_SECRET),
        ("SUPREME_LEADER_SECRET_KEY", SUPREME_SECRET),
        ("STORAGE_BACKEND", "memory"),
        ("SECURITY_BCRYPT_COST", "4"),
    ]
    .iter()
    .chain(overrides.iter())
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    AppConfig::from_lookup(move |key| {
        // Later entries win, so overrides replace the defaults above
        env.iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    })
    .expect("test config should be valid")
}

pub fn identity(id: i64) -> Identity {
    Identity {
        id,
        email: format!("user{}@example.com", id),
        username: format!("user{}", id),
    }
}

/// Router over the in-memory backend, driven with `oneshot`
pub struct TestApp {
    pub router: Router,
    pub db: Arc<MemoryDatabase>,
    pub verifier: Arc<CredentialVerifier>,
    pub lifecycle: Lifecycle,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config(&[]))
    }

    pub fn with_config(config: AppConfig) -> Self {
        let db = Arc::new(MemoryDatabase::new());
        let lifecycle = Lifecycle::new();
        lifecycle
            .advance(LifecycleState::Starting)
            .expect("init -> starting");
        lifecycle
            .advance(LifecycleState::Serving)
            .expect("starting -> serving");

        let state = AppState::new(config, &Database::from_shared(db.clone()), lifecycle.clone());
        let verifier = state.verifier.clone();
        Self {
            router: build_router(state),
            db,
            verifier,
            lifecycle,
        }
    }

    pub fn token_for(&self, id: i64) -> String {
        self.verifier
            .issue(&identity(id))
            .expect("token should sign")
    }

    /// Send from the default client address
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.send_from(client_addr(), request).await
    }

    pub async fn send_from(&self, addr: SocketAddr, mut request: Request<Body>) -> Response {
        request.extensions_mut().insert(ConnectInfo(addr));
        self.send_raw(request).await
    }

    /// Send without a peer address
    pub async fn send_raw(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    request(Method::GET, uri, token, Body::empty())
}

pub fn post_json(uri: &str, token: Option<&str>, body: &str) -> Request<Body> {
    let mut req = request(Method::POST, uri, token, Body::from(body.to_string()));
    req.headers_mut()
        .insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
    req
}

fn request(method: Method, uri: &str, token: Option<&str>, body: Body) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::COOKIE, format!("jwt={}", token));
    }
    builder.body(body).expect("valid request")
}

/// Token carried by a `Set-Cookie: jwt=...` response header
pub fn issued_credential(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|cookie| cookie.strip_prefix("jwt="))
        .and_then(|rest| rest.split(';').next())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

pub async fn json_body(response: Response) -> Result<Value> {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .context("failed to read body")?;
    serde_json::from_slice(&bytes).context("body is not json")
}

/// A coordinator serving `router` on a real local port
pub struct RunningServer {
    pub base_url: String,
    pub notices: mpsc::Sender<ShutdownNotice>,
    pub done: oneshot::Receiver<Completion>,
    pub lifecycle: Lifecycle,
}

pub async fn launch(
    router: Router,
    db: Arc<MemoryDatabase>,
    budget: ShutdownBudget,
) -> Result<RunningServer> {
    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    let listener = TcpListener::bind(("127.0.0.1", port))
        .await
        .context("failed to bind test listener")?;

    let lifecycle = Lifecycle::new();
    lifecycle.advance(LifecycleState::Starting)?;

    let (notices, notice_rx) = mpsc::channel(4);
    let done = Coordinator::new(lifecycle.clone(), budget).launch(listener, router, db, notice_rx)?;

    Ok(RunningServer {
        base_url: format!("http://127.0.0.1:{}", port),
        notices,
        done,
        lifecycle,
    })
}

pub fn budget(drain: Duration, close: Duration) -> ShutdownBudget {
    ShutdownBudget {
        drain_timeout: drain,
        close_timeout: close,
    }
}
