use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header, request, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::auth::CredentialVerifier;
use crate::config::{AppConfig, SecurityConfig};
use crate::database::{Database, PrivilegeStore, UserStore};
use crate::gate::{self, AdministratorGate, GateChain, SupremeSecretGate};
use crate::handlers::{elevated, protected, public};
use crate::lifecycle::Lifecycle;
use crate::middleware::{admit_request, authenticate, AdmissionFilter};
use crate::observability::request_trace_layer;

/// Everything a handler or middleware stage may need, built once at startup
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub verifier: Arc<CredentialVerifier>,
    pub privileges: Arc<dyn PrivilegeStore>,
    pub users: Arc<dyn UserStore>,
    pub lifecycle: Lifecycle,
    /// `None` when rate limiting is disabled
    pub admission: Option<Arc<AdmissionFilter>>,
}

impl AppState {
    /// Handlers get the request-facing halves of `database`; the teardown
    /// half stays with the lifecycle coordinator
    pub fn new(config: AppConfig, database: &Database, lifecycle: Lifecycle) -> Self {
        let verifier = CredentialVerifier::new(
            &config.security.jwt_secret,
            config.security.credential_ttl(),
        );
        let admission = config
            .api
            .enable_rate_limiting
            .then(|| Arc::new(AdmissionFilter::from_config(&config.api)));

        Self {
            config: Arc::new(config),
            verifier: Arc::new(verifier),
            privileges: database.privileges.clone(),
            users: database.users.clone(),
            lifecycle,
            admission,
        }
    }
}

/// Full router: request logger → CORS → rate admission → credential →
/// gate chain → handler
pub fn build_router(state: AppState) -> Router {
    let mut v1 = Router::new()
        .route("/health", get(public::health))
        .route("/register", post(public::register))
        .route("/login", post(public::login))
        .merge(protected_routes(&state))
        .merge(admin_routes(&state))
        .merge(supreme_routes(&state));

    if let Some(filter) = state.admission.clone() {
        v1 = v1.layer(from_fn_with_state(filter, admit_request));
    }

    Router::new()
        .nest("/v1", v1)
        .layer(cors_layer(&state.config.security))
        .layer(request_trace_layer())
        .with_state(state)
}

fn protected_routes(state: &AppState) -> Router<AppState> {
    let routes = Router::new()
        .route("/status", get(protected::status))
        .route("/logout", get(protected::logout));
    protect(routes, state, GateChain::authenticated())
}

fn admin_routes(state: &AppState) -> Router<AppState> {
    let routes = Router::new().route("/admin/overview", get(elevated::overview));
    let chain = GateChain::authenticated().then(AdministratorGate::new(state.privileges.clone()));
    protect(routes, state, chain)
}

fn supreme_routes(state: &AppState) -> Router<AppState> {
    let routes = Router::new().route("/supreme-leader/make-break", post(elevated::make_break));
    let chain = GateChain::authenticated()
        .then(SupremeSecretGate::new(
            &state.config.security.supreme_leader_secret,
        ))
        .with_body_limit(state.config.server.max_body_bytes);
    protect(routes, state, chain)
}

/// Credential verification, then the gate chain. `route_layer` wraps
/// outside-in, so the last layer added runs first.
fn protect(routes: Router<AppState>, state: &AppState, chain: GateChain) -> Router<AppState> {
    tracing::debug!(gates = ?chain.names(), "guarding routes");
    routes
        .route_layer(from_fn_with_state(chain, gate::enforce))
        .route_layer(from_fn_with_state(state.verifier.clone(), authenticate))
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    let origins = if security.cors_origins.is_empty() {
        AllowOrigin::predicate(|origin: &HeaderValue, _parts: &request::Parts| {
            let origin = origin.as_bytes();
            origin.starts_with(b"https://") || origin.starts_with(b"http://")
        })
    } else {
        AllowOrigin::list(
            security
                .cors_origins
                .iter()
                .filter_map(|o| HeaderValue::from_str(o).ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .expose_headers([header::LINK])
        .max_age(Duration::from_secs(300))
}
