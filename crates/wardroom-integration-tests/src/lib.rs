//! Test harness: a gate node on a temporary store, driven in-process.

use axum::body::Body;
use axum::http::{header, Method, Request, Response, StatusCode};
use axum::Router;
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;
use wardroom_gate::api::build_router;
use wardroom_gate::node::AppState;
use wardroom_gate::{
    Enforcement, ExternalIdentity, GateConfig, GateState, IdentityProvider, LocalProvider,
    SovereignId, Storage,
};
use wardroom_rank::Rank;

/// A gate node with its own store and local provider.
pub struct TestGate {
    _dir: TempDir,
    pub state: AppState,
    pub provider: Arc<LocalProvider>,
    router: Router,
}

impl TestGate {
    pub fn new() -> Self {
        Self::with_enforcement(Enforcement::Hard)
    }

    pub fn with_enforcement(enforcement: Enforcement) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = GateConfig {
            data_dir: dir.path().to_path_buf(),
            admin_socket: dir.path().join("admin.sock"),
            enforcement,
            ..GateConfig::default()
        };
        let storage = Arc::new(Storage::open(dir.path()).expect("open storage"));
        let provider = Arc::new(LocalProvider::new(
            SigningKey::generate(&mut OsRng),
            Arc::clone(&storage),
        ));
        let state = Arc::new(
            GateState::from_parts(config, storage, provider.clone() as Arc<dyn IdentityProvider>)
                .expect("gate state"),
        );
        let router = build_router(Arc::clone(&state));
        Self {
            _dir: dir,
            state,
            provider,
            router,
        }
    }

    /// Provider login ticket for an external identity.
    pub fn ticket(&self, external_id: &str, email: Option<&str>) -> String {
        self.provider
            .issue_ticket(ExternalIdentity {
                external_id: external_id.to_string(),
                provider: LocalProvider::NAME.to_string(),
                email: email.map(str::to_string),
                name: Some(format!("User {external_id}")),
                avatar_url: None,
            })
            .expect("issue ticket")
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn get(&self, path: &str, cookie: Option<&str>) -> Response<Body> {
        self.send(request(Method::GET, path, cookie, None)).await
    }

    /// Complete the provider redirect and return the session cookie pair.
    pub async fn sign_in(&self, external_id: &str) -> String {
        self.sign_in_with_email(external_id, None).await
    }

    pub async fn sign_in_with_email(&self, external_id: &str, email: Option<&str>) -> String {
        let ticket = self.ticket(external_id, email);
        let response = self.get(&format!("/api/session?ticket={ticket}"), None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response).as_deref(), Some("/"));
        session_cookie(&response).expect("session cookie set")
    }

    /// Sign in and give the new user `rank` directly in the store.
    pub async fn sign_in_as(&self, external_id: &str, rank: Option<Rank>) -> (String, SovereignId) {
        let cookie = self.sign_in(external_id).await;
        let id = self.sovereign_id(external_id);
        self.state.storage.set_rank(&id, rank).expect("set rank");
        (cookie, id)
    }

    pub fn sovereign_id(&self, external_id: &str) -> SovereignId {
        self.state
            .registry
            .lookup_by_external_id(external_id)
            .expect("registry lookup")
            .expect("mapped identity")
    }
}

impl Default for TestGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a request, optionally with a cookie and a JSON body.
pub fn request(
    method: Method,
    path: &str,
    cookie: Option<&str>,
    json: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    let body = match json {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    builder.body(body).expect("valid request")
}

pub fn location<B>(response: &Response<B>) -> Option<String> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

pub fn header_value<B>(response: &Response<B>, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Every `Set-Cookie` value on a response.
pub fn set_cookies<B>(response: &Response<B>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

/// `wardroom_session=<token>` from a `Set-Cookie`, ready for a `Cookie` header.
pub fn session_cookie<B>(response: &Response<B>) -> Option<String> {
    set_cookies(response)
        .into_iter()
        .filter_map(|c| c.split(';').next().map(str::to_string))
        .find(|pair| {
            pair.strip_prefix("wardroom_session=")
                .is_some_and(|token| !token.is_empty())
        })
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}
