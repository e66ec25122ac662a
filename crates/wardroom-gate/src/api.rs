//! HTTP API for Gate.
//!
//! Session endpoints run the handoff ceremony and manage the cookie. Data
//! endpoints authenticate from the cookie but take only the sovereign id
//! from it; rank is always re-derived through [`RankGuard`].

use crate::gate::{entry_gate, SIGN_IN_PATH};
use crate::guard::{GuardError, RankGuard};
use crate::handoff::{self, HandoffCeremony, SessionClaims, SessionToken, SESSION_COOKIE};
use crate::models::{now_ms, Invitation, ProfileUpdate, SovereignId, SovereignUser};
use crate::node::{AppState, GateState};
use crate::quarantine::DeletionReport;
use crate::session;
use crate::{Error, RegistryError};
use axum::{
    extract::{Extension, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode, Uri},
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use wardroom_rank::{is_dispatchable, Rank, RouteManifest};

/// Build the API router with the entry gate in front of every route.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/health", get(health))
        .route("/ready", get(ready))
        // Sign-in views (rendered by the external UI)
        .route(SIGN_IN_PATH, get(sign_in_view))
        .route("/sign-up", get(sign_in_view))
        // Session
        .route(
            "/api/session",
            get(complete_session).post(start_session).delete(end_session),
        )
        .route("/api/session/invalidate", get(invalidate_session))
        .route("/api/session/refresh", get(refresh_session))
        .route("/api/session/view-as", post(set_view_as))
        .route("/api/session/manifest", get(get_manifest))
        .route("/api/session/sign-in-link", post(sign_in_link))
        // Data
        .route("/api/data/me", get(get_me))
        .route("/api/data/me/profile", patch(update_my_profile))
        .route("/api/data/users", get(list_users))
        .route("/api/data/users/:id", delete(delete_user))
        .route("/api/data/users/:id/rank", put(set_user_rank))
        .route("/api/data/users/:id/recovery", post(issue_recovery))
        .route("/api/data/invitations", post(create_invitation))
        // App views
        .fallback(render_view)
        .layer(middleware::from_fn_with_state(state.clone(), entry_gate))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// --- Errors ---

/// Error returned by API handlers. Bodies carry only a stable code.
#[derive(Debug)]
pub enum ApiError {
    Unauthenticated,
    SessionFailed,
    Forbidden,
    UserNotFound,
    NotFound,
    BadRequest(String),
    Conflict(String),
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated | ApiError::SessionFailed => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::UserNotFound | ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated => "unauthenticated",
            ApiError::SessionFailed => "session_failed",
            ApiError::Forbidden => "forbidden",
            ApiError::UserNotFound => "sovereign_user_not_found",
            ApiError::NotFound => "not_found",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Conflict(_) => "conflict",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Internal(detail) => error!("Internal error: {}", detail),
            ApiError::Conflict(detail) => error!("Conflict: {}", detail),
            ApiError::BadRequest(detail) => warn!("Bad request: {}", detail),
            _ => {}
        }
        (self.status(), Json(json!({ "error": self.code() }))).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        match e {
            Error::NotFound(_) => ApiError::NotFound,
            Error::InvalidInput(detail) => ApiError::BadRequest(detail),
            Error::Registry(
                e @ (RegistryError::Conflict { .. } | RegistryError::SovereignTaken { .. }),
            ) => ApiError::Conflict(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<GuardError> for ApiError {
    fn from(e: GuardError) -> Self {
        match e {
            GuardError::UserNotFound(_) => ApiError::UserNotFound,
            GuardError::RankNotAssigned(_) | GuardError::InsufficientRank { .. } => {
                info!("Data access denied: {}", e);
                ApiError::Forbidden
            }
            GuardError::Storage(e) => ApiError::Internal(e.to_string()),
        }
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// The caller's verified credential.
fn authenticate(state: &GateState, headers: &HeaderMap) -> ApiResult<SessionClaims> {
    session::read(headers, &state.sessions).ok_or(ApiError::Unauthenticated)
}

fn parse_id(raw: String) -> ApiResult<SovereignId> {
    SovereignId::parse(raw).map_err(ApiError::from)
}

fn with_cookies<R: IntoResponse>(cookies: Vec<String>, body: R) -> Response {
    let mut response = body.into_response();
    for cookie in cookies {
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => error!("Unencodable cookie: {}", e),
        }
    }
    response
}

fn session_cookie(state: &GateState, token: &SessionToken) -> String {
    session::session_cookie(token, state.cookie_settings())
}

// --- Health endpoints ---

async fn health() -> &'static str {
    "OK"
}

async fn ready() -> &'static str {
    "OK"
}

async fn sign_in_view(uri: Uri) -> Json<serde_json::Value> {
    Json(json!({ "view": uri.path() }))
}

// --- Session endpoints ---

/// What a client learns about its own session.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionView {
    pub sovereign_id: SovereignId,
    pub rank: Option<Rank>,
    pub effective_rank: Rank,
    pub view_as: Option<Rank>,
    pub expires_at_ms: u64,
}

impl From<&SessionClaims> for SessionView {
    fn from(claims: &SessionClaims) -> Self {
        Self {
            sovereign_id: claims.fields().sovereign_id.clone(),
            rank: claims.fields().rank,
            effective_rank: claims.fields().effective_rank(),
            view_as: claims.fields().view_as,
            expires_at_ms: claims.expires_at_ms(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TicketQuery {
    ticket: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TicketBody {
    ticket: String,
}

fn run_ceremony(state: &GateState, ticket: &str) -> Option<handoff::Handoff> {
    let ceremony = HandoffCeremony::new(
        &state.storage,
        &state.registry,
        state.provider.as_ref(),
        &state.sessions,
    );
    match ceremony.run(ticket) {
        Ok(handoff) => Some(handoff),
        Err(e) => {
            warn!("Session handoff failed ({})", e.code());
            None
        }
    }
}

/// Provider redirect target: complete the handoff and land on the app root.
async fn complete_session(
    State(state): State<AppState>,
    Query(query): Query<TicketQuery>,
) -> Response {
    let handoff = query
        .ticket
        .as_deref()
        .and_then(|ticket| run_ceremony(&state, ticket));
    match handoff {
        Some(handoff) => with_cookies(
            vec![session_cookie(&state, &handoff.token)],
            Redirect::to("/"),
        ),
        None => Redirect::to("/sign-in?error=session_failed").into_response(),
    }
}

/// Explicit handoff trigger.
async fn start_session(
    State(state): State<AppState>,
    Json(body): Json<TicketBody>,
) -> ApiResult<Response> {
    let handoff = run_ceremony(&state, &body.ticket).ok_or(ApiError::SessionFailed)?;
    let view = SessionView::from(&handoff.claims);
    let status = if handoff.user_created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok(with_cookies(
        vec![session_cookie(&state, &handoff.token)],
        (status, Json(view)),
    ))
}

async fn end_session(State(state): State<AppState>) -> Response {
    with_cookies(
        vec![session::clear_cookie(SESSION_COOKIE, state.config.secure_cookies)],
        StatusCode::NO_CONTENT,
    )
}

/// Self-healing: drop every session cookie and start over at sign-in.
async fn invalidate_session(State(state): State<AppState>) -> Response {
    let secure = state.config.secure_cookies;
    let cookies = std::iter::once(SESSION_COOKIE)
        .chain(state.provider.session_cookie_names().iter().copied())
        .map(|name| session::clear_cookie(name, secure))
        .collect();
    with_cookies(cookies, Redirect::to("/sign-in?session=expired"))
}

fn current_user(state: &GateState, claims: &SessionClaims) -> ApiResult<SovereignUser> {
    state
        .storage
        .get_user(&claims.fields().sovereign_id)?
        .ok_or(ApiError::UserNotFound)
}

fn reissue_response(
    state: &GateState,
    claims: &SessionClaims,
    user: &SovereignUser,
    view_as: Option<Rank>,
) -> ApiResult<Response> {
    let (token, fresh) = handoff::reissue(&state.sessions, claims, user, view_as, now_ms())
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(with_cookies(
        vec![session_cookie(state, &token)],
        Json(SessionView::from(&fresh)),
    ))
}

/// Re-mint the cookie from the backing record.
async fn refresh_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let claims = authenticate(&state, &headers)?;
    let user = current_user(&state, &claims)?;
    reissue_response(&state, &claims, &user, claims.fields().view_as)
}

#[derive(Debug, Deserialize)]
struct ViewAsBody {
    rank: Option<Rank>,
}

/// Admirals only: evaluate routes as another rank.
async fn set_view_as(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ViewAsBody>,
) -> ApiResult<Response> {
    let claims = authenticate(&state, &headers)?;
    RankGuard::new(&state.storage).require_admiral_rank(&claims.fields().sovereign_id)?;
    let user = current_user(&state, &claims)?;
    info!(
        "{} now viewing as {}",
        user.id,
        body.rank.map(Rank::as_str).unwrap_or("self")
    );
    reissue_response(&state, &claims, &user, body.rank)
}

/// Route manifest for the caller's effective rank.
async fn get_manifest(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<&'static RouteManifest>> {
    let claims = authenticate(&state, &headers)?;
    Ok(Json(state.manifests.get_manifest(claims.fields().effective_rank())))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// One-time sign-in token for the caller's own external identity.
async fn sign_in_link(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<TokenResponse>> {
    let claims = authenticate(&state, &headers)?;
    current_user(&state, &claims)?;
    let token = state
        .provider
        .issue_sign_in_token(&claims.fields().external_ref)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(TokenResponse { token }))
}

// --- Data endpoints ---

async fn get_me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<SovereignUser>> {
    let claims = authenticate(&state, &headers)?;
    Ok(Json(current_user(&state, &claims)?))
}

async fn update_my_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(update): Json<ProfileUpdate>,
) -> ApiResult<Json<SovereignUser>> {
    let claims = authenticate(&state, &headers)?;
    let user = state
        .storage
        .update_profile(&claims.fields().sovereign_id, update)?
        .ok_or(ApiError::UserNotFound)?;
    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
struct RankQuery {
    rank: Rank,
}

async fn list_users(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<RankQuery>,
) -> ApiResult<Json<Vec<SovereignUser>>> {
    let claims = authenticate(&state, &headers)?;
    RankGuard::new(&state.storage)
        .require_minimum_rank(&claims.fields().sovereign_id, Rank::Commodore)?;
    Ok(Json(state.storage.list_users_by_rank(query.rank)?))
}

#[derive(Debug, Deserialize)]
struct SetRankBody {
    rank: Option<Rank>,
}

async fn set_user_rank(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<SetRankBody>,
) -> ApiResult<Json<SovereignUser>> {
    let claims = authenticate(&state, &headers)?;
    RankGuard::new(&state.storage).require_admiral_rank(&claims.fields().sovereign_id)?;
    let target = parse_id(id)?;
    let user = state
        .storage
        .set_rank(&target, body.rank)?
        .ok_or(ApiError::NotFound)?;
    info!(
        "{} set rank of {} to {}",
        claims.fields().sovereign_id,
        target,
        body.rank.map(Rank::as_str).unwrap_or("none")
    );
    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
struct InvitationBody {
    email: String,
    rank: Rank,
    #[serde(default)]
    org_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InvitationResponse {
    pub email: String,
    pub rank: Rank,
    pub org_id: Option<String>,
    pub ticket: String,
}

async fn create_invitation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<InvitationBody>,
) -> ApiResult<(StatusCode, Json<InvitationResponse>)> {
    let claims = authenticate(&state, &headers)?;
    RankGuard::new(&state.storage).require_admiral_rank(&claims.fields().sovereign_id)?;
    if !body.email.contains('@') {
        return Err(ApiError::BadRequest(format!("invalid email {:?}", body.email)));
    }

    let invited_by = Some(claims.fields().sovereign_id.clone());
    let invitation = Invitation::new(&body.email, body.rank, invited_by).with_org(body.org_id);
    state.storage.put_invitation(&invitation)?;
    let ticket = state
        .provider
        .issue_invitation(&invitation.email)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    info!(
        "{} invited {} as {}",
        claims.fields().sovereign_id, invitation.email, invitation.rank
    );
    Ok((
        StatusCode::CREATED,
        Json(InvitationResponse {
            email: invitation.email,
            rank: invitation.rank,
            org_id: invitation.org_id,
            ticket,
        }),
    ))
}

async fn issue_recovery(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<TokenResponse>> {
    let claims = authenticate(&state, &headers)?;
    RankGuard::new(&state.storage).require_admiral_rank(&claims.fields().sovereign_id)?;
    let target = parse_id(id)?;
    let token = state
        .lifecycle
        .issue_recovery_link(&target)?
        .ok_or(ApiError::NotFound)?;
    info!("{} issued a recovery link for {}", claims.fields().sovereign_id, target);
    Ok(Json(TokenResponse { token }))
}

async fn delete_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<DeletionReport>> {
    let claims = authenticate(&state, &headers)?;
    RankGuard::new(&state.storage).require_admiral_rank(&claims.fields().sovereign_id)?;
    let target = parse_id(id)?;
    if target == claims.fields().sovereign_id {
        return Err(ApiError::BadRequest("admirals cannot delete themselves".into()));
    }
    let report = state.lifecycle.delete_account(&target)?;
    if !report.user_deleted && !report.mapping_deleted {
        return Err(ApiError::NotFound);
    }
    Ok(Json(report))
}

// --- App views ---

#[derive(Debug, Serialize, Deserialize)]
pub struct ViewPlaceholder {
    pub view: String,
    pub effective_rank: Option<Rank>,
}

/// Gated page load. The UI itself is served elsewhere; this answers with
/// which view the router would render.
async fn render_view(uri: Uri, claims: Option<Extension<SessionClaims>>) -> Response {
    let path = uri.path();
    if !is_dispatchable(path) {
        return ApiError::NotFound.into_response();
    }
    Json(ViewPlaceholder {
        view: path.to_string(),
        effective_rank: claims.map(|Extension(claims)| claims.fields().effective_rank()),
    })
    .into_response()
}
