//! Entry gate: authorizes full page loads against the route manifests.
//!
//! Per request:
//!
//! ```text
//! receive -> public? -> pass
//!         -> credential? (no: redirect /sign-in)
//!         -> refresh if stale (user gone: redirect /api/session/invalidate)
//!         -> allowed for rank? (no: hard redirect home, soft log and pass)
//!         -> forward with rank/org/theme headers
//! ```
//!
//! The gate is a coarse filter. Data handlers re-check rank with
//! [`RankGuard`](crate::guard::RankGuard) regardless of what the gate allowed.

use crate::handoff::{self, SessionClaims, SessionToken};
use crate::models::now_ms;
use crate::node::AppState;
use crate::session::{self, CookieSettings};
use axum::extract::{Request, State};
use axum::http::{header, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};
use wardroom_rank::overview_target;

pub const EFFECTIVE_RANK_HEADER: &str = "x-wardroom-effective-rank";
pub const ACTUAL_RANK_HEADER: &str = "x-wardroom-actual-rank";
pub const ORG_ID_HEADER: &str = "x-wardroom-org-id";
pub const THEME_HEADER: &str = "x-wardroom-theme";

pub const SIGN_IN_PATH: &str = "/sign-in";
pub const INVALIDATE_PATH: &str = "/api/session/invalidate";

const PUBLIC_PATHS: &[&str] = &["/health", "/ready", SIGN_IN_PATH, "/sign-up"];

/// Route enforcement mode, fixed at deployment time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Enforcement {
    /// Log denials, let the request through
    Soft,
    /// Redirect denials to the caller's rank home
    #[default]
    Hard,
}

impl FromStr for Enforcement {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "soft" => Ok(Enforcement::Soft),
            "hard" => Ok(Enforcement::Hard),
            other => Err(format!("unknown enforcement mode {other:?} (expected soft or hard)")),
        }
    }
}

impl fmt::Display for Enforcement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Enforcement::Soft => "soft",
            Enforcement::Hard => "hard",
        })
    }
}

/// Paths the gate never inspects.
pub fn is_public_path(path: &str) -> bool {
    path == "/api" || path.starts_with("/api/") || PUBLIC_PATHS.contains(&path)
}

enum Refresh {
    Current(SessionClaims),
    Reissued(SessionClaims, SessionToken),
    UserMissing,
}

/// Re-read the backing record and re-mint the credential if it drifted.
///
/// A store failure keeps the existing credential for this request.
fn refresh(state: &AppState, claims: SessionClaims) -> Refresh {
    let id = &claims.fields().sovereign_id;
    let user = match state.storage.get_user(id) {
        Ok(Some(user)) => user,
        Ok(None) => return Refresh::UserMissing,
        Err(e) => {
            warn!("Session refresh for {} failed, using cached credential: {}", id, e);
            return Refresh::Current(claims);
        }
    };
    if !claims.fields().is_stale(&user) {
        return Refresh::Current(claims);
    }
    match handoff::reissue(&state.sessions, &claims, &user, claims.fields().view_as, now_ms()) {
        Ok((token, fresh)) => {
            debug!(
                "Re-minted session for {} ({:?} -> {:?})",
                user.id, claims.fields().rank, fresh.fields().rank
            );
            Refresh::Reissued(fresh, token)
        }
        Err(e) => {
            warn!("Could not re-mint session for {}: {}", user.id, e);
            Refresh::Current(claims)
        }
    }
}

/// Middleware guarding page routes.
pub async fn entry_gate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if is_public_path(&path) {
        return next.run(request).await;
    }

    let Some(claims) = session::read(request.headers(), &state.sessions) else {
        debug!("No session for {}, redirecting to sign-in", path);
        return Redirect::to(SIGN_IN_PATH).into_response();
    };

    let (claims, reissued) = match refresh(&state, claims) {
        Refresh::Current(claims) => (claims, None),
        Refresh::Reissued(claims, token) => (claims, Some(token)),
        Refresh::UserMissing => {
            info!("Session references a missing user, invalidating");
            return Redirect::to(INVALIDATE_PATH).into_response();
        }
    };

    let effective = claims.fields().effective_rank();
    let home = state.manifests.get_rank_home(Some(effective));

    let mut response = if path == "/" {
        Redirect::to(home).into_response()
    } else if let Some(target) = overview_target(&path) {
        Redirect::to(target).into_response()
    } else if state.manifests.is_route_allowed(effective, &path) {
        request.extensions_mut().insert(claims.clone());
        next.run(request).await
    } else {
        match state.config.enforcement {
            Enforcement::Soft => {
                warn!(
                    "Would block {} for {} (rank {}), soft enforcement",
                    path, claims.fields().sovereign_id, effective
                );
                request.extensions_mut().insert(claims.clone());
                next.run(request).await
            }
            Enforcement::Hard => {
                info!(
                    "Blocked {} for {} (rank {}), redirecting to {}",
                    path, claims.fields().sovereign_id, effective, home
                );
                Redirect::to(home).into_response()
            }
        }
    };

    stamp(&mut response, &claims, reissued.as_ref(), state.cookie_settings());
    response
}

fn stamp(
    response: &mut Response,
    claims: &SessionClaims,
    reissued: Option<&SessionToken>,
    cookies: CookieSettings,
) {
    let headers = response.headers_mut();
    let fields = claims.fields();

    headers.insert(
        EFFECTIVE_RANK_HEADER,
        HeaderValue::from_static(fields.effective_rank().as_str()),
    );
    headers.insert(
        ACTUAL_RANK_HEADER,
        HeaderValue::from_static(fields.actual_rank().as_str()),
    );
    if let Some(value) = fields.org_id.as_deref().and_then(|org| HeaderValue::from_str(org).ok()) {
        headers.insert(ORG_ID_HEADER, value);
    }
    if let Ok(value) = HeaderValue::from_str(&fields.profile.theme.hint()) {
        headers.insert(THEME_HEADER, value);
    }
    headers.append(header::VARY, HeaderValue::from_static("Cookie"));

    if let Some(token) = reissued {
        if let Ok(value) = HeaderValue::from_str(&session::session_cookie(token, cookies)) {
            headers.append(header::SET_COOKIE, value);
        }
    }
}
