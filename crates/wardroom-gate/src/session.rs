//! Session credential transport: reading and writing the session cookie.

use crate::handoff::{SessionClaims, SessionKeys, SessionToken, SESSION_COOKIE};
use axum::http::{header, HeaderMap};
use tracing::debug;

/// Attributes applied to the session cookie.
#[derive(Debug, Clone, Copy)]
pub struct CookieSettings {
    pub secure: bool,
    pub max_age_secs: u64,
}

/// Find a cookie value in the request's `Cookie` headers.
pub fn read_cookie<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

/// Raw session token, if the caller sent one.
pub fn read_token(headers: &HeaderMap) -> Option<&str> {
    read_cookie(headers, SESSION_COOKIE).filter(|token| !token.is_empty())
}

/// The caller's verified credential, or `None`.
///
/// An invalid or expired token reads as no credential.
pub fn read(headers: &HeaderMap, keys: &SessionKeys) -> Option<SessionClaims> {
    let token = read_token(headers)?;
    match keys.verify(token) {
        Ok(claims) => Some(claims),
        Err(e) => {
            debug!("Ignoring session cookie: {}", e);
            None
        }
    }
}

/// `Set-Cookie` value that stores `token`.
pub fn session_cookie(token: &SessionToken, settings: CookieSettings) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}={}; Path=/; SameSite=Lax; Max-Age={}",
        token.as_str(),
        settings.max_age_secs
    );
    if settings.secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that removes the cookie `name`.
pub fn clear_cookie(name: &str, secure: bool) -> String {
    let mut cookie = format!("{name}=; Path=/; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}
