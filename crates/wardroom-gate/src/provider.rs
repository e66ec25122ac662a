//! External identity provider boundary.
//!
//! The gate needs only four things from a provider: verify a login and hand
//! back a verified external identity, issue one-time sign-in tokens,
//! issue invitation tokens, and forget an identity when its account is
//! deleted. Everything else about the provider is a black box.

use crate::models::{normalize_email, now_ms};
use crate::signed::{self, OpenError};
use crate::storage::Storage;
use ed25519_dalek::{SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Errors reported by an identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("ticket is malformed")]
    Malformed,

    #[error("ticket signature is invalid")]
    BadSignature,

    #[error("ticket has expired")]
    Expired,

    #[error("ticket has already been used")]
    Replayed,

    #[error("identity {0} has been deleted")]
    Revoked(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

impl From<crate::error::Error> for ProviderError {
    fn from(e: crate::error::Error) -> Self {
        ProviderError::Unavailable(e.to_string())
    }
}

impl From<OpenError> for ProviderError {
    fn from(e: OpenError) -> Self {
        match e {
            OpenError::Malformed => ProviderError::Malformed,
            OpenError::BadSignature => ProviderError::BadSignature,
        }
    }
}

/// An identity the provider has authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIdentity {
    /// Provider-issued identifier
    pub external_id: String,

    /// Provider tag
    pub provider: String,

    /// Verified email, if the provider shares one
    pub email: Option<String>,

    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Contract the gate requires of an external identity provider.
pub trait IdentityProvider: Send + Sync {
    /// Provider tag stored on identity mappings.
    fn name(&self) -> &str;

    /// Verify a login ticket handed back after the provider's redirect.
    fn verify_login(&self, ticket: &str) -> Result<ExternalIdentity, ProviderError>;

    /// Management API: one-time sign-in token for an existing identity.
    fn issue_sign_in_token(&self, external_id: &str) -> Result<String, ProviderError>;

    /// Management API: invitation token for an email that has no identity yet.
    fn issue_invitation(&self, email: &str) -> Result<String, ProviderError>;

    /// Management API: forget an identity.
    fn delete_identity(&self, external_id: &str) -> Result<(), ProviderError>;

    /// Cookies the provider sets on our origin, cleared on session invalidation.
    fn session_cookie_names(&self) -> &[&'static str];
}

#[derive(Debug, Serialize, Deserialize)]
struct TicketClaims {
    identity: ExternalIdentity,
    nonce: String,
    expires_at_ms: u64,
}

/// Self-contained provider that signs its own one-time login tickets.
///
/// Tickets expire after [`LocalProvider::TICKET_TTL_MS`] and can be
/// redeemed once. Spent nonces and deleted identities live in the store, so
/// both survive a restart. Used for development, the admin CLI and tests.
pub struct LocalProvider {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
    storage: Arc<Storage>,
}

impl LocalProvider {
    pub const NAME: &'static str = "local";

    /// Ticket lifetime (15 minutes).
    pub const TICKET_TTL_MS: u64 = 15 * 60 * 1000;

    const COOKIES: &'static [&'static str] = &["local_provider_session"];

    pub fn new(signing_key: SigningKey, storage: Arc<Storage>) -> Self {
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
            storage,
        }
    }

    /// Stable external id for an email address.
    pub fn external_id_for_email(email: &str) -> String {
        let hash = blake3::hash(normalize_email(email).as_bytes());
        format!("{}|{}", Self::NAME, &hash.to_hex()[..24])
    }

    /// Issue a login ticket for an identity.
    pub fn issue_ticket(&self, identity: ExternalIdentity) -> Result<String, ProviderError> {
        self.issue_ticket_at(identity, now_ms())
    }

    fn issue_ticket_at(
        &self,
        identity: ExternalIdentity,
        now: u64,
    ) -> Result<String, ProviderError> {
        let nonce: [u8; 16] = rand::random();
        let claims = TicketClaims {
            identity,
            nonce: hex::encode(nonce),
            expires_at_ms: now + Self::TICKET_TTL_MS,
        };
        let payload =
            serde_json::to_vec(&claims).map_err(|e| ProviderError::Unavailable(e.to_string()))?;
        Ok(signed::seal(&self.signing_key, &payload))
    }

    /// Verify a ticket as of `now`.
    pub fn verify_login_at(
        &self,
        ticket: &str,
        now: u64,
    ) -> Result<ExternalIdentity, ProviderError> {
        let payload = signed::open(&self.verifying_key, ticket)?;
        let claims: TicketClaims =
            serde_json::from_slice(&payload).map_err(|_| ProviderError::Malformed)?;

        if now >= claims.expires_at_ms {
            return Err(ProviderError::Expired);
        }

        let pruned = self.storage.prune_nonces(now)?;
        if pruned > 0 {
            debug!("Pruned {} expired ticket nonces", pruned);
        }

        if self.storage.is_identity_revoked(&claims.identity.external_id)? {
            return Err(ProviderError::Revoked(claims.identity.external_id));
        }
        if !self.storage.spend_nonce(&claims.nonce, claims.expires_at_ms)? {
            return Err(ProviderError::Replayed);
        }
        Ok(claims.identity)
    }
}

impl IdentityProvider for LocalProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn verify_login(&self, ticket: &str) -> Result<ExternalIdentity, ProviderError> {
        self.verify_login_at(ticket, now_ms())
    }

    fn issue_sign_in_token(&self, external_id: &str) -> Result<String, ProviderError> {
        self.issue_ticket(ExternalIdentity {
            external_id: external_id.to_string(),
            provider: Self::NAME.to_string(),
            email: None,
            name: None,
            avatar_url: None,
        })
    }

    fn issue_invitation(&self, email: &str) -> Result<String, ProviderError> {
        let email = normalize_email(email);
        self.issue_ticket(ExternalIdentity {
            external_id: Self::external_id_for_email(&email),
            provider: Self::NAME.to_string(),
            email: Some(email),
            name: None,
            avatar_url: None,
        })
    }

    fn delete_identity(&self, external_id: &str) -> Result<(), ProviderError> {
        self.storage.revoke_identity(external_id)?;
        Ok(())
    }

    fn session_cookie_names(&self) -> &[&'static str] {
        Self::COOKIES
    }
}
