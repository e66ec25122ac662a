//! Identity handoff ceremony.
//!
//! The one procedure that turns a verified external login into an
//! application session:
//!
//! ```text
//! start -> verify-external-identity -> resolve-or-create-sovereign-user
//!       -> ensure-identity-mapping -> mint-session -> done
//! ```
//!
//! Any step may fail, which ends the ceremony in `failed` with no session.
//! [`SessionKeys`] can only mint from inside this module, so the rest of the
//! crate can verify credentials but never create one from a bare identity.

mod credential;

pub use credential::{
    SessionClaims, SessionError, SessionFields, SessionKeys, SessionToken, SESSION_COOKIE,
};

use crate::identity::{IdentityRegistry, RegistryError};
use crate::models::{now_ms, Profile, SovereignId, SovereignUser};
use crate::provider::{ExternalIdentity, IdentityProvider, ProviderError};
use crate::storage::Storage;
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use wardroom_rank::Rank;

/// Ceremony states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum HandoffStage {
    Start,
    VerifyExternalIdentity,
    ResolveOrCreateSovereignUser,
    EnsureIdentityMapping,
    MintSession,
    Done,
    Failed,
}

impl fmt::Display for HandoffStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HandoffStage::Start => "start",
            HandoffStage::VerifyExternalIdentity => "verify-external-identity",
            HandoffStage::ResolveOrCreateSovereignUser => "resolve-or-create-sovereign-user",
            HandoffStage::EnsureIdentityMapping => "ensure-identity-mapping",
            HandoffStage::MintSession => "mint-session",
            HandoffStage::Done => "done",
            HandoffStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Why a ceremony failed.
///
/// The detail is for server logs. Clients only ever see a generic
/// "session failed".
#[derive(Debug, Error)]
pub enum HandoffError {
    #[error("identity-unverified: {0}")]
    IdentityUnverified(#[source] ProviderError),

    #[error("user-resolution-failed: {0}")]
    UserResolutionFailed(String),

    #[error("mapping-write-failed: {0}")]
    MappingWriteFailed(#[source] RegistryError),

    #[error("session-mint-failed: {0}")]
    SessionMintFailed(#[source] SessionError),
}

impl HandoffError {
    /// Tag used in logs and error redirects.
    pub fn code(&self) -> &'static str {
        match self {
            HandoffError::IdentityUnverified(_) => "identity-unverified",
            HandoffError::UserResolutionFailed(_) => "user-resolution-failed",
            HandoffError::MappingWriteFailed(_) => "mapping-write-failed",
            HandoffError::SessionMintFailed(_) => "session-mint-failed",
        }
    }

    /// Stage the ceremony was in when it failed.
    pub fn stage(&self) -> HandoffStage {
        match self {
            HandoffError::IdentityUnverified(_) => HandoffStage::VerifyExternalIdentity,
            HandoffError::UserResolutionFailed(_) => HandoffStage::ResolveOrCreateSovereignUser,
            HandoffError::MappingWriteFailed(_) => HandoffStage::EnsureIdentityMapping,
            HandoffError::SessionMintFailed(_) => HandoffStage::MintSession,
        }
    }
}

/// A completed ceremony.
#[derive(Debug, Clone)]
pub struct Handoff {
    pub token: SessionToken,
    pub claims: SessionClaims,
    pub user: SovereignUser,

    /// True when this login created the sovereign user
    pub user_created: bool,

    /// Stages passed through, in order
    pub trail: Vec<HandoffStage>,
}

/// Runs the handoff for one login.
pub struct HandoffCeremony<'a> {
    storage: &'a Storage,
    registry: &'a IdentityRegistry,
    provider: &'a dyn IdentityProvider,
    keys: &'a SessionKeys,
    new_id: fn() -> SovereignId,
}

struct Resolved {
    user: SovereignUser,
    created: bool,
    consumed_invite: Option<crate::models::Invitation>,
}

impl<'a> HandoffCeremony<'a> {
    pub fn new(
        storage: &'a Storage,
        registry: &'a IdentityRegistry,
        provider: &'a dyn IdentityProvider,
        keys: &'a SessionKeys,
    ) -> Self {
        Self {
            storage,
            registry,
            provider,
            keys,
            new_id: SovereignId::generate,
        }
    }

    #[cfg(test)]
    fn with_id_source(mut self, new_id: fn() -> SovereignId) -> Self {
        self.new_id = new_id;
        self
    }

    /// Run the ceremony for a provider login ticket.
    pub fn run(&self, ticket: &str) -> Result<Handoff, HandoffError> {
        self.run_at(ticket, now_ms())
    }

    /// Run the ceremony with an explicit mint time.
    pub fn run_at(&self, ticket: &str, now: u64) -> Result<Handoff, HandoffError> {
        let mut trail = vec![HandoffStage::Start];
        match self.advance(ticket, now, &mut trail) {
            Ok(handoff) => Ok(handoff),
            Err(e) => {
                trail.push(HandoffStage::Failed);
                error!("Handoff failed at {}: {}", e.stage(), e);
                debug!("Handoff trail: {:?}", trail);
                Err(e)
            }
        }
    }

    fn advance(
        &self,
        ticket: &str,
        now: u64,
        trail: &mut Vec<HandoffStage>,
    ) -> Result<Handoff, HandoffError> {
        trail.push(HandoffStage::VerifyExternalIdentity);
        let identity = self
            .provider
            .verify_login(ticket)
            .map_err(HandoffError::IdentityUnverified)?;

        trail.push(HandoffStage::ResolveOrCreateSovereignUser);
        let resolved = self.resolve_or_create(&identity)?;

        trail.push(HandoffStage::EnsureIdentityMapping);
        if let Err(e) = self.registry.register(
            &identity.external_id,
            &resolved.user.id,
            self.provider.name(),
        ) {
            if resolved.created {
                self.roll_back(&resolved);
            }
            return Err(HandoffError::MappingWriteFailed(e));
        }

        trail.push(HandoffStage::MintSession);
        let fields = SessionFields::from_user(&resolved.user, identity.external_id.clone(), None);
        let (token, claims) = self
            .keys
            .mint(fields, now)
            .map_err(HandoffError::SessionMintFailed)?;

        trail.push(HandoffStage::Done);
        info!(
            "Session minted for {} (rank: {}, new: {})",
            resolved.user.id,
            claims.fields().actual_rank(),
            resolved.created
        );

        Ok(Handoff {
            token,
            claims,
            user: resolved.user,
            user_created: resolved.created,
            trail: trail.clone(),
        })
    }

    fn resolve_or_create(&self, identity: &ExternalIdentity) -> Result<Resolved, HandoffError> {
        let existing = self
            .registry
            .lookup_by_external_id(&identity.external_id)
            .map_err(|e| HandoffError::UserResolutionFailed(e.to_string()))?;

        if let Some(sovereign_id) = existing {
            let user = self
                .storage
                .get_user(&sovereign_id)
                .map_err(|e| HandoffError::UserResolutionFailed(e.to_string()))?;
            if let Some(user) = user {
                return Ok(Resolved { user, created: false, consumed_invite: None });
            }
            warn!(
                "Identity {} maps to missing user {}, recreating it",
                identity.external_id, sovereign_id
            );
            return self.create_user(sovereign_id, identity);
        }

        self.create_user((self.new_id)(), identity)
    }

    fn create_user(
        &self,
        id: SovereignId,
        identity: &ExternalIdentity,
    ) -> Result<Resolved, HandoffError> {
        let invitation = match identity.email.as_deref() {
            Some(email) => self
                .storage
                .take_invitation(email)
                .map_err(|e| HandoffError::UserResolutionFailed(e.to_string()))?,
            None => None,
        };
        let rank = invitation.as_ref().map(|i| i.rank).unwrap_or(Rank::LOWEST);
        let org_id = invitation.as_ref().and_then(|i| i.org_id.clone());

        let profile = Profile {
            name: identity.name.clone(),
            email: identity.email.clone(),
            avatar_url: identity.avatar_url.clone(),
            ..Default::default()
        };
        let mut user = SovereignUser::new(id, Some(rank), profile);
        user.org_id = org_id;

        if let Err(e) = self.storage.put_user(&user) {
            if let Some(ref invitation) = invitation {
                self.restore_invitation(invitation);
            }
            return Err(HandoffError::UserResolutionFailed(e.to_string()));
        }

        info!("Created sovereign user {} with rank {}", user.id, rank);
        Ok(Resolved { user, created: true, consumed_invite: invitation })
    }

    fn roll_back(&self, resolved: &Resolved) {
        if let Err(e) = self.storage.delete_user(&resolved.user.id) {
            error!("Failed to remove orphaned user {}: {}", resolved.user.id, e);
        }
        if let Some(ref invitation) = resolved.consumed_invite {
            self.restore_invitation(invitation);
        }
    }

    fn restore_invitation(&self, invitation: &crate::models::Invitation) {
        if let Err(e) = self.storage.put_invitation(invitation) {
            error!("Failed to restore invitation for {}: {}", invitation.email, e);
        }
    }
}

/// Re-sign an existing session from the current backing record.
///
/// This is the refresh path, not a login: it requires an already verified
/// credential for the same sovereign user. [`SessionClaims`] can only come
/// out of [`SessionKeys::verify`] or a mint, so a caller cannot hand in a
/// credential it made up.
pub(crate) fn reissue(
    keys: &SessionKeys,
    current: &SessionClaims,
    user: &SovereignUser,
    view_as: Option<Rank>,
    now: u64,
) -> Result<(SessionToken, SessionClaims), SessionError> {
    if current.fields().sovereign_id != user.id {
        return Err(SessionError::SubjectMismatch {
            credential: current.fields().sovereign_id.clone(),
            record: user.id.clone(),
        });
    }
    let fields = SessionFields::from_user(user, current.fields().external_ref.clone(), view_as);
    keys.mint(fields, now)
}
