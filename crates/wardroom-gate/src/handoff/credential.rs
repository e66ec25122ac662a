//! Session credential: a signed cache of who the caller is.
//!
//! The rank inside a credential is a cache, not a trust boundary. Sensitive
//! handlers re-derive rank from the sovereign id through the rank guard.
//!
//! Minting is `pub(super)`: only the handoff module can create a credential.
//! Everyone else can verify. [`SessionClaims`] has no public constructor and
//! no `Deserialize`, so holding one proves a signature check (or a mint)
//! happened.
//!
//! ```compile_fail
//! use wardroom_gate::handoff::{SessionClaims, SessionFields};
//!
//! fn forge(fields: SessionFields) -> SessionClaims {
//!     SessionClaims { fields, issued_at_ms: 0, expires_at_ms: u64::MAX }
//! }
//! ```
//!
//! ```compile_fail
//! use wardroom_gate::handoff::SessionClaims;
//!
//! fn forge(json: &str) -> SessionClaims {
//!     serde_json::from_str(json).unwrap()
//! }
//! ```

use crate::models::{now_ms, Profile, SovereignId, SovereignUser};
use crate::signed::{self, OpenError};
use ed25519_dalek::{SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use wardroom_rank::{is_admiral, Rank};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "wardroom_session";

/// Errors reading or producing a session credential.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session token is malformed")]
    Malformed,

    #[error("session token signature is invalid")]
    BadSignature,

    #[error("session token has expired")]
    Expired,

    #[error("credential belongs to {credential}, not {record}")]
    SubjectMismatch {
        credential: SovereignId,
        record: SovereignId,
    },

    #[error("session encoding failed: {0}")]
    Encoding(String),
}

impl From<OpenError> for SessionError {
    fn from(e: OpenError) -> Self {
        match e {
            OpenError::Malformed => SessionError::Malformed,
            OpenError::BadSignature => SessionError::BadSignature,
        }
    }
}

/// Fields carried by a credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFields {
    /// Sovereign user the session belongs to
    pub sovereign_id: SovereignId,

    /// External identity, kept only for provider management API calls
    pub external_ref: String,

    /// Cached rank (`None` when the user has no rank assigned)
    pub rank: Option<Rank>,

    /// Cached profile fields
    pub profile: Profile,

    /// Cached organization
    pub org_id: Option<String>,

    /// Rank an admiral is currently viewing the app as
    #[serde(default)]
    pub view_as: Option<Rank>,
}

impl SessionFields {
    /// Cache the current state of `user`.
    ///
    /// `view_as` is kept only while the user is an admiral.
    pub fn from_user(user: &SovereignUser, external_ref: String, view_as: Option<Rank>) -> Self {
        Self {
            sovereign_id: user.id.clone(),
            external_ref,
            rank: user.rank,
            profile: user.profile.clone(),
            org_id: user.org_id.clone(),
            view_as: view_as.filter(|_| is_admiral(user.rank)),
        }
    }

    /// Cached rank, or the lowest rank when none is assigned.
    pub fn actual_rank(&self) -> Rank {
        self.rank.unwrap_or(Rank::LOWEST)
    }

    /// Rank used for route decisions.
    pub fn effective_rank(&self) -> Rank {
        if is_admiral(self.rank) {
            self.view_as.unwrap_or(Rank::Admiral)
        } else {
            self.actual_rank()
        }
    }

    /// True if any cached field differs from the backing record.
    pub fn is_stale(&self, user: &SovereignUser) -> bool {
        self.rank != user.rank
            || self.profile != user.profile
            || self.org_id != user.org_id
            || (self.view_as.is_some() && !is_admiral(user.rank))
    }
}

/// A verified credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionClaims {
    fields: SessionFields,
    issued_at_ms: u64,
    expires_at_ms: u64,
}

impl SessionClaims {
    pub fn fields(&self) -> &SessionFields {
        &self.fields
    }

    pub fn issued_at_ms(&self) -> u64 {
        self.issued_at_ms
    }

    pub fn expires_at_ms(&self) -> u64 {
        self.expires_at_ms
    }
}

/// Signed payload as read back from a token, before the expiry check.
#[derive(Deserialize)]
struct SignedClaims {
    fields: SessionFields,
    issued_at_ms: u64,
    expires_at_ms: u64,
}

/// Opaque signed credential token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[cfg(test)]
    pub(crate) fn from_raw(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

/// Signing and verification keys plus the validity window.
pub struct SessionKeys {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
    window_ms: u64,
}

impl SessionKeys {
    /// Fails when the window does not fit in `u64` milliseconds.
    pub fn new(signing_key: SigningKey, window: Duration) -> Result<Self, SessionError> {
        let window_ms = u64::try_from(window.as_millis())
            .map_err(|_| SessionError::Encoding(format!("session window {window:?} too long")))?;
        let verifying_key = signing_key.verifying_key();
        Ok(Self {
            signing_key,
            verifying_key,
            window_ms,
        })
    }

    /// Validity window in milliseconds.
    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    /// Sign `fields` with an expiry of `now + window`.
    pub(super) fn mint(
        &self,
        fields: SessionFields,
        now: u64,
    ) -> Result<(SessionToken, SessionClaims), SessionError> {
        let claims = SessionClaims {
            fields,
            issued_at_ms: now,
            expires_at_ms: now.saturating_add(self.window_ms),
        };
        let payload =
            serde_json::to_vec(&claims).map_err(|e| SessionError::Encoding(e.to_string()))?;
        let token = SessionToken(signed::seal(&self.signing_key, &payload));
        Ok((token, claims))
    }

    /// Verify a token against the current time.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, SessionError> {
        self.verify_at(token, now_ms())
    }

    /// Verify a token as of `now`. Valid while `now < expires_at_ms`.
    pub fn verify_at(&self, token: &str, now: u64) -> Result<SessionClaims, SessionError> {
        let payload = signed::open(&self.verifying_key, token)?;
        let signed: SignedClaims =
            serde_json::from_slice(&payload).map_err(|_| SessionError::Malformed)?;
        if now >= signed.expires_at_ms {
            return Err(SessionError::Expired);
        }
        Ok(SessionClaims {
            fields: signed.fields,
            issued_at_ms: signed.issued_at_ms,
            expires_at_ms: signed.expires_at_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FeaturePreferences, ThemeMode, ThemePreference};
    use rand::rngs::OsRng;

    const DAY_MS: u64 = 24 * 60 * 60 * 1000;

    fn keys() -> SessionKeys {
        SessionKeys::new(SigningKey::generate(&mut OsRng), Duration::from_millis(30 * DAY_MS))
            .unwrap()
    }

    fn fields(rank: Option<Rank>, profile: Profile) -> SessionFields {
        SessionFields {
            sovereign_id: SovereignId::generate(),
            external_ref: "local|abc".into(),
            rank,
            profile,
            org_id: None,
            view_as: None,
        }
    }

    #[test]
    fn roundtrip_preserves_every_field() {
        let keys = keys();
        let full = Profile {
            name: Some("Ann Bonny".into()),
            email: Some("ann@example.com".into()),
            avatar_url: Some("https://cdn.example.com/ann.png".into()),
            theme: ThemePreference {
                mode: ThemeMode::Dark,
                high_contrast: true,
                accent: Some("#0af".into()),
            },
            preferences: FeaturePreferences {
                compact_tables: true,
                email_signature_enabled: true,
                inbox_page_size: 200,
            },
        };
        let boundary = Profile {
            name: Some(String::new()),
            email: None,
            avatar_url: None,
            theme: ThemePreference {
                mode: ThemeMode::Light,
                high_contrast: false,
                accent: None,
            },
            preferences: FeaturePreferences {
                compact_tables: false,
                email_signature_enabled: false,
                inbox_page_size: 0,
            },
        };

        let mut cases = vec![
            fields(Some(Rank::Crew), Profile::default()),
            fields(None, Profile::default()),
            fields(Some(Rank::Captain), full),
            fields(Some(Rank::Commodore), boundary),
        ];
        let mut admiral = fields(Some(Rank::Admiral), Profile::default());
        admiral.org_id = Some("org_7".into());
        admiral.view_as = Some(Rank::Crew);
        cases.push(admiral);

        for case in cases {
            let (token, _) = keys.mint(case.clone(), 1_000).unwrap();
            let claims = keys.verify_at(token.as_str(), 2_000).unwrap();
            assert_eq!(claims.fields(), &case);
            assert_eq!(claims.issued_at_ms(), 1_000);
        }
    }

    #[test]
    fn expiry_boundary() {
        let keys = keys();
        let issued = 5_000;
        let (token, claims) = keys
            .mint(fields(Some(Rank::Crew), Profile::default()), issued)
            .unwrap();
        let window = keys.window_ms();
        assert_eq!(claims.expires_at_ms(), issued + window);

        assert!(keys.verify_at(token.as_str(), issued + window - 1).is_ok());
        assert_eq!(
            keys.verify_at(token.as_str(), issued + window + 1),
            Err(SessionError::Expired)
        );
    }

    #[test]
    fn token_from_other_keys_is_rejected() {
        let (token, _) = keys().mint(fields(Some(Rank::Crew), Profile::default()), 0).unwrap();
        assert_eq!(keys().verify_at(token.as_str(), 1), Err(SessionError::BadSignature));
        assert_eq!(keys().verify_at("nonsense", 1), Err(SessionError::Malformed));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let keys = keys();
        let (token, _) = keys
            .mint(fields(Some(Rank::Crew), Profile::default()), 0)
            .unwrap();
        let (payload, sig) = token.as_str().split_once('.').unwrap();
        let raw = String::from_utf8(hex::decode(payload).unwrap()).unwrap();
        let promoted = raw.replace("\"crew\"", "\"admiral\"");
        assert_ne!(raw, promoted);

        let forged = format!("{}.{}", hex::encode(promoted), sig);
        assert_eq!(keys.verify_at(&forged, 1), Err(SessionError::BadSignature));
    }

    #[test]
    fn oversized_window_is_refused() {
        let result = SessionKeys::new(SigningKey::generate(&mut OsRng), Duration::MAX);
        assert!(matches!(result, Err(SessionError::Encoding(_))));
    }

    #[test]
    fn effective_rank_honors_view_as_for_admirals_only() {
        let mut f = fields(Some(Rank::Admiral), Profile::default());
        assert_eq!(f.effective_rank(), Rank::Admiral);
        f.view_as = Some(Rank::Captain);
        assert_eq!(f.effective_rank(), Rank::Captain);
        assert_eq!(f.actual_rank(), Rank::Admiral);

        let mut crew = fields(Some(Rank::Crew), Profile::default());
        crew.view_as = Some(Rank::Admiral);
        assert_eq!(crew.effective_rank(), Rank::Crew);

        assert_eq!(fields(None, Profile::default()).effective_rank(), Rank::Crew);
    }

    #[test]
    fn staleness_tracks_backing_record() {
        let mut user =
            SovereignUser::new(SovereignId::generate(), Some(Rank::Crew), Profile::default());
        let cached = SessionFields::from_user(&user, "ext".into(), None);
        assert!(!cached.is_stale(&user));

        user.rank = Some(Rank::Captain);
        assert!(cached.is_stale(&user));

        user.rank = Some(Rank::Crew);
        user.profile.theme.mode = ThemeMode::Dark;
        assert!(cached.is_stale(&user));
    }

    #[test]
    fn view_as_dropped_for_non_admirals() {
        let user =
            SovereignUser::new(SovereignId::generate(), Some(Rank::Commodore), Profile::default());
        let fields = SessionFields::from_user(&user, "ext".into(), Some(Rank::Crew));
        assert_eq!(fields.view_as, None);
    }
}
