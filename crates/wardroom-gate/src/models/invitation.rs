//! Invitation model.

use super::user::SovereignId;
use serde::{Deserialize, Serialize};
use wardroom_rank::Rank;

/// A pending rank grant, consumed when the invited email first signs in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Invitation {
    /// Normalized (trimmed, lowercased) email
    pub email: String,

    /// Rank the new user starts with
    pub rank: Rank,

    /// Admiral who issued the invitation
    pub invited_by: Option<SovereignId>,

    /// Organization the new user joins
    #[serde(default)]
    pub org_id: Option<String>,

    /// Creation time (ms since epoch)
    pub created_at_ms: u64,
}

impl Invitation {
    pub fn new(email: &str, rank: Rank, invited_by: Option<SovereignId>) -> Self {
        Self {
            email: normalize_email(email),
            rank,
            invited_by,
            org_id: None,
            created_at_ms: super::now_ms(),
        }
    }

    pub fn with_org(mut self, org_id: Option<String>) -> Self {
        self.org_id = org_id.map(|org| org.trim().to_string()).filter(|org| !org.is_empty());
        self
    }
}

/// Canonical form used for invitation keys.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_normalized() {
        let invite = Invitation::new("  Ops@Example.COM ", Rank::Captain, None);
        assert_eq!(invite.email, "ops@example.com");
        assert_eq!(invite.org_id, None);
    }

    #[test]
    fn blank_org_is_dropped() {
        let invite = Invitation::new("a@b.c", Rank::Crew, None).with_org(Some("  ".into()));
        assert_eq!(invite.org_id, None);
        let invite = Invitation::new("a@b.c", Rank::Crew, None).with_org(Some(" org_7 ".into()));
        assert_eq!(invite.org_id.as_deref(), Some("org_7"));
    }

    #[test]
    fn stored_invitations_without_org_still_load() {
        let raw = r#"{"email":"a@b.c","rank":"captain","invited_by":null,"created_at_ms":1}"#;
        let invite: Invitation = serde_json::from_str(raw).unwrap();
        assert_eq!(invite.org_id, None);
    }
}
