//! Sovereign user model.

use super::profile::Profile;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use wardroom_rank::Rank;

const MAX_ID_LEN: usize = 128;

/// The application's internal user identifier.
///
/// Independent of any external provider's identity. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SovereignId(String);

impl SovereignId {
    /// Validate an identifier.
    pub fn parse(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() || id.len() > MAX_ID_LEN {
            return Err(Error::InvalidInput(format!(
                "sovereign id must be 1..={MAX_ID_LEN} characters"
            )));
        }
        if !id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(Error::InvalidInput(format!("invalid sovereign id: {id:?}")));
        }
        Ok(Self(id))
    }

    /// Fresh random identifier (32 lowercase hex chars).
    pub fn generate() -> Self {
        let bytes: [u8; 16] = rand::random();
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SovereignId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<SovereignId> for String {
    fn from(id: SovereignId) -> Self {
        id.0
    }
}

impl fmt::Display for SovereignId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A sovereign user record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SovereignUser {
    /// Sovereign identifier
    pub id: SovereignId,

    /// Assigned rank; `None` means no rank has been assigned yet
    pub rank: Option<Rank>,

    /// Profile fields mirrored into the session credential
    #[serde(default)]
    pub profile: Profile,

    /// Organization the user belongs to
    #[serde(default)]
    pub org_id: Option<String>,

    /// Creation time (ms since epoch)
    pub created_at_ms: u64,

    /// Last modification time (ms since epoch)
    pub updated_at_ms: u64,
}

impl SovereignUser {
    /// Create a new user record stamped with the current time.
    pub fn new(id: SovereignId, rank: Option<Rank>, profile: Profile) -> Self {
        let now = super::now_ms();
        Self {
            id,
            rank,
            profile,
            org_id: None,
            created_at_ms: now,
            updated_at_ms: now,
        }
    }
}
