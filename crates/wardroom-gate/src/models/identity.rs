//! Identity mapping model.

use super::user::SovereignId;
use serde::{Deserialize, Serialize};

/// Durable link between one external identity and one sovereign user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityMapping {
    /// Mapping identifier (Blake3 of the mapping's contents)
    pub id: String,

    /// Identifier issued by the external provider
    pub external_id: String,

    /// Sovereign user this identity resolves to
    pub sovereign_id: SovereignId,

    /// Provider tag (e.g. "local")
    pub provider: String,

    /// Creation time (ms since epoch)
    pub created_at_ms: u64,
}

impl IdentityMapping {
    /// Create a mapping stamped with the current time.
    pub fn new(external_id: &str, sovereign_id: SovereignId, provider: &str) -> Self {
        let created_at_ms = super::now_ms();
        Self {
            id: Self::generate_id(external_id, &sovereign_id, created_at_ms),
            external_id: external_id.to_string(),
            sovereign_id,
            provider: provider.to_string(),
            created_at_ms,
        }
    }

    /// Generate the mapping id from its identifying fields.
    pub fn generate_id(
        external_id: &str,
        sovereign_id: &SovereignId,
        created_at_ms: u64,
    ) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(external_id.as_bytes());
        hasher.update(b"\0");
        hasher.update(sovereign_id.as_str().as_bytes());
        hasher.update(b"\0");
        hasher.update(&created_at_ms.to_be_bytes());
        hex::encode(&hasher.finalize().as_bytes()[..16])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_depends_on_contents() {
        let sov = SovereignId::parse("abc").unwrap();
        let a = IdentityMapping::generate_id("ext-1", &sov, 100);
        assert_eq!(a, IdentityMapping::generate_id("ext-1", &sov, 100));
        assert_ne!(a, IdentityMapping::generate_id("ext-2", &sov, 100));
        assert_ne!(a, IdentityMapping::generate_id("ext-1", &sov, 101));
    }
}
