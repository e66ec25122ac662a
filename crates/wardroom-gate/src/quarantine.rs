//! Quarantined account lifecycle.
//!
//! The only module that may resolve a sovereign id back to its external
//! identity or delete an identity mapping. It does so by minting a
//! [`DeletionAuthority`], which nothing outside this module can construct.

use crate::error::Result;
use crate::identity::IdentityRegistry;
use crate::models::SovereignId;
use crate::provider::IdentityProvider;
use crate::storage::Storage;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Capability required by the registry's reverse lookup and delete.
pub struct DeletionAuthority {
    _sealed: (),
}

impl DeletionAuthority {
    fn new() -> Self {
        Self { _sealed: () }
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self::new()
    }
}

/// What an account deletion removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionReport {
    pub sovereign_id: SovereignId,
    pub user_deleted: bool,
    pub mapping_deleted: bool,
    pub provider_identity_deleted: bool,
}

/// Account deletion and admin recovery.
pub struct AccountLifecycle {
    storage: Arc<Storage>,
    registry: IdentityRegistry,
    provider: Arc<dyn IdentityProvider>,
}

impl AccountLifecycle {
    pub fn new(
        storage: Arc<Storage>,
        registry: IdentityRegistry,
        provider: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            storage,
            registry,
            provider,
        }
    }

    /// Delete a sovereign user, its identity mapping, and its provider identity.
    ///
    /// A provider failure is logged but does not undo the local deletion.
    pub fn delete_account(&self, sovereign_id: &SovereignId) -> Result<DeletionReport> {
        let authority = DeletionAuthority::new();

        let external_id = self.registry.reverse_lookup(&authority, sovereign_id)?;
        let mapping_deleted = self.registry.delete(&authority, sovereign_id)?;
        let user_deleted = self.storage.delete_user(sovereign_id)?;

        let provider_identity_deleted = match external_id {
            Some(ref external_id) => match self.provider.delete_identity(external_id) {
                Ok(()) => true,
                Err(e) => {
                    warn!("Provider failed to delete identity for {}: {}", sovereign_id, e);
                    false
                }
            },
            None => false,
        };

        info!(
            "Deleted account {} (user: {}, mapping: {}, provider: {})",
            sovereign_id, user_deleted, mapping_deleted, provider_identity_deleted
        );

        Ok(DeletionReport {
            sovereign_id: sovereign_id.clone(),
            user_deleted,
            mapping_deleted,
            provider_identity_deleted,
        })
    }

    /// One-time sign-in token for another user, issued by an admiral.
    ///
    /// Returns `None` when the user has no external identity on record.
    pub fn issue_recovery_link(&self, sovereign_id: &SovereignId) -> Result<Option<String>> {
        let authority = DeletionAuthority::new();
        let Some(external_id) = self.registry.reverse_lookup(&authority, sovereign_id)? else {
            return Ok(None);
        };
        let token = self.provider.issue_sign_in_token(&external_id)?;
        info!("Issued recovery sign-in token for {}", sovereign_id);
        Ok(Some(token))
    }
}
