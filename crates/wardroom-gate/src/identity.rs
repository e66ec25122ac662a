//! Identity registry: external identity to sovereign id.
//!
//! Two unique indexes live side by side in the store:
//!
//! - `identity:ext:{external_id}` holds the [`IdentityMapping`]
//! - `identity:sov:{sovereign_id}` holds the external id
//!
//! Both are written in one transaction that first locks both keys, so the
//! mapping stays one-to-one across concurrent writers without any
//! application-level lock.
//!
//! Ordinary code may only go from external id to sovereign id. The reverse
//! direction and deletion require a [`DeletionAuthority`], which only the
//! quarantine module can produce.

use crate::models::{IdentityMapping, SovereignId};
use crate::quarantine::DeletionAuthority;
use crate::storage::Storage;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

const EXT_PREFIX: &str = "identity:ext:";
const SOV_PREFIX: &str = "identity:sov:";

fn ext_key(external_id: &str) -> String {
    format!("{EXT_PREFIX}{external_id}")
}

fn sov_key(sovereign_id: &SovereignId) -> String {
    format!("{SOV_PREFIX}{sovereign_id}")
}

/// Errors raised by the identity registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The external id is already mapped to a different sovereign user.
    #[error("external identity {external_id} is mapped to {existing}, refusing {attempted}")]
    Conflict {
        external_id: String,
        existing: SovereignId,
        attempted: SovereignId,
    },

    /// The sovereign user is already mapped to a different external id.
    #[error("sovereign user {sovereign_id} is already mapped to another external identity")]
    SovereignTaken { sovereign_id: SovereignId },

    /// The two indexes disagree.
    #[error("identity index integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("storage: {0}")]
    Storage(String),
}

impl From<rocksdb::Error> for RegistryError {
    fn from(e: rocksdb::Error) -> Self {
        RegistryError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(e: serde_json::Error) -> Self {
        RegistryError::Storage(e.to_string())
    }
}

impl From<crate::error::Error> for RegistryError {
    fn from(e: crate::error::Error) -> Self {
        RegistryError::Storage(e.to_string())
    }
}

/// Durable one-to-one mapping between external and sovereign identities.
#[derive(Clone)]
pub struct IdentityRegistry {
    storage: Arc<Storage>,
}

impl IdentityRegistry {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// Map `external_id` to `sovereign_id`.
    ///
    /// Registering an existing pair again returns the stored mapping
    /// unchanged. Registering an external id that already belongs to another
    /// sovereign user (or a sovereign user that already has another external
    /// id) is a conflict and writes nothing.
    pub fn register(
        &self,
        external_id: &str,
        sovereign_id: &SovereignId,
        provider: &str,
    ) -> Result<IdentityMapping, RegistryError> {
        let db = self.storage.db();
        let txn = db.transaction();
        let ext = ext_key(external_id);
        let sov = sov_key(sovereign_id);

        if let Some(data) = txn.get_for_update(ext.as_bytes(), true)? {
            let existing: IdentityMapping = serde_json::from_slice(&data)?;
            if existing.sovereign_id == *sovereign_id {
                return Ok(existing);
            }
            error!(
                "Identity conflict: {} is mapped to {}, attempted {}",
                external_id, existing.sovereign_id, sovereign_id
            );
            return Err(RegistryError::Conflict {
                external_id: external_id.to_string(),
                existing: existing.sovereign_id,
                attempted: sovereign_id.clone(),
            });
        }

        if txn.get_for_update(sov.as_bytes(), true)?.is_some() {
            error!(
                "Identity conflict: sovereign user {} already has an external identity",
                sovereign_id
            );
            return Err(RegistryError::SovereignTaken {
                sovereign_id: sovereign_id.clone(),
            });
        }

        let mapping = IdentityMapping::new(external_id, sovereign_id.clone(), provider);
        txn.put(ext.as_bytes(), serde_json::to_vec(&mapping)?)?;
        txn.put(sov.as_bytes(), external_id.as_bytes())?;
        txn.commit()?;

        info!("Registered identity mapping {} for sovereign user {}", mapping.id, sovereign_id);
        Ok(mapping)
    }

    /// Full mapping for an external id.
    pub fn mapping(&self, external_id: &str) -> Result<Option<IdentityMapping>, RegistryError> {
        match self.storage.db().get(ext_key(external_id).as_bytes())? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    /// Sovereign id for an external id. A miss is `Ok(None)`.
    pub fn lookup_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<SovereignId>, RegistryError> {
        Ok(self.mapping(external_id)?.map(|m| m.sovereign_id))
    }

    /// External id for a sovereign id. Quarantine path only.
    pub fn reverse_lookup(
        &self,
        _authority: &DeletionAuthority,
        sovereign_id: &SovereignId,
    ) -> Result<Option<String>, RegistryError> {
        match self.storage.db().get(sov_key(sovereign_id).as_bytes())? {
            Some(data) => String::from_utf8(data)
                .map(Some)
                .map_err(|_| {
                    RegistryError::IntegrityViolation(format!(
                        "non-utf8 external id for {sovereign_id}"
                    ))
                }),
            None => Ok(None),
        }
    }

    /// Remove the mapping for a sovereign id. Quarantine path only.
    ///
    /// Returns whether a mapping was removed.
    pub fn delete(
        &self,
        _authority: &DeletionAuthority,
        sovereign_id: &SovereignId,
    ) -> Result<bool, RegistryError> {
        let db = self.storage.db();
        let txn = db.transaction();
        let sov = sov_key(sovereign_id);

        let Some(data) = txn.get_for_update(sov.as_bytes(), true)? else {
            return Ok(false);
        };
        let external_id = String::from_utf8_lossy(&data).into_owned();
        let ext = ext_key(&external_id);

        if let Some(data) = txn.get_for_update(ext.as_bytes(), true)? {
            let mapping: IdentityMapping = serde_json::from_slice(&data)?;
            if mapping.sovereign_id != *sovereign_id {
                error!(
                    "Identity index disagreement: {} points to {}, but {} points back to {}",
                    sovereign_id, external_id, external_id, mapping.sovereign_id
                );
                return Err(RegistryError::IntegrityViolation(format!(
                    "{external_id} maps to {} not {sovereign_id}",
                    mapping.sovereign_id
                )));
            }
            txn.delete(ext.as_bytes())?;
        }
        txn.delete(sov.as_bytes())?;
        txn.commit()?;

        info!("Deleted identity mapping for sovereign user {}", sovereign_id);
        Ok(true)
    }

    /// Cross-check both indexes.
    ///
    /// Returns the number of mappings checked, or an integrity violation
    /// listing every disagreement found.
    pub fn audit(&self) -> Result<usize, RegistryError> {
        let mut violations = Vec::new();

        let by_external = self.storage.scan_prefix(EXT_PREFIX)?;
        for (key, value) in &by_external {
            let external_id = &key[EXT_PREFIX.len()..];
            let mapping: IdentityMapping = serde_json::from_slice(value)?;
            if mapping.external_id != external_id {
                violations.push(format!("{key} stores mapping for {}", mapping.external_id));
            }
            match self.storage.db().get(sov_key(&mapping.sovereign_id).as_bytes())? {
                Some(back) if back == external_id.as_bytes() => {}
                Some(back) => violations.push(format!(
                    "{external_id} -> {} but {} -> {}",
                    mapping.sovereign_id,
                    mapping.sovereign_id,
                    String::from_utf8_lossy(&back)
                )),
                None => violations.push(format!(
                    "{external_id} -> {} has no reverse entry",
                    mapping.sovereign_id
                )),
            }
        }

        for (key, value) in self.storage.scan_prefix(SOV_PREFIX)? {
            let external_id = String::from_utf8_lossy(&value).into_owned();
            let sovereign_id = &key[SOV_PREFIX.len()..];
            match self.mapping(&external_id)? {
                Some(mapping) if mapping.sovereign_id.as_str() == sovereign_id => {}
                Some(mapping) => violations.push(format!(
                    "{sovereign_id} -> {external_id} but {external_id} -> {}",
                    mapping.sovereign_id
                )),
                None => violations.push(format!(
                    "{sovereign_id} -> {external_id} has no forward entry"
                )),
            }
        }

        if violations.is_empty() {
            info!("Identity audit passed: {} mappings", by_external.len());
            Ok(by_external.len())
        } else {
            for violation in &violations {
                error!("Identity integrity violation: {}", violation);
            }
            Err(RegistryError::IntegrityViolation(violations.join("; ")))
        }
    }
}
