//! Persistent storage using RocksDB.
//!
//! Opened as a transactional database: writes that must keep an index
//! consistent (user rank index, identity uniqueness) run inside a
//! pessimistic transaction and lock the keys they read.

use crate::error::{Error, Result};
use crate::models::{normalize_email, Invitation, ProfileUpdate, SovereignId, SovereignUser};
use ed25519_dalek::SigningKey;
use rocksdb::{Options, TransactionDB, TransactionDBOptions};
use std::path::Path;
use wardroom_rank::Rank;

const USER_PREFIX: &str = "user:";
const RANK_INDEX_PREFIX: &str = "user_rank:";
const INVITE_PREFIX: &str = "invite:";
const KEY_PREFIX: &str = "key:";
const NONCE_PREFIX: &str = "nonce:";
const REVOKED_PREFIX: &str = "revoked:";

fn user_key(id: &SovereignId) -> String {
    format!("{USER_PREFIX}{id}")
}

fn rank_index_key(rank: Rank, id: &SovereignId) -> String {
    format!("{RANK_INDEX_PREFIX}{rank}:{id}")
}

fn invite_key(email: &str) -> String {
    format!("{INVITE_PREFIX}{}", normalize_email(email))
}

/// Storage backend for Gate data.
pub struct Storage {
    db: TransactionDB,
}

impl Storage {
    /// Open or create storage at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let txn_opts = TransactionDBOptions::default();
        let db = TransactionDB::open(&opts, &txn_opts, path)?;
        Ok(Self { db })
    }

    /// Raw handle for keyspaces owned by other modules (identity registry).
    pub(crate) fn db(&self) -> &TransactionDB {
        &self.db
    }

    /// Collect `(key, value)` pairs under a prefix.
    pub(crate) fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let mut out = Vec::new();
        for item in self.db.prefix_iterator(prefix.as_bytes()) {
            let (key, value) = item?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            out.push((String::from_utf8_lossy(&key).into_owned(), value.into_vec()));
        }
        Ok(out)
    }

    // --- Sovereign users ---

    /// Get a user by sovereign id.
    pub fn get_user(&self, id: &SovereignId) -> Result<Option<SovereignUser>> {
        match self.db.get(user_key(id).as_bytes())? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    /// Insert or replace a user, keeping the rank index in step.
    pub fn put_user(&self, user: &SovereignUser) -> Result<()> {
        let txn = self.db.transaction();
        let key = user_key(&user.id);
        let previous: Option<SovereignUser> = match txn.get_for_update(key.as_bytes(), true)? {
            Some(data) => Some(serde_json::from_slice(&data)?),
            None => None,
        };
        if let Some(rank) = previous.and_then(|p| p.rank) {
            txn.delete(rank_index_key(rank, &user.id).as_bytes())?;
        }
        if let Some(rank) = user.rank {
            txn.put(rank_index_key(rank, &user.id).as_bytes(), b"")?;
        }
        txn.put(key.as_bytes(), serde_json::to_vec(user)?)?;
        txn.commit()?;
        Ok(())
    }

    /// Apply `patch` to an existing user. Returns `None` if the user does not exist.
    pub fn modify_user<F>(&self, id: &SovereignId, patch: F) -> Result<Option<SovereignUser>>
    where
        F: FnOnce(&mut SovereignUser),
    {
        let txn = self.db.transaction();
        let key = user_key(id);
        let mut user: SovereignUser = match txn.get_for_update(key.as_bytes(), true)? {
            Some(data) => serde_json::from_slice(&data)?,
            None => return Ok(None),
        };
        let old_rank = user.rank;

        patch(&mut user);
        if user.id != *id {
            return Err(Error::InvalidInput("sovereign id cannot be changed".into()));
        }
        user.updated_at_ms = crate::models::now_ms();

        if old_rank != user.rank {
            if let Some(rank) = old_rank {
                txn.delete(rank_index_key(rank, id).as_bytes())?;
            }
            if let Some(rank) = user.rank {
                txn.put(rank_index_key(rank, id).as_bytes(), b"")?;
            }
        }
        txn.put(key.as_bytes(), serde_json::to_vec(&user)?)?;
        txn.commit()?;
        Ok(Some(user))
    }

    /// Assign (or clear) a user's rank.
    pub fn set_rank(&self, id: &SovereignId, rank: Option<Rank>) -> Result<Option<SovereignUser>> {
        self.modify_user(id, |user| user.rank = rank)
    }

    /// Update a user's profile fields.
    pub fn update_profile(
        &self,
        id: &SovereignId,
        update: ProfileUpdate,
    ) -> Result<Option<SovereignUser>> {
        self.modify_user(id, |user| user.profile.apply(update))
    }

    /// Delete a user and its index entry. Returns whether anything was deleted.
    pub fn delete_user(&self, id: &SovereignId) -> Result<bool> {
        let txn = self.db.transaction();
        let key = user_key(id);
        let user: SovereignUser = match txn.get_for_update(key.as_bytes(), true)? {
            Some(data) => serde_json::from_slice(&data)?,
            None => return Ok(false),
        };
        if let Some(rank) = user.rank {
            txn.delete(rank_index_key(rank, id).as_bytes())?;
        }
        txn.delete(key.as_bytes())?;
        txn.commit()?;
        Ok(true)
    }

    /// List users holding exactly `rank` (the `by_rank` index).
    pub fn list_users_by_rank(&self, rank: Rank) -> Result<Vec<SovereignUser>> {
        let prefix = format!("{RANK_INDEX_PREFIX}{rank}:");
        let mut users = Vec::new();
        for (key, _) in self.scan_prefix(&prefix)? {
            let Some(raw_id) = key.strip_prefix(&prefix) else {
                continue;
            };
            let id = SovereignId::parse(raw_id)?;
            match self.get_user(&id)? {
                Some(user) => users.push(user),
                None => tracing::warn!("Rank index entry {} has no user record", key),
            }
        }
        Ok(users)
    }

    // --- Invitations ---

    /// Store (or replace) an invitation.
    pub fn put_invitation(&self, invitation: &Invitation) -> Result<()> {
        let value = serde_json::to_vec(invitation)?;
        self.db.put(invite_key(&invitation.email).as_bytes(), value)?;
        Ok(())
    }

    /// Get a pending invitation by email.
    pub fn get_invitation(&self, email: &str) -> Result<Option<Invitation>> {
        match self.db.get(invite_key(email).as_bytes())? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    /// Remove and return a pending invitation. At most one caller receives it.
    pub fn take_invitation(&self, email: &str) -> Result<Option<Invitation>> {
        let txn = self.db.transaction();
        let key = invite_key(email);
        let invitation: Invitation = match txn.get_for_update(key.as_bytes(), true)? {
            Some(data) => serde_json::from_slice(&data)?,
            None => return Ok(None),
        };
        txn.delete(key.as_bytes())?;
        txn.commit()?;
        Ok(Some(invitation))
    }

    // --- Provider ticket state ---

    /// Record a ticket nonce as spent until `expires_at_ms`.
    ///
    /// Returns `false` if the nonce was already spent.
    pub fn spend_nonce(&self, nonce: &str, expires_at_ms: u64) -> Result<bool> {
        let txn = self.db.transaction();
        let key = format!("{NONCE_PREFIX}{nonce}");
        if txn.get_for_update(key.as_bytes(), true)?.is_some() {
            return Ok(false);
        }
        txn.put(key.as_bytes(), expires_at_ms.to_be_bytes())?;
        txn.commit()?;
        Ok(true)
    }

    /// Drop spent nonces whose tickets have expired as of `now`.
    pub fn prune_nonces(&self, now: u64) -> Result<usize> {
        let mut pruned = 0;
        for (key, value) in self.scan_prefix(NONCE_PREFIX)? {
            let expires_at_ms = <[u8; 8]>::try_from(value.as_slice())
                .map(u64::from_be_bytes)
                .unwrap_or(0);
            if now >= expires_at_ms {
                self.db.delete(key.as_bytes())?;
                pruned += 1;
            }
        }
        Ok(pruned)
    }

    /// Mark an external identity as deleted at the provider.
    pub fn revoke_identity(&self, external_id: &str) -> Result<()> {
        self.db.put(format!("{REVOKED_PREFIX}{external_id}").as_bytes(), b"")?;
        Ok(())
    }

    pub fn is_identity_revoked(&self, external_id: &str) -> Result<bool> {
        Ok(self
            .db
            .get(format!("{REVOKED_PREFIX}{external_id}").as_bytes())?
            .is_some())
    }

    // --- Signing keys ---

    /// Get or create a named ed25519 signing key (persistent across restarts).
    pub fn get_or_create_signing_key(&self, name: &str) -> Result<SigningKey> {
        let key = format!("{KEY_PREFIX}{name}");

        if let Some(data) = self.db.get(key.as_bytes())? {
            let bytes: [u8; 32] = data
                .as_slice()
                .try_into()
                .map_err(|_| Error::Storage(format!("Invalid stored key {name}")))?;
            Ok(SigningKey::from_bytes(&bytes))
        } else {
            let mut rng = rand::thread_rng();
            let signing_key = SigningKey::generate(&mut rng);
            self.db.put(key.as_bytes(), signing_key.as_bytes())?;
            Ok(signing_key)
        }
    }
}
