//! Rank guard utilities for data-access handlers.
//!
//! Every check takes a sovereign id and loads the user from the store. A
//! rank claim from the session credential or a request body is never an
//! input here.

use crate::error::Error;
use crate::models::SovereignId;
use crate::storage::Storage;
use thiserror::Error;
use wardroom_rank::{has_minimum_rank, Rank};

/// Data-level authorization failures.
#[derive(Debug, Error)]
pub enum GuardError {
    /// The sovereign user does not exist (stale session).
    #[error("sovereign user {0} not found")]
    UserNotFound(SovereignId),

    /// The user exists but has never been given a rank.
    #[error("sovereign user {0} has no rank assigned")]
    RankNotAssigned(SovereignId),

    #[error("requires {required}, caller is {actual}")]
    InsufficientRank { required: Rank, actual: Rank },

    #[error(transparent)]
    Storage(#[from] Error),
}

/// Fresh-lookup rank checks.
pub struct RankGuard<'a> {
    storage: &'a Storage,
}

impl<'a> RankGuard<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    fn load_rank(&self, id: &SovereignId) -> Result<Rank, GuardError> {
        let user = self
            .storage
            .get_user(id)?
            .ok_or_else(|| GuardError::UserNotFound(id.clone()))?;
        user.rank.ok_or_else(|| GuardError::RankNotAssigned(id.clone()))
    }

    /// Fail unless the user is exactly admiral.
    pub fn require_admiral_rank(&self, id: &SovereignId) -> Result<Rank, GuardError> {
        let rank = self.load_rank(id)?;
        if rank != Rank::Admiral {
            return Err(GuardError::InsufficientRank {
                required: Rank::Admiral,
                actual: rank,
            });
        }
        Ok(rank)
    }

    /// Fail unless the user's rank meets `minimum`.
    pub fn require_minimum_rank(
        &self,
        id: &SovereignId,
        minimum: Rank,
    ) -> Result<Rank, GuardError> {
        let rank = self.load_rank(id)?;
        if !has_minimum_rank(Some(rank), minimum) {
            return Err(GuardError::InsufficientRank {
                required: minimum,
                actual: rank,
            });
        }
        Ok(rank)
    }

    /// Non-throwing admiral check. Any failure reads as `false`.
    pub fn is_admiral(&self, id: &SovereignId) -> bool {
        matches!(self.get_user_rank(id), Some(Rank::Admiral))
    }

    /// The user's current rank, or `None` if missing, unranked, or unreadable.
    pub fn get_user_rank(&self, id: &SovereignId) -> Option<Rank> {
        self.storage.get_user(id).ok().flatten().and_then(|user| user.rank)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Profile, SovereignUser};
    use tempfile::tempdir;

    fn seed(storage: &Storage, rank: Option<Rank>) -> SovereignId {
        let user = SovereignUser::new(SovereignId::generate(), rank, Profile::default());
        storage.put_user(&user).unwrap();
        user.id
    }

    #[test]
    fn admiral_check_is_exact() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();
        let guard = RankGuard::new(&storage);

        let admiral = seed(&storage, Some(Rank::Admiral));
        let commodore = seed(&storage, Some(Rank::Commodore));

        assert_eq!(guard.require_admiral_rank(&admiral).unwrap(), Rank::Admiral);
        assert!(matches!(
            guard.require_admiral_rank(&commodore),
            Err(GuardError::InsufficientRank { required: Rank::Admiral, actual: Rank::Commodore })
        ));
        assert!(guard.is_admiral(&admiral));
        assert!(!guard.is_admiral(&commodore));
    }

    #[test]
    fn unranked_user_is_distinct_from_insufficient() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();
        let guard = RankGuard::new(&storage);

        let unranked = seed(&storage, None);
        let crew = seed(&storage, Some(Rank::Crew));

        assert!(matches!(
            guard.require_minimum_rank(&unranked, Rank::Admiral),
            Err(GuardError::RankNotAssigned(ref id)) if *id == unranked
        ));
        assert!(matches!(
            guard.require_minimum_rank(&crew, Rank::Admiral),
            Err(GuardError::InsufficientRank { .. })
        ));
        assert_eq!(guard.require_minimum_rank(&crew, Rank::Crew).unwrap(), Rank::Crew);
        assert_eq!(guard.get_user_rank(&unranked), None);
    }

    #[test]
    fn checks_reflect_store_changes() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();
        let guard = RankGuard::new(&storage);

        let id = seed(&storage, Some(Rank::Crew));
        assert!(guard.require_minimum_rank(&id, Rank::Captain).is_err());

        storage.set_rank(&id, Some(Rank::Captain)).unwrap();
        assert_eq!(guard.require_minimum_rank(&id, Rank::Captain).unwrap(), Rank::Captain);

        storage.delete_user(&id).unwrap();
        assert!(matches!(
            guard.require_minimum_rank(&id, Rank::Crew),
            Err(GuardError::UserNotFound(_))
        ));
        assert_eq!(guard.get_user_rank(&id), None);
    }
}
