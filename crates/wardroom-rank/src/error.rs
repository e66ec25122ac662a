//! Error types for wardroom-rank.

use crate::rank::Rank;
use thiserror::Error;

/// Result type for rank and manifest operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while parsing ranks or assembling the manifest registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A rank name outside the enumerated set.
    #[error("unknown rank: {0:?}")]
    UnknownRank(String),

    /// The registry was built without a manifest for this rank.
    #[error("no route manifest defined for rank {0}")]
    MissingManifest(Rank),

    /// Two manifests claim the same rank.
    #[error("rank {0} has more than one route manifest")]
    DuplicateManifest(Rank),

    /// A manifest's home route is not part of its own allowlist.
    #[error("home route {home} of rank {rank} is not in its allowlist")]
    HomeNotAllowed { rank: Rank, home: &'static str },
}
