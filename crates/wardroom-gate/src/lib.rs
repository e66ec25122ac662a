//! Wardroom Gate - rank-gated sessions and sovereign identity
//!
//! Turns a login verified by an external identity provider into an
//! application session, and decides on every page load which routes the
//! caller's rank may reach.
//!
//! # Architecture
//!
//! - **Models**: Sovereign users, identity mappings, invitations
//! - **Storage**: RocksDB-backed transactional data store
//! - **Identity**: External identity to sovereign id registry
//! - **Quarantine**: The only code allowed to reverse-map or delete identities
//! - **Handoff**: The identity handoff ceremony; the only place sessions are minted
//! - **Gate**: Entry gate middleware authorizing page loads by route manifest
//! - **Guard**: Data-layer rank checks that always re-derive rank from the store
//! - **API**: HTTP endpoints for sessions and data
//! - **Admin Socket**: Unix socket for local admin commands (wardroom-admin CLI)
//!
//! # Example
//!
//! ```no_run
//! use wardroom_gate::{GateConfig, GateNode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GateConfig::from_env()?;
//!     let node = GateNode::new(config)?;
//!     node.run().await?;
//!     Ok(())
//! }
//! ```

pub mod admin_socket;
pub mod api;
pub mod error;
pub mod gate;
pub mod guard;
pub mod handoff;
pub mod identity;
pub mod models;
pub mod node;
pub mod provider;
pub mod quarantine;
pub mod session;
mod signed;
pub mod storage;

pub use error::{Error, Result};
pub use gate::Enforcement;
pub use guard::{GuardError, RankGuard};
pub use handoff::{
    Handoff, HandoffCeremony, HandoffError, HandoffStage, SessionClaims, SessionError,
    SessionFields, SessionKeys, SessionToken,
};
pub use identity::{IdentityRegistry, RegistryError};
pub use models::{
    FeaturePreferences, IdentityMapping, Invitation, Profile, ProfileUpdate, SovereignId,
    SovereignUser, ThemeMode, ThemePreference,
};
pub use node::{GateConfig, GateNode, GateState};
pub use provider::{ExternalIdentity, IdentityProvider, LocalProvider, ProviderError};
pub use quarantine::{AccountLifecycle, DeletionReport};
pub use storage::Storage;
