//! Data models for Wardroom Gate.
//!
//! # Core Types
//!
//! - [`SovereignUser`] - The application's own user record
//! - [`SovereignId`] - Validated internal user identifier
//! - [`IdentityMapping`] - Link between an external identity and a sovereign user
//! - [`Invitation`] - Pending rank grant for a not-yet-registered email
//!
//! # Profile
//!
//! - [`Profile`] - Cached profile fields carried in the session credential
//! - [`ThemePreference`] / [`FeaturePreferences`] - UI preferences

mod identity;
mod invitation;
mod profile;
mod user;

pub use identity::IdentityMapping;
pub use invitation::{normalize_email, Invitation};
pub use profile::{FeaturePreferences, Profile, ProfileUpdate, ThemeMode, ThemePreference};
pub use user::{SovereignId, SovereignUser};

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
