//! Wardroom Rank Model
//!
//! The four-level rank hierarchy (crew < captain < commodore < admiral) and
//! the static route manifests that say which pages each rank may reach.
//!
//! # Rank Model
//!
//! Ranks are totally ordered by an integer level (crew = 0 ... admiral = 3).
//! Comparisons always go through [`Rank::level`], never through the rank's
//! name. An absent rank (`None`) fails every minimum-rank check.
//!
//! # Route Manifests
//!
//! Each rank has exactly one [`RouteManifest`]: a home route, an exact-match
//! allowlist and a navigation tree. [`ManifestRegistry`] assembles the four
//! definitions once at startup and answers lookups without side effects.
//!
//! # Validation
//!
//! [`validate`] cross-checks the manifests against the router's
//! [`DISPATCH_TABLE`] so a route can never be reachable without a view, or
//! rendered without being allowlisted.

mod dispatch;
mod error;
mod manifest;
pub mod manifests;
mod rank;
mod validate;

pub use dispatch::{is_dispatchable, overview_target, ViewRoute, DISPATCH_TABLE, OVERVIEW_REDIRECTS};
pub use error::{Error, Result};
pub use manifest::{ManifestRegistry, NavItem, RouteManifest};
pub use rank::{
    has_exact_rank, has_minimum_rank, is_admiral, is_captain_or_higher, is_commodore_or_higher,
    Rank,
};
pub use validate::{validate, validate_standard, ManifestIssue, ValidationReport};
