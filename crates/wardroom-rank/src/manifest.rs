//! Route manifests and the registry that serves them.

use crate::error::{Error, Result};
use crate::manifests;
use crate::rank::Rank;
use serde::Serialize;
use std::collections::HashSet;

/// One entry in a rank's navigation tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavItem {
    /// Route the entry links to
    pub route: &'static str,

    /// Display label
    pub label: &'static str,

    /// Icon identifier
    pub icon: &'static str,

    /// Nested entries
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    pub children: &'static [NavItem],
}

impl NavItem {
    /// An entry with no children.
    pub const fn leaf(route: &'static str, label: &'static str, icon: &'static str) -> Self {
        Self {
            route,
            label,
            icon,
            children: &[],
        }
    }

    /// All routes in this subtree, depth first, parent before children.
    pub fn routes(&self) -> Vec<&'static str> {
        let mut out = vec![self.route];
        for child in self.children {
            out.extend(child.routes());
        }
        out
    }
}

/// Static definition of what one rank may reach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteManifest {
    /// The rank this manifest belongs to
    pub id: Rank,

    /// Default landing route
    pub home: &'static str,

    /// Exact-match allowlist
    pub allowed: &'static [&'static str],

    /// Navigation tree
    pub nav: &'static [NavItem],
}

impl RouteManifest {
    /// Every route mentioned anywhere in the navigation tree.
    pub fn nav_routes(&self) -> Vec<&'static str> {
        self.nav.iter().flat_map(NavItem::routes).collect()
    }
}

struct Entry {
    manifest: &'static RouteManifest,
    allowed: HashSet<&'static str>,
}

impl Entry {
    fn new(manifest: &'static RouteManifest) -> Result<Self> {
        let allowed: HashSet<&'static str> = manifest.allowed.iter().copied().collect();
        if !allowed.contains(manifest.home) {
            return Err(Error::HomeNotAllowed {
                rank: manifest.id,
                home: manifest.home,
            });
        }
        Ok(Self { manifest, allowed })
    }
}

/// Read-only lookup table over the four rank manifests.
///
/// Built once at startup; every rank has exactly one manifest.
pub struct ManifestRegistry {
    entries: [Entry; 4],
}

impl ManifestRegistry {
    /// Registry over the built-in crew, captain, commodore and admiral manifests.
    pub fn standard() -> Result<Self> {
        Self::from_manifests(&[
            &manifests::CREW,
            &manifests::CAPTAIN,
            &manifests::COMMODORE,
            &manifests::ADMIRAL,
        ])
    }

    /// Assemble a registry, requiring exactly one manifest per rank.
    pub fn from_manifests(manifests: &[&'static RouteManifest]) -> Result<Self> {
        let mut slots: [Option<Entry>; 4] = Default::default();
        for manifest in manifests {
            let slot = &mut slots[manifest.id.level() as usize];
            if slot.is_some() {
                return Err(Error::DuplicateManifest(manifest.id));
            }
            *slot = Some(Entry::new(manifest)?);
        }

        let [crew, captain, commodore, admiral] = slots;
        Ok(Self {
            entries: [
                crew.ok_or(Error::MissingManifest(Rank::Crew))?,
                captain.ok_or(Error::MissingManifest(Rank::Captain))?,
                commodore.ok_or(Error::MissingManifest(Rank::Commodore))?,
                admiral.ok_or(Error::MissingManifest(Rank::Admiral))?,
            ],
        })
    }

    fn entry(&self, rank: Rank) -> &Entry {
        &self.entries[rank.level() as usize]
    }

    /// True iff `path` is listed verbatim in `rank`'s allowlist.
    pub fn is_route_allowed(&self, rank: Rank, path: &str) -> bool {
        self.entry(rank).allowed.contains(path)
    }

    /// Home route for `rank`, or crew's home when no rank is known.
    pub fn get_rank_home(&self, rank: Option<Rank>) -> &'static str {
        self.entry(rank.unwrap_or(Rank::LOWEST)).manifest.home
    }

    /// Full manifest for `rank`.
    pub fn get_manifest(&self, rank: Rank) -> &'static RouteManifest {
        self.entry(rank).manifest
    }

    /// All manifests, lowest rank first.
    pub fn manifests(&self) -> impl Iterator<Item = &'static RouteManifest> + '_ {
        self.entries.iter().map(|e| e.manifest)
    }

    /// Union of every rank's allowlist.
    pub fn all_allowed(&self) -> HashSet<&'static str> {
        self.entries
            .iter()
            .flat_map(|e| e.allowed.iter().copied())
            .collect()
    }
}
