//! Cross-checks between the route manifests and the router's dispatch table.
//!
//! Four checks:
//! - (a) every dispatchable route is allowlisted by at least one rank
//! - (b) every allowlisted route has a live view
//! - (c) every nav route is in its rank's allowlist, unless it is an
//!   exempt overview route
//! - (d) dispatchable and allowlisted route sets match (drift is a warning)

use crate::dispatch::{ViewRoute, DISPATCH_TABLE, OVERVIEW_REDIRECTS};
use crate::manifest::ManifestRegistry;
use crate::rank::Rank;
use std::collections::BTreeSet;
use std::fmt;

/// A single finding from [`validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestIssue {
    /// (a) The router can dispatch a route no rank may reach.
    UnreachableRoute { route: &'static str },
    /// (b) A rank allowlists a route without a live view.
    MissingView { rank: Rank, route: &'static str },
    /// (c) A rank's nav links to a route outside its allowlist.
    NavNotAllowed { rank: Rank, route: &'static str },
    /// (d) Dispatchable but allowlisted by nobody.
    DispatchOnly { route: &'static str },
    /// (d) Allowlisted but not dispatchable.
    AllowlistOnly { route: &'static str },
}

impl fmt::Display for ManifestIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnreachableRoute { route } => {
                write!(f, "{route} is dispatchable but no rank allowlists it")
            }
            Self::MissingView { rank, route } => {
                write!(f, "{rank} allowlists {route} but no view renders it")
            }
            Self::NavNotAllowed { rank, route } => {
                write!(f, "{rank} nav links to {route} outside its allowlist")
            }
            Self::DispatchOnly { route } => write!(f, "drift: {route} only in dispatch table"),
            Self::AllowlistOnly { route } => write!(f, "drift: {route} only in allowlists"),
        }
    }
}

/// Outcome of a validation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Build-failing findings (checks a-c)
    pub errors: Vec<ManifestIssue>,
    /// Drift findings (check d)
    pub warnings: Vec<ManifestIssue>,
}

impl ValidationReport {
    /// True when there are no errors. Warnings do not fail validation.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate `registry` against a dispatch table.
///
/// `nav_exemptions` are overview routes that may appear in navigation
/// without being allowlisted.
pub fn validate(
    registry: &ManifestRegistry,
    table: &[ViewRoute],
    nav_exemptions: &[&str],
) -> ValidationReport {
    let mut report = ValidationReport::default();

    let dispatchable: BTreeSet<&'static str> = table.iter().map(|r| r.path).collect();
    let live: BTreeSet<&'static str> =
        table.iter().filter(|r| r.has_view).map(|r| r.path).collect();
    let allowlisted: BTreeSet<&'static str> = registry.all_allowed().into_iter().collect();

    for &route in &dispatchable {
        if !allowlisted.contains(route) {
            report.errors.push(ManifestIssue::UnreachableRoute { route });
        }
    }

    for manifest in registry.manifests() {
        for &route in manifest.allowed {
            if !live.contains(route) {
                report.errors.push(ManifestIssue::MissingView {
                    rank: manifest.id,
                    route,
                });
            }
        }

        let mut seen = BTreeSet::new();
        for route in manifest.nav_routes() {
            if !seen.insert(route) {
                continue;
            }
            if !registry.is_route_allowed(manifest.id, route) && !nav_exemptions.contains(&route) {
                report.errors.push(ManifestIssue::NavNotAllowed {
                    rank: manifest.id,
                    route,
                });
            }
        }
    }

    for &route in dispatchable.difference(&allowlisted) {
        report.warnings.push(ManifestIssue::DispatchOnly { route });
    }
    for &route in allowlisted.difference(&dispatchable) {
        report.warnings.push(ManifestIssue::AllowlistOnly { route });
    }

    report
}

/// Validate against the built-in dispatch table and overview routes.
pub fn validate_standard(registry: &ManifestRegistry) -> ValidationReport {
    let exemptions: Vec<&str> = OVERVIEW_REDIRECTS.iter().map(|(from, _)| *from).collect();
    validate(registry, DISPATCH_TABLE, &exemptions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{NavItem, RouteManifest};
    use crate::manifests::{ADMIRAL, CAPTAIN, COMMODORE};

    static LEAKY_CREW: RouteManifest = RouteManifest {
        id: Rank::Crew,
        home: "/dashboard",
        allowed: &["/dashboard", "/crm/ghost"],
        nav: &[
            NavItem::leaf("/dashboard", "Dashboard", "gauge"),
            NavItem::leaf("/finance/payroll", "Payroll", "banknote"),
        ],
    };

    #[test]
    fn standard_manifests_are_clean() {
        let registry = ManifestRegistry::standard().unwrap();
        let report = validate_standard(&registry);
        assert!(report.is_ok(), "{:?}", report.errors);
        assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    }

    #[test]
    fn overview_routes_need_exemption() {
        let registry = ManifestRegistry::standard().unwrap();
        let report = validate(&registry, DISPATCH_TABLE, &[]);
        assert!(report
            .errors
            .contains(&ManifestIssue::NavNotAllowed { rank: Rank::Crew, route: "/crm" }));
    }

    #[test]
    fn reports_each_class_of_problem() {
        let registry =
            ManifestRegistry::from_manifests(&[&LEAKY_CREW, &CAPTAIN, &COMMODORE, &ADMIRAL])
                .unwrap();
        let table = [
            ViewRoute { path: "/dashboard", has_view: true },
            ViewRoute { path: "/orphan", has_view: true },
        ];
        let report = validate(&registry, &table, &[]);

        assert!(!report.is_ok());
        assert!(report.errors.contains(&ManifestIssue::UnreachableRoute { route: "/orphan" }));
        assert!(report
            .errors
            .contains(&ManifestIssue::MissingView { rank: Rank::Crew, route: "/crm/ghost" }));
        assert!(report.errors.contains(&ManifestIssue::NavNotAllowed {
            rank: Rank::Crew,
            route: "/finance/payroll"
        }));
        assert!(report.warnings.contains(&ManifestIssue::DispatchOnly { route: "/orphan" }));
        assert!(report.warnings.contains(&ManifestIssue::AllowlistOnly { route: "/crm/ghost" }));
    }

    #[test]
    fn issues_render_readably() {
        let issue = ManifestIssue::MissingView { rank: Rank::Captain, route: "/x" };
        assert_eq!(issue.to_string(), "captain allowlists /x but no view renders it");
    }
}
