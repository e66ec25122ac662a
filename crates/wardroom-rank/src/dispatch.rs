//! The client router's dispatch table.
//!
//! Mirrors the view switch of the single-page app: every path it can render
//! and whether a live view component backs it. Overview routes (nav parents)
//! never render; they redirect to their first child.

/// A path the client router can dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewRoute {
    /// Exact route path
    pub path: &'static str,

    /// Whether a live view component renders this path
    pub has_view: bool,
}

const fn view(path: &'static str) -> ViewRoute {
    ViewRoute { path, has_view: true }
}

/// Every dispatchable route.
pub const DISPATCH_TABLE: &[ViewRoute] = &[
    view("/dashboard"),
    view("/crm/contacts"),
    view("/crm/companies"),
    view("/crm/pipeline"),
    view("/crm/deals"),
    view("/finance/invoices"),
    view("/finance/expenses"),
    view("/finance/reports"),
    view("/finance/payroll"),
    view("/email/inbox"),
    view("/email/sent"),
    view("/email/drafts"),
    view("/email/campaigns"),
    view("/settings/profile"),
    view("/settings/appearance"),
    view("/settings/notifications"),
    view("/settings/team"),
    view("/settings/integrations"),
    view("/settings/organization"),
    view("/settings/billing"),
    view("/admin/users"),
    view("/admin/invitations"),
    view("/admin/audit"),
];

/// Overview routes and where they redirect.
pub const OVERVIEW_REDIRECTS: &[(&str, &str)] = &[
    ("/crm", "/crm/contacts"),
    ("/email", "/email/inbox"),
    ("/finance", "/finance/invoices"),
    ("/settings", "/settings/profile"),
    ("/admin", "/admin/users"),
];

/// Redirect target if `path` is an overview route.
pub fn overview_target(path: &str) -> Option<&'static str> {
    OVERVIEW_REDIRECTS
        .iter()
        .find(|(from, _)| *from == path)
        .map(|(_, to)| *to)
}

/// True if the router has a live view for `path`.
pub fn is_dispatchable(path: &str) -> bool {
    DISPATCH_TABLE.iter().any(|r| r.path == path && r.has_view)
}
