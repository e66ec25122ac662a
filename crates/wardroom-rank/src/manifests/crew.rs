use crate::manifest::{NavItem, RouteManifest};
use crate::rank::Rank;

pub static CREW: RouteManifest = RouteManifest {
    id: Rank::Crew,
    home: "/dashboard",
    allowed: &[
        "/dashboard",
        "/crm/contacts",
        "/crm/companies",
        "/email/inbox",
        "/email/sent",
        "/email/drafts",
        "/settings/profile",
        "/settings/appearance",
        "/settings/notifications",
    ],
    nav: &[
        NavItem::leaf("/dashboard", "Dashboard", "gauge"),
        NavItem {
            route: "/crm",
            label: "CRM",
            icon: "users",
            children: &[
                NavItem::leaf("/crm/contacts", "Contacts", "contact"),
                NavItem::leaf("/crm/companies", "Companies", "building"),
            ],
        },
        NavItem {
            route: "/email",
            label: "Email",
            icon: "mail",
            children: &[
                NavItem::leaf("/email/inbox", "Inbox", "inbox"),
                NavItem::leaf("/email/sent", "Sent", "send"),
                NavItem::leaf("/email/drafts", "Drafts", "file-pen"),
            ],
        },
        NavItem {
            route: "/settings",
            label: "Settings",
            icon: "cog",
            children: &[
                NavItem::leaf("/settings/profile", "Profile", "user"),
                NavItem::leaf("/settings/appearance", "Appearance", "palette"),
                NavItem::leaf("/settings/notifications", "Notifications", "bell"),
            ],
        },
    ],
};
