use crate::manifest::{NavItem, RouteManifest};
use crate::rank::Rank;

pub static COMMODORE: RouteManifest = RouteManifest {
    id: Rank::Commodore,
    home: "/dashboard",
    allowed: &[
        "/dashboard",
        "/crm/contacts",
        "/crm/companies",
        "/crm/pipeline",
        "/crm/deals",
        "/finance/invoices",
        "/finance/expenses",
        "/finance/reports",
        "/finance/payroll",
        "/email/inbox",
        "/email/sent",
        "/email/drafts",
        "/email/campaigns",
        "/settings/profile",
        "/settings/appearance",
        "/settings/notifications",
        "/settings/team",
        "/settings/integrations",
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
                NavItem::leaf("/crm/pipeline", "Pipeline", "kanban"),
                NavItem::leaf("/crm/deals", "Deals", "handshake"),
            ],
        },
        NavItem {
            route: "/finance",
            label: "Finance",
            icon: "wallet",
            children: &[
                NavItem::leaf("/finance/invoices", "Invoices", "receipt"),
                NavItem::leaf("/finance/expenses", "Expenses", "credit-card"),
                NavItem::leaf("/finance/reports", "Reports", "chart"),
                NavItem::leaf("/finance/payroll", "Payroll", "banknote"),
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
                NavItem::leaf("/email/campaigns", "Campaigns", "megaphone"),
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
                NavItem::leaf("/settings/team", "Team", "users-round"),
                NavItem::leaf("/settings/integrations", "Integrations", "plug"),
            ],
        },
    ],
};
