//! Profile fields cached in the session credential.

use serde::{Deserialize, Serialize};

/// Color scheme preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    #[default]
    System,
    Light,
    Dark,
}

impl ThemeMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            ThemeMode::System => "system",
            ThemeMode::Light => "light",
            ThemeMode::Dark => "dark",
        }
    }
}

/// Theme settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemePreference {
    pub mode: ThemeMode,
    pub high_contrast: bool,
    pub accent: Option<String>,
}

impl ThemePreference {
    /// Compact hint for downstream rendering, e.g. `dark` or `light; contrast=high`.
    pub fn hint(&self) -> String {
        if self.high_contrast {
            format!("{}; contrast=high", self.mode.as_str())
        } else {
            self.mode.as_str().to_string()
        }
    }
}

/// Feature preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturePreferences {
    pub compact_tables: bool,
    pub email_signature_enabled: bool,
    pub inbox_page_size: u32,
}

impl Default for FeaturePreferences {
    fn default() -> Self {
        Self {
            compact_tables: false,
            email_signature_enabled: true,
            inbox_page_size: 50,
        }
    }
}

/// Profile fields owned by the data layer and cached in the session.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Profile {
    pub name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub theme: ThemePreference,
    #[serde(default)]
    pub preferences: FeaturePreferences,
}

/// Partial profile update. Absent fields are left unchanged.
///
/// Email is owned by the identity provider and cannot be changed here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub theme: Option<ThemePreference>,
    pub preferences: Option<FeaturePreferences>,
}

impl Profile {
    /// Apply a partial update in place.
    pub fn apply(&mut self, update: ProfileUpdate) {
        if let Some(name) = update.name {
            self.name = Some(name);
        }
        if let Some(avatar_url) = update.avatar_url {
            self.avatar_url = Some(avatar_url);
        }
        if let Some(theme) = update.theme {
            self.theme = theme;
        }
        if let Some(preferences) = update.preferences {
            self.preferences = preferences;
        }
    }
}
