//! Site-wide configuration documents. Each collection may hold several
//! documents, but at most one is active.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{default_true, Validate};
use crate::error::{ApiError, ApiResult};
use crate::store::{Document, Exclusive};

pub trait SiteConfig: Exclusive + Validate + Clone {
    /// Capitalized noun for messages, e.g. "Live chat settings".
    const LABEL: &'static str;
    const NOUN: &'static str;
    const NOUNS: &'static str;
    const KEY: &'static str;
    const KEYS: &'static str;
    /// Default active document as a JSON object.
    const SEED: &'static str;

    fn created_at(&self) -> DateTime<Utc>;
}

macro_rules! exclusive_by_is_active {
    ($ty:ty, $collection:literal) => {
        impl Document for $ty {
            const COLLECTION: &'static str = $collection;
            fn id(&self) -> &str {
                &self.id
            }
        }

        impl Exclusive for $ty {
            fn is_selected(&self) -> bool {
                self.is_active
            }
            fn set_selected(&mut self, selected: bool) {
                self.is_active = selected;
            }
        }
    };
}

// ── Global settings ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GlobalSettings {
    #[serde(rename = "_id")]
    pub id: String,
    pub site_logo: String,
    pub favicon: String,
    pub site_name: String,
    pub tagline: String,
    pub contact_email: String,
    pub support_email: String,
    pub whatsapp_number: String,
    pub business_address: String,
    pub calendly_link: String,
    pub dashboard_url: String,
    pub case_studies_external_url: String,
    pub default_meta_title: String,
    pub default_meta_description: String,
    pub google_analytics_id: String,
    pub admin_email: String,
    pub two_factor_auth_enabled: bool,
    pub session_expiry_enabled: bool,
    pub activity_logging_enabled: bool,
    pub brute_force_protection_enabled: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

exclusive_by_is_active!(GlobalSettings, "global_settings");

impl Validate for GlobalSettings {
    fn validate(&self) -> ApiResult<()> {
        if self.site_name.trim().is_empty() {
            return Err(ApiError::validation("Site name is required"));
        }
        Ok(())
    }
}

impl SiteConfig for GlobalSettings {
    const LABEL: &'static str = "Global settings";
    const NOUN: &'static str = "global settings";
    const NOUNS: &'static str = "global settings";
    const KEY: &'static str = "settings";
    const KEYS: &'static str = "settings";
    const SEED: &'static str = include_str!("../../seed/global_settings.json");

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

// ── Theme ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorPreset {
    pub name: String,
    pub hue: f64,
    pub color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default = "default_hue")]
    pub active_color_hue: f64,
    #[serde(default)]
    pub dark_mode: bool,
    #[serde(default = "default_font")]
    pub primary_font: String,
    #[serde(default = "default_font")]
    pub heading_font: String,
    #[serde(default = "default_font_size")]
    pub base_font_size: String,
    #[serde(default = "default_radius")]
    pub border_radius: f64,
    #[serde(default)]
    pub color_presets: Vec<ColorPreset>,
    #[serde(default)]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_hue() -> f64 {
    155.0
}

fn default_font() -> String {
    "Inter".into()
}

fn default_font_size() -> String {
    "16px".into()
}

fn default_radius() -> f64 {
    0.625
}

exclusive_by_is_active!(Theme, "themes");

impl Validate for Theme {
    fn validate(&self) -> ApiResult<()> {
        let hue_ok = |h: f64| (0.0..=360.0).contains(&h);
        if !hue_ok(self.active_color_hue) || !self.color_presets.iter().all(|p| hue_ok(p.hue)) {
            return Err(ApiError::validation("Hue must be between 0 and 360"));
        }
        if !self.border_radius.is_finite() || self.border_radius < 0.0 {
            return Err(ApiError::validation("Border radius cannot be negative"));
        }
        Ok(())
    }
}

impl SiteConfig for Theme {
    const LABEL: &'static str = "Theme";
    const NOUN: &'static str = "theme";
    const NOUNS: &'static str = "themes";
    const KEY: &'static str = "theme";
    const KEYS: &'static str = "themes";
    const SEED: &'static str = include_str!("../../seed/theme.json");

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

// ── Navigation ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationLink {
    pub label: String,
    pub href: String,
    #[serde(default = "default_true")]
    pub visible: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FooterLink {
    pub label: String,
    pub href: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FooterSection {
    pub title: String,
    #[serde(default)]
    pub links: Vec<FooterLink>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderCta {
    pub text: String,
    pub href: String,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_when_logged_in: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Navigation {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub header_links: Vec<NavigationLink>,
    pub login_button: HeaderCta,
    pub sign_up_button: HeaderCta,
    pub dashboard_button: HeaderCta,
    #[serde(default)]
    pub footer_sections: Vec<FooterSection>,
    #[serde(default)]
    pub contact_email: String,
    #[serde(default)]
    pub whatsapp_number: String,
    #[serde(default)]
    pub twitter_url: String,
    #[serde(default)]
    pub linked_in_url: String,
    #[serde(default)]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

exclusive_by_is_active!(Navigation, "navigations");

impl Validate for Navigation {}

impl SiteConfig for Navigation {
    const LABEL: &'static str = "Navigation";
    const NOUN: &'static str = "navigation";
    const NOUNS: &'static str = "navigations";
    const KEY: &'static str = "navigation";
    const KEYS: &'static str = "navigations";
    const SEED: &'static str = include_str!("../../seed/navigation.json");

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

// ── Live chat ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayOn {
    #[default]
    All,
    Homepage,
    Dashboard,
    ExcludeDashboard,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveChat {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub widget_script: String,
    #[serde(default)]
    pub display_on: DisplayOn,
    #[serde(default)]
    pub auto_reply_message: String,
    #[serde(default)]
    pub support_email: String,
    #[serde(default)]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

exclusive_by_is_active!(LiveChat, "live_chats");

impl Validate for LiveChat {}

impl SiteConfig for LiveChat {
    const LABEL: &'static str = "Live chat settings";
    const NOUN: &'static str = "live chat settings";
    const NOUNS: &'static str = "live chat settings";
    const KEY: &'static str = "liveChat";
    const KEYS: &'static str = "liveChats";
    const SEED: &'static str = include_str!("../../seed/live_chat.json");

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{build, merge};

    fn seeded<S: SiteConfig>() -> S {
        let raw: serde_json::Value = serde_json::from_str(S::SEED).unwrap();
        build(raw, Utc::now(), &[]).unwrap()
    }

    #[test]
    fn seeds_decode_as_active() {
        assert!(seeded::<GlobalSettings>().is_active);
        assert!(seeded::<Theme>().is_active);
        assert!(seeded::<Navigation>().is_active);
        let chat = seeded::<LiveChat>();
        assert!(chat.is_active);
        assert_eq!(chat.display_on, DisplayOn::All);
    }

    #[test]
    fn theme_rejects_out_of_range_hue() {
        let theme = seeded::<Theme>();
        let err = merge(
            &theme,
            &serde_json::json!({"activeColorHue": 400}),
            Utc::now(),
            &[],
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Hue must be between 0 and 360");
        assert_eq!(theme.color_presets.len(), 6);
    }

    #[test]
    fn live_chat_display_on_is_kebab_case() {
        let chat = seeded::<LiveChat>();
        let patched = merge(
            &chat,
            &serde_json::json!({"displayOn": "exclude-dashboard"}),
            Utc::now(),
            &[],
        )
        .unwrap();
        assert_eq!(patched.display_on, DisplayOn::ExcludeDashboard);
    }
}
