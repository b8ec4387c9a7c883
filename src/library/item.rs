use serde::{Deserialize, Serialize};
use std::fmt;

use crate::util::link_host;

// ============================================================================
// Platform
// ============================================================================

/// Where a saved item lives.
///
/// Serialized with the display names used in backups (`"Web/Blogs"`). Any
/// unrecognized string, whether from the model or an old backup, becomes
/// `Other` instead of failing the whole record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum Platform {
    YouTube,
    Instagram,
    Reddit,
    WebBlogs,
    #[default]
    Other,
}

impl Platform {
    pub const ALL: [Platform; 5] = [
        Platform::YouTube,
        Platform::Instagram,
        Platform::Reddit,
        Platform::WebBlogs,
        Platform::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::YouTube => "YouTube",
            Platform::Instagram => "Instagram",
            Platform::Reddit => "Reddit",
            Platform::WebBlogs => "Web/Blogs",
            Platform::Other => "Other",
        }
    }

    /// Case-insensitive parse that never fails.
    pub fn parse_lenient(s: &str) -> Self {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .unwrap_or(Platform::Other)
    }

    /// Guess the platform from a link's host. Free text is `Other`.
    pub fn detect(input: &str) -> Self {
        let Some(host) = link_host(input) else {
            return Platform::Other;
        };
        let on = |domain: &str| host == domain || host.ends_with(&format!(".{domain}"));
        if on("youtube.com") || on("youtu.be") {
            Platform::YouTube
        } else if on("instagram.com") {
            Platform::Instagram
        } else if on("reddit.com") {
            Platform::Reddit
        } else {
            Platform::Other
        }
    }
}

impl From<String> for Platform {
    fn from(s: String) -> Self {
        Platform::parse_lenient(&s)
    }
}

impl From<Platform> for &'static str {
    fn from(p: Platform) -> Self {
        p.as_str()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Primary categories offered to the classifier and the manual form.
/// Items may still carry any other string.
pub const CATEGORIES: &[&str] = &[
    "Learning",
    "Career",
    "Mental Health",
    "Fitness",
    "Tech",
    "Entertainment",
    "Others",
];

/// Category used for manual entries when the user picks nothing else.
pub const FALLBACK_CATEGORY: &str = "Others";
/// Subcategory pre-filled on manual entries.
pub const DRAFT_SUBCATEGORY: &str = "Draft";

// ============================================================================
// Content Item
// ============================================================================

/// One saved piece of content plus its classification metadata.
///
/// Field names follow the backup format (`aiInsight`, `isFavorite`, ...).
/// Everything except `id` has a serde default so that partially-formed
/// imported records still load; `category` and `subcategory` stay `None`
/// when absent, which the views treat as their own "unset" bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: String,
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub platform: Platform,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub subcategory: Option<String>,
    #[serde(default)]
    pub ai_insight: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub watched: bool,
    /// Creation time, Unix milliseconds.
    #[serde(default)]
    pub timestamp: i64,
}

/// Metadata describing an input, from the classifier or the manual form.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub title: String,
    #[serde(default)]
    pub platform: Platform,
    pub category: String,
    pub subcategory: String,
    pub ai_insight: String,
    #[serde(default)]
    pub key_points: Vec<String>,
}

impl ContentItem {
    /// Build an unsaved item. `id` and `timestamp` are left unassigned; the
    /// store fills them in on `add`.
    pub fn new(input: impl Into<String>, meta: Classification) -> Self {
        let non_empty = |s: String| if s.is_empty() { None } else { Some(s) };
        Self {
            id: String::new(),
            input: input.into(),
            title: meta.title,
            platform: meta.platform,
            category: non_empty(meta.category),
            subcategory: non_empty(meta.subcategory),
            ai_insight: meta.ai_insight,
            key_points: meta.key_points,
            is_favorite: false,
            is_archived: false,
            watched: false,
            timestamp: 0,
        }
    }

    pub fn flag(&self, field: ToggleField) -> bool {
        match field {
            ToggleField::Favorite => self.is_favorite,
            ToggleField::Archived => self.is_archived,
            ToggleField::Watched => self.watched,
        }
    }

    fn flag_mut(&mut self, field: ToggleField) -> &mut bool {
        match field {
            ToggleField::Favorite => &mut self.is_favorite,
            ToggleField::Archived => &mut self.is_archived,
            ToggleField::Watched => &mut self.watched,
        }
    }

    /// Flip one boolean and return its new value.
    pub fn toggle(&mut self, field: ToggleField) -> bool {
        let flag = self.flag_mut(field);
        *flag = !*flag;
        *flag
    }
}

/// The independent boolean flags an item carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToggleField {
    Favorite,
    Archived,
    Watched,
}

impl fmt::Display for ToggleField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ToggleField::Favorite => "favorite",
            ToggleField::Archived => "archived",
            ToggleField::Watched => "watched",
        })
    }
}
