//! User-facing settings persisted next to the item collection.
//!
//! Every field falls back to its default independently: a stored object with
//! one missing or unrecognized value keeps the rest.
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Color theme. Stored for the presentation layer; nothing here renders it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

impl From<String> for Theme {
    fn from(s: String) -> Self {
        match s.as_str() {
            "dark" => Theme::Dark,
            _ => Theme::Light,
        }
    }
}

impl From<Theme> for &'static str {
    fn from(t: Theme) -> Self {
        t.as_str()
    }
}

/// Which classification model tier to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum Model {
    /// Low-latency tier.
    #[default]
    Fast,
    /// Higher-quality, slower tier.
    Pro,
}

impl Model {
    /// Provider model identifier sent on the wire and stored in settings.
    pub fn id(self) -> &'static str {
        match self {
            Model::Fast => "gemini-3-flash-preview",
            Model::Pro => "gemini-3-pro-preview",
        }
    }
}

impl From<String> for Model {
    fn from(s: String) -> Self {
        match s.as_str() {
            "gemini-3-pro-preview" | "pro" => Model::Pro,
            _ => Model::Fast,
        }
    }
}

impl From<Model> for &'static str {
    fn from(m: Model) -> Self {
        m.id()
    }
}

/// How much the classifier should write in the summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum SummaryDetail {
    #[default]
    Concise,
    Detailed,
}

impl SummaryDetail {
    pub fn as_str(self) -> &'static str {
        match self {
            SummaryDetail::Concise => "concise",
            SummaryDetail::Detailed => "detailed",
        }
    }
}

impl From<String> for SummaryDetail {
    fn from(s: String) -> Self {
        match s.as_str() {
            "detailed" => SummaryDetail::Detailed,
            _ => SummaryDetail::Concise,
        }
    }
}

impl From<SummaryDetail> for &'static str {
    fn from(d: SummaryDetail) -> Self {
        d.as_str()
    }
}

macro_rules! display_via_str {
    ($($ty:ty => $f:ident),* $(,)?) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.$f())
            }
        })*
    };
}

display_via_str!(Theme => as_str, Model => id, SummaryDetail => as_str);

// ============================================================================
// Settings
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    #[serde(deserialize_with = "or_default")]
    pub theme: Theme,
    #[serde(deserialize_with = "auto_categorize_or_default")]
    pub auto_categorize: bool,
    #[serde(deserialize_with = "or_default")]
    pub selected_model: Model,
    #[serde(deserialize_with = "or_default")]
    pub summary_detail: SummaryDetail,
}

// A null or wrongly typed field costs only that field.
fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_default())
}

fn auto_categorize_or_default<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_bool().unwrap_or(true))
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            auto_categorize: true,
            selected_model: Model::Fast,
            summary_detail: SummaryDetail::Concise,
        }
    }
}

/// A partial update; `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsPatch {
    pub theme: Option<Theme>,
    pub auto_categorize: Option<bool>,
    pub selected_model: Option<Model>,
    pub summary_detail: Option<SummaryDetail>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

impl Settings {
    /// Merge a patch into these settings.
    pub fn apply(&mut self, patch: &SettingsPatch) {
        if let Some(theme) = patch.theme {
            self.theme = theme;
        }
        if let Some(auto) = patch.auto_categorize {
            self.auto_categorize = auto;
        }
        if let Some(model) = patch.selected_model {
            self.selected_model = model;
        }
        if let Some(detail) = patch.summary_detail {
            self.summary_detail = detail;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.theme, Theme::Light);
        assert!(s.auto_categorize);
        assert_eq!(s.selected_model, Model::Fast);
        assert_eq!(s.summary_detail, SummaryDetail::Concise);
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(Settings::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "theme": "light",
                "autoCategorize": true,
                "selectedModel": "gemini-3-flash-preview",
                "summaryDetail": "concise"
            })
        );
    }

    #[test]
    fn test_partial_object_keeps_other_defaults() {
        let s: Settings = serde_json::from_str(r#"{"theme":"dark"}"#).unwrap();
        assert_eq!(s.theme, Theme::Dark);
        assert!(s.auto_categorize);
        assert_eq!(s.selected_model, Model::Fast);
    }

    #[test]
    fn test_unknown_values_fall_back_per_field() {
        let s: Settings = serde_json::from_str(
            r#"{"theme":"solarized","autoCategorize":false,"selectedModel":"gemini-3-pro-preview","summaryDetail":"verbose"}"#,
        )
        .unwrap();
        assert_eq!(s.theme, Theme::Light);
        assert!(!s.auto_categorize);
        assert_eq!(s.selected_model, Model::Pro);
        assert_eq!(s.summary_detail, SummaryDetail::Concise);
    }

    #[test]
    fn test_apply_patch() {
        let mut s = Settings::default();
        s.apply(&SettingsPatch {
            auto_categorize: Some(false),
            summary_detail: Some(SummaryDetail::Detailed),
            ..Default::default()
        });
        assert_eq!(s.theme, Theme::Light);
        assert!(!s.auto_categorize);
        assert_eq!(s.summary_detail, SummaryDetail::Detailed);
    }

    #[test]
    fn test_empty_patch() {
        assert!(SettingsPatch::default().is_empty());
        assert!(!SettingsPatch {
            theme: Some(Theme::Dark),
            ..Default::default()
        }
        .is_empty());
    }

    #[test]
    fn test_null_and_wrong_types_fall_back_per_field() {
        let s: Settings = serde_json::from_str(
            r#"{"theme":null,"autoCategorize":false,"selectedModel":7,"summaryDetail":"detailed"}"#,
        )
        .unwrap();
        assert_eq!(s.theme, Theme::Light);
        assert!(!s.auto_categorize);
        assert_eq!(s.selected_model, Model::Fast);
        assert_eq!(s.summary_detail, SummaryDetail::Detailed);

        let s: Settings = serde_json::from_str(r#"{"theme":"dark","autoCategorize":"no"}"#).unwrap();
        assert_eq!(s.theme, Theme::Dark);
        assert!(s.auto_categorize);
    }
}
