//! The item store and everything it persists.
mod item;
mod settings;
mod store;
pub mod transfer;

pub use item::{
    Classification, ContentItem, Platform, ToggleField, CATEGORIES, DRAFT_SUBCATEGORY,
    FALLBACK_CATEGORY,
};
pub use settings::{Model, Settings, SettingsPatch, SummaryDetail, Theme};
pub use store::{ItemStore, ITEMS_KEY, SETTINGS_KEY};
pub use transfer::{ImportError, ImportReport, RejectedRecord};
