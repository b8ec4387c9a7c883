use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use super::item::{ContentItem, ToggleField};
use super::settings::{Settings, SettingsPatch};
use super::transfer::validate_records;
use crate::storage::Database;

/// Key holding the JSON array of items.
pub const ITEMS_KEY: &str = "memoria-v1-items";
/// Key holding the JSON settings object.
pub const SETTINGS_KEY: &str = "memoria-v1-settings";

// ============================================================================
// ItemStore
// ============================================================================

/// The canonical, ordered item collection plus settings.
///
/// Items are kept most-recent-first. Every mutating method writes the whole
/// collection and the whole settings object back to the database before it
/// returns; there is no batching. Reads are plain slices over memory.
pub struct ItemStore {
    db: Database,
    items: Vec<ContentItem>,
    settings: Settings,
}

impl ItemStore {
    /// Load items and settings from the database.
    ///
    /// Missing keys and malformed JSON both fall back (empty items, default
    /// settings) with a warning; only database failures are errors.
    pub async fn load(db: Database) -> Result<Self> {
        let items = match db.get(ITEMS_KEY).await? {
            Some(raw) => match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Array(records)) => {
                    // One damaged record must not cost the rest of the library.
                    let report = validate_records(records);
                    for rejected in &report.rejected {
                        tracing::warn!(
                            index = rejected.index,
                            reason = %rejected.reason,
                            "Dropping malformed stored item"
                        );
                    }
                    report.accepted
                }
                Ok(_) => {
                    tracing::warn!("Stored items are not an array, starting empty");
                    Vec::new()
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Stored items are malformed, starting empty");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let settings = match db.get(SETTINGS_KEY).await? {
            Some(raw) => serde_json::from_str::<Settings>(&raw).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Stored settings are malformed, using defaults");
                Settings::default()
            }),
            None => Settings::default(),
        };

        tracing::debug!(items = items.len(), "Loaded library");
        Ok(Self {
            db,
            items,
            settings,
        })
    }

    pub fn items(&self) -> &[ContentItem] {
        &self.items
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn get(&self, id: &str) -> Option<&ContentItem> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Insert at the head of the collection.
    ///
    /// An empty `id` gets a fresh UUID; a non-positive `timestamp` gets the
    /// current time, bumped past the newest item so creation order and
    /// timestamp order never disagree. If persisting fails the item is not
    /// kept in memory either.
    pub async fn add(&mut self, mut item: ContentItem) -> Result<&ContentItem> {
        if item.id.is_empty() {
            item.id = Uuid::new_v4().to_string();
        }
        if item.timestamp <= 0 {
            let newest = self.items.iter().map(|i| i.timestamp).max().unwrap_or(0);
            item.timestamp = Utc::now().timestamp_millis().max(newest.saturating_add(1));
        }

        tracing::info!(id = %item.id, title = %item.title, "Adding item");
        self.items.insert(0, item);
        if let Err(e) = self.persist().await {
            // Memory must not hold an item the database never saw
            self.items.remove(0);
            return Err(e);
        }
        Ok(&self.items[0])
    }

    /// Flip a flag on the item with `id`.
    ///
    /// Returns the new value, or `None` (and writes nothing) when no item has
    /// that id.
    pub async fn toggle(&mut self, id: &str, field: ToggleField) -> Result<Option<bool>> {
        let Some(item) = self.items.iter_mut().find(|i| i.id == id) else {
            tracing::debug!(id = %id, %field, "Toggle on unknown item ignored");
            return Ok(None);
        };

        let value = item.toggle(field);
        tracing::debug!(id = %id, %field, value, "Toggled item flag");
        self.persist().await?;
        Ok(Some(value))
    }

    /// Delete the item with `id`. Returns whether anything was removed.
    ///
    /// Asking the user for confirmation is the caller's job.
    pub async fn remove(&mut self, id: &str) -> Result<bool> {
        let before = self.items.len();
        self.items.retain(|i| i.id != id);
        if self.items.len() == before {
            return Ok(false);
        }

        tracing::info!(id = %id, "Removed item");
        self.persist().await?;
        Ok(true)
    }

    /// Replace the entire collection (import). No merging, no de-duplication.
    pub async fn replace_all(&mut self, items: Vec<ContentItem>) -> Result<()> {
        tracing::info!(
            previous = self.items.len(),
            incoming = items.len(),
            "Replacing library contents"
        );
        self.items = items;
        self.persist().await
    }

    pub async fn update_settings(&mut self, patch: &SettingsPatch) -> Result<&Settings> {
        self.settings.apply(patch);
        self.persist().await?;
        Ok(&self.settings)
    }

    /// Drop every item and wipe the backing store, then write back the empty
    /// collection with the current settings.
    pub async fn purge(&mut self) -> Result<()> {
        self.items.clear();
        self.db
            .clear()
            .await
            .context("Failed to clear the key-value store")?;
        tracing::warn!("Library purged");
        self.persist().await
    }

    async fn persist(&self) -> Result<()> {
        let items = serde_json::to_string(&self.items).context("Failed to serialize items")?;
        let settings =
            serde_json::to_string(&self.settings).context("Failed to serialize settings")?;
        self.db
            .set_many(&[(ITEMS_KEY, items.as_str()), (SETTINGS_KEY, settings.as_str())])
            .await
            .context("Failed to persist library")
    }
}
