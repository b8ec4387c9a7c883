//! Saving new input: classify it, or fall back to manual entry.
//!
//! ```text
//! Idle ──submit──▶ Submitting ──ok──▶ Classified ──acknowledge/submit──▶ Idle
//!                      │
//!                      └──unavailable/failed──▶ AwaitingManualInput
//!                                                 ├─confirm_manual──▶ Idle
//!                                                 └─cancel──────────▶ Idle
//! ```
//!
//! Classification failures never surface as errors. They are logged and
//! reported in [`SubmitOutcome::NeedsManualEntry`], and the raw input is kept
//! for the manual form.
use std::borrow::Cow;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use crate::classify::{ClassifyError, ClassifyRequest, Classifier, ConnectivityMonitor};
use crate::library::{
    Classification, ContentItem, ItemStore, Platform, DRAFT_SUBCATEGORY, FALLBACK_CATEGORY,
};
use crate::util::is_link;

/// How long a success notification stays visible.
pub const NOTIFICATION_TTL: Duration = Duration::from_secs(3);

const SAVED_MESSAGE: &str = "Library Index Updated";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IngestState {
    #[default]
    Idle,
    /// A classification request is in flight.
    Submitting { input: String },
    /// The last submission was classified and saved.
    Classified { item_id: String },
    /// Waiting for the user to fill in the manual form for `input`.
    AwaitingManualInput { input: String },
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Nothing to save: input is empty")]
    EmptyInput,
    #[error("A manual entry is still pending; confirm or cancel it first")]
    ManualEntryPending,
    #[error("No manual entry is pending")]
    NoManualEntry,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Why a submission went to the manual form instead of being saved.
#[derive(Debug)]
pub enum FallbackReason {
    AutoCategorizeOff,
    ClassifierUnavailable,
    ClassificationFailed(ClassifyError),
}

#[derive(Debug)]
pub enum SubmitOutcome {
    Saved { item_id: String },
    NeedsManualEntry { reason: FallbackReason },
}

/// A transient message with an expiry.
#[derive(Debug, Clone)]
pub struct Notification {
    pub message: Cow<'static, str>,
    created: Instant,
}

impl Notification {
    fn new(message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            message: message.into(),
            created: Instant::now(),
        }
    }

    fn is_expired(&self) -> bool {
        self.created.elapsed() >= NOTIFICATION_TTL
    }
}

// ============================================================================
// Ingestion
// ============================================================================

/// Drives one submission at a time. Both this and the store are borrowed
/// mutably for the whole submission, so overlapping submissions cannot be
/// expressed.
#[derive(Default)]
pub struct Ingestion {
    state: IngestState,
    notification: Option<Notification>,
    monitor: Option<ConnectivityMonitor>,
}

impl Ingestion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report every classification outcome to `monitor`.
    pub fn with_monitor(mut self, monitor: ConnectivityMonitor) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn state(&self) -> &IngestState {
        &self.state
    }

    /// Current notification, unless it has expired.
    pub fn notification(&self) -> Option<&str> {
        self.notification
            .as_ref()
            .filter(|n| !n.is_expired())
            .map(|n| n.message.as_ref())
    }

    /// Drop the notification once it is older than [`NOTIFICATION_TTL`].
    /// Returns true if one was cleared.
    pub fn clear_expired_notification(&mut self) -> bool {
        if self.notification.as_ref().is_some_and(Notification::is_expired) {
            self.notification = None;
            return true;
        }
        false
    }

    /// Submit raw input for saving.
    ///
    /// Blank input is rejected without touching state. A pending manual
    /// entry must be confirmed or cancelled first. A previous `Classified`
    /// result is acknowledged implicitly.
    pub async fn submit(
        &mut self,
        raw: &str,
        store: &mut ItemStore,
        classifier: &Classifier,
    ) -> Result<SubmitOutcome, IngestError> {
        let input = raw.trim();
        if input.is_empty() {
            return Err(IngestError::EmptyInput);
        }
        if matches!(self.state, IngestState::AwaitingManualInput { .. }) {
            return Err(IngestError::ManualEntryPending);
        }
        self.notification = None;

        let settings = store.settings();
        let (auto, model, detail) = (
            settings.auto_categorize,
            settings.selected_model,
            settings.summary_detail,
        );

        if !auto {
            return Ok(self.fall_back(input, FallbackReason::AutoCategorizeOff));
        }
        if !classifier.is_available() {
            return Ok(self.fall_back(input, FallbackReason::ClassifierUnavailable));
        }

        self.state = IngestState::Submitting {
            input: input.to_string(),
        };
        let result = classifier
            .classify(&ClassifyRequest {
                text: input,
                model,
                detail,
            })
            .await;
        if let Some(monitor) = &self.monitor {
            monitor.record(&result);
        }

        match result {
            Ok(meta) => {
                let item_id = match self.save(ContentItem::new(input, meta), store).await {
                    Ok(id) => id,
                    Err(e) => {
                        self.state = IngestState::Idle;
                        return Err(e);
                    }
                };
                self.state = IngestState::Classified {
                    item_id: item_id.clone(),
                };
                Ok(SubmitOutcome::Saved { item_id })
            }
            Err(e) => {
                tracing::warn!(error = %e, "Classification failed, falling back to manual entry");
                Ok(self.fall_back(input, FallbackReason::ClassificationFailed(e)))
            }
        }
    }

    fn fall_back(&mut self, input: &str, reason: FallbackReason) -> SubmitOutcome {
        tracing::debug!(?reason, "Awaiting manual entry");
        self.state = IngestState::AwaitingManualInput {
            input: input.to_string(),
        };
        SubmitOutcome::NeedsManualEntry { reason }
    }

    async fn save(&mut self, item: ContentItem, store: &mut ItemStore) -> Result<String, IngestError> {
        let id = store.add(item).await?.id.clone();
        self.notification = Some(Notification::new(SAVED_MESSAGE));
        Ok(id)
    }

    /// Pre-filled manual form for the pending input, if any.
    ///
    /// Links leave the title blank and get a platform guessed from the host;
    /// free text becomes the title. Three empty key-point slots are provided.
    pub fn manual_draft(&self) -> Option<Classification> {
        let IngestState::AwaitingManualInput { input } = &self.state else {
            return None;
        };
        let link = is_link(input);
        Some(Classification {
            title: if link { String::new() } else { input.clone() },
            platform: Platform::detect(input),
            category: FALLBACK_CATEGORY.to_string(),
            subcategory: DRAFT_SUBCATEGORY.to_string(),
            ai_insight: String::new(),
            key_points: vec![String::new(); 3],
        })
    }

    /// Save the manually entered metadata for the pending input.
    ///
    /// Key points that are blank after trimming are dropped. If the store
    /// cannot persist the item the entry stays pending, so it can be retried.
    pub async fn confirm_manual(
        &mut self,
        mut entry: Classification,
        store: &mut ItemStore,
    ) -> Result<String, IngestError> {
        let IngestState::AwaitingManualInput { input } = &self.state else {
            return Err(IngestError::NoManualEntry);
        };
        let input = input.clone();

        entry.key_points.retain(|p| !p.trim().is_empty());
        let item_id = self.save(ContentItem::new(input, entry), store).await?;
        self.state = IngestState::Idle;
        Ok(item_id)
    }

    /// Discard whatever is pending and return to idle.
    pub fn cancel(&mut self) {
        if let IngestState::AwaitingManualInput { input } = &self.state {
            tracing::debug!(input = %input, "Manual entry cancelled");
        }
        self.state = IngestState::Idle;
    }

    /// Leave `Classified`. No-op in any other state.
    pub fn acknowledge(&mut self) {
        if matches!(self.state, IngestState::Classified { .. }) {
            self.state = IngestState::Idle;
        }
    }
}
