//! Backup export and import.
//!
//! Exports are the item collection as pretty-printed JSON, named after the
//! current date. Imports accept the same format (and the original web app's
//! backups, which share field names). Every record is validated on its own:
//! good records are kept, bad ones are reported, and the caller replaces the
//! whole library with the accepted set.
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::item::ContentItem;
use crate::util::atomic_write;

/// Largest backup file accepted for import (10 MiB).
pub const MAX_IMPORT_SIZE: u64 = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Failed to parse file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid backup format: expected a JSON array of items, found {0}")]
    Format(&'static str),

    #[error("Failed to read backup file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Backup file too large: {0} bytes (max {max} bytes)", max = MAX_IMPORT_SIZE)]
    TooLarge(u64),

    #[error("Backup path is not a regular file")]
    NotAFile,

    #[error("No valid items in backup: all {0} records were rejected")]
    NoValidRecords(usize),
}

/// A record that could not be imported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRecord {
    /// Position in the imported array.
    pub index: usize,
    pub reason: String,
}

/// Outcome of validating a backup document.
#[derive(Debug, Default)]
pub struct ImportReport {
    pub accepted: Vec<ContentItem>,
    pub rejected: Vec<RejectedRecord>,
}

// ============================================================================
// Export
// ============================================================================

/// Serialize items as a pretty-printed JSON array.
pub fn export_json(items: &[ContentItem]) -> Result<String> {
    serde_json::to_string_pretty(items).context("Failed to serialize items for export")
}

/// `memoria-backup-YYYY-MM-DD.json`
pub fn backup_file_name(date: NaiveDate) -> String {
    format!("memoria-backup-{}.json", date.format("%Y-%m-%d"))
}

/// Write a dated backup into `dir`, replacing any backup from the same day.
pub fn write_backup(dir: &Path, items: &[ContentItem], date: NaiveDate) -> Result<PathBuf> {
    let path = dir.join(backup_file_name(date));
    let json = export_json(items)?;
    atomic_write(&path, json.as_bytes())
        .with_context(|| format!("Failed to write backup to '{}'", path.display()))?;
    tracing::info!(path = %path.display(), items = items.len(), "Exported backup");
    Ok(path)
}

// ============================================================================
// Import
// ============================================================================

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Validate one record: it must be an object with a non-empty string `id`
/// whose other fields, where present, have the right types.
fn validate_record(value: Value) -> Result<ContentItem, String> {
    let Value::Object(map) = &value else {
        return Err(format!("expected an object, found {}", json_kind(&value)));
    };
    match map.get("id") {
        Some(Value::String(id)) if !id.trim().is_empty() => {}
        Some(Value::String(_)) => return Err("empty id".to_string()),
        Some(other) => return Err(format!("id must be a string, found {}", json_kind(other))),
        None => return Err("missing id".to_string()),
    }
    serde_json::from_value::<ContentItem>(value).map_err(|e| e.to_string())
}

/// Split a list of raw JSON records into accepted items and rejections.
pub fn validate_records(records: Vec<Value>) -> ImportReport {
    let mut report = ImportReport::default();
    for (index, record) in records.into_iter().enumerate() {
        match validate_record(record) {
            Ok(item) => report.accepted.push(item),
            Err(reason) => report.rejected.push(RejectedRecord { index, reason }),
        }
    }
    report
}

/// Parse and validate a backup document.
///
/// Fails with `ImportError::Parse` when the text is not JSON,
/// `ImportError::Format` when the top level is not an array, and
/// `ImportError::NoValidRecords` when a non-empty array has nothing usable.
/// In every error case nothing should be changed by the caller. An empty
/// array is a valid (empty) backup.
pub fn parse_import(text: &str) -> Result<ImportReport, ImportError> {
    let records = match serde_json::from_str::<Value>(text)? {
        Value::Array(records) => records,
        other => return Err(ImportError::Format(json_kind(&other))),
    };

    let report = validate_records(records);
    for rejected in &report.rejected {
        tracing::warn!(
            index = rejected.index,
            reason = %rejected.reason,
            "Skipping invalid backup record"
        );
    }
    if report.accepted.is_empty() && !report.rejected.is_empty() {
        return Err(ImportError::NoValidRecords(report.rejected.len()));
    }
    Ok(report)
}

/// Read a backup file from disk, refusing anything that is not a regular file
/// or exceeds [`MAX_IMPORT_SIZE`].
pub fn read_import_file(path: &Path) -> Result<String, ImportError> {
    let meta = std::fs::metadata(path)?;
    if !meta.is_file() {
        return Err(ImportError::NotAFile);
    }
    if meta.len() > MAX_IMPORT_SIZE {
        return Err(ImportError::TooLarge(meta.len()));
    }
    Ok(std::fs::read_to_string(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::item::{Classification, Platform};
    use pretty_assertions::assert_eq;

    fn sample(id: &str) -> ContentItem {
        let mut item = ContentItem::new(
            "https://youtu.be/xyz",
            Classification {
                title: "Demo".into(),
                platform: Platform::YouTube,
                category: "Tech".into(),
                subcategory: "Review".into(),
                ai_insight: "A demo video.".into(),
                key_points: vec!["a".into(), "b".into()],
            },
        );
        item.id = id.into();
        item.timestamp = 1_700_000_000_000;
        item
    }

    #[test]
    fn test_backup_file_name() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(backup_file_name(date), "memoria-backup-2024-03-09.json");
    }

    #[test]
    fn test_export_is_pretty_array() {
        let json = export_json(&[sample("a")]).unwrap();
        assert!(json.starts_with("[\n  {"));
        assert!(json.contains("\"aiInsight\": \"A demo video.\""));
    }

    #[test]
    fn test_export_then_import_keeps_items() {
        let items = vec![sample("a"), sample("b")];
        let report = parse_import(&export_json(&items).unwrap()).unwrap();
        assert_eq!(report.accepted, items);
        assert!(report.rejected.is_empty());
    }

    #[test]
    fn test_object_top_level_is_format_error() {
        assert!(matches!(
            parse_import("{}"),
            Err(ImportError::Format("an object"))
        ));
    }

    #[test]
    fn test_not_json_is_parse_error() {
        let err = parse_import("not json at all").unwrap_err();
        assert!(matches!(err, ImportError::Parse(_)));
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn test_empty_array_is_valid() {
        let report = parse_import("[]").unwrap();
        assert!(report.accepted.is_empty());
        assert!(report.rejected.is_empty());
    }

    #[test]
    fn test_bad_records_rejected_individually() {
        let text = r#"[
            {"id": "ok", "title": "Fine"},
            42,
            {"title": "no id"},
            {"id": ""},
            {"id": 7},
            {"id": "bad-flag", "isFavorite": "yes"}
        ]"#;
        let report = parse_import(text).unwrap();

        assert_eq!(report.accepted.len(), 1);
        assert_eq!(report.accepted[0].id, "ok");
        let indices: Vec<usize> = report.rejected.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4, 5]);
        assert_eq!(report.rejected[0].reason, "expected an object, found a number");
        assert_eq!(report.rejected[1].reason, "missing id");
    }

    #[test]
    fn test_all_records_rejected_is_an_error() {
        let err = parse_import(r#"[42, "x"]"#).unwrap_err();
        assert!(matches!(err, ImportError::NoValidRecords(2)));
        assert!(err.to_string().starts_with("No valid items"));
    }

    #[test]
    fn test_minimal_record_gets_defaults() {
        let report = parse_import(r#"[{"id": "x"}]"#).unwrap();
        let item = &report.accepted[0];
        assert_eq!(item.category, None);
        assert_eq!(item.title, "");
        assert!(!item.watched);
    }

    #[test]
    fn test_write_backup_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        let path = write_backup(dir.path(), &[sample("a")], date).unwrap();

        assert!(path.ends_with("memoria-backup-2025-01-31.json"));
        let text = read_import_file(&path).unwrap();
        let report = parse_import(&text).unwrap();
        assert_eq!(report.accepted[0].id, "a");
    }

    #[test]
    fn test_read_import_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_import_file(dir.path()),
            Err(ImportError::NotAFile)
        ));
    }

    #[test]
    fn test_read_import_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_import_file(&dir.path().join("nope.json")),
            Err(ImportError::Io(_))
        ));
    }
}
