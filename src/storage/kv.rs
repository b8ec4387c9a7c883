use anyhow::Result;

use super::schema::Database;

impl Database {
    // ========================================================================
    // Key-Value Operations
    // ========================================================================

    /// Get the value stored under `key`, or `None` if it was never set.
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(value,)| value))
    }

    /// Set a value (UPSERT). Last writer wins.
    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.set_many(&[(key, value)]).await
    }

    /// Write several entries in one transaction.
    ///
    /// Either every entry lands or none does, so a crash mid-write never leaves
    /// items and settings from different generations on disk.
    pub async fn set_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for (key, value) in entries {
            sqlx::query(
                r#"
                INSERT INTO kv_store (key, value, updated_at)
                VALUES (?, ?, datetime('now'))
                ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            )
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Remove every entry.
    pub async fn clear(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM kv_store")
            .execute(&self.pool)
            .await?;
        tracing::debug!(removed = result.rows_affected(), "Cleared key-value store");
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::Database;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_get_missing() {
        let db = test_db().await;
        assert_eq!(db.get("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let db = test_db().await;
        db.set("memoria-v1-items", "[]").await.unwrap();
        assert_eq!(
            db.get("memoria-v1-items").await.unwrap(),
            Some("[]".to_string())
        );
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let db = test_db().await;
        db.set("k", "one").await.unwrap();
        db.set("k", "two").await.unwrap();
        assert_eq!(db.get("k").await.unwrap(), Some("two".to_string()));
    }

    #[tokio::test]
    async fn test_set_many_writes_all() {
        let db = test_db().await;
        db.set_many(&[("a", "1"), ("b", "2")]).await.unwrap();
        assert_eq!(db.get("a").await.unwrap().as_deref(), Some("1"));
        assert_eq!(db.get("b").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let db = test_db().await;
        db.set_many(&[("a", "1"), ("b", "2")]).await.unwrap();

        assert_eq!(db.clear().await.unwrap(), 2);
        assert_eq!(db.get("a").await.unwrap(), None);
        assert_eq!(db.get("b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_values_keep_unicode() {
        let db = test_db().await;
        let value = r#"[{"title":"日本語のタイトル ✨"}]"#;
        db.set("k", value).await.unwrap();
        assert_eq!(db.get("k").await.unwrap().as_deref(), Some(value));
    }
}
