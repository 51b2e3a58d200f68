use anyhow::Result;
use chrono::{DateTime, Utc};

use super::schema::Database;
use super::types::{FeedCheckRecord, FeedCheckRow};

impl Database {
    // ========================================================================
    // Feed Check Operations
    // ========================================================================

    /// Find the check record for a `(source, entry)` pair.
    pub async fn find_feed_check(
        &self,
        source_url: &str,
        feed_url: &str,
    ) -> Result<Option<FeedCheckRecord>> {
        let row: Option<FeedCheckRow> = sqlx::query_as(
            r#"
            SELECT source_url, feed_url, last_checked
            FROM feed_checks
            WHERE source_url = ? AND feed_url = ?
        "#,
        )
        .bind(source_url)
        .bind(feed_url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(FeedCheckRow::into_record))
    }

    /// Bump `last_checked` on the record for exactly this pair.
    ///
    /// Returns the updated record, or `None` when no record exists for the
    /// pair (nothing is inserted).
    pub async fn touch_feed_check(
        &self,
        source_url: &str,
        feed_url: &str,
        checked_at: DateTime<Utc>,
    ) -> Result<Option<FeedCheckRecord>> {
        let row: Option<FeedCheckRow> = sqlx::query_as(
            r#"
            UPDATE feed_checks
            SET last_checked = ?
            WHERE source_url = ? AND feed_url = ?
            RETURNING source_url, feed_url, last_checked
        "#,
        )
        .bind(checked_at.timestamp_millis())
        .bind(source_url)
        .bind(feed_url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(FeedCheckRow::into_record))
    }

    /// Insert a check record.
    ///
    /// If a record for the pair already exists (e.g. written by an
    /// overlapping run), its `last_checked` is updated instead, so the
    /// table never holds two rows for one pair.
    pub async fn insert_feed_check(&self, record: &FeedCheckRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO feed_checks (source_url, feed_url, last_checked)
            VALUES (?, ?, ?)
            ON CONFLICT(source_url, feed_url) DO UPDATE SET
                last_checked = excluded.last_checked
        "#,
        )
        .bind(&record.source_url)
        .bind(&record.feed_url)
        .bind(record.last_checked.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Number of check records stored for a source.
    pub async fn count_feed_checks(&self, source_url: &str) -> Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM feed_checks WHERE source_url = ?")
                .bind(source_url)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Total number of check records.
    pub async fn total_feed_checks(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM feed_checks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
