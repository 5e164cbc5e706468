//! Stream persistence
//!
//! `StreamStore` is the persistence contract the orchestrator depends on:
//! CRUD, atomic viewer-counter arithmetic, and compare-and-swap status
//! transitions. `PgStreamStore` is the PostgreSQL implementation; this
//! layer is pure data access, no business logic.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::models::{NewStream, RecordingFile, RecordingStatus, Stream, StreamPatch, StreamRow, StreamStatus};
use crate::error::Result;

#[async_trait]
pub trait StreamStore: Send + Sync {
    async fn insert(&self, new_stream: NewStream) -> Result<Stream>;

    async fn fetch(&self, stream_id: Uuid) -> Result<Option<Stream>>;

    /// Streams owned by `owner_id` that are `preparing` or `live`.
    async fn count_active_for_owner(&self, owner_id: Uuid) -> Result<i64>;

    async fn list_by_status(&self, status: StreamStatus) -> Result<Vec<Stream>>;

    /// Compare-and-swap `preparing -> live`, stamping `actual_start`.
    /// Returns `None` when the guard fails (already live, ended, or gone);
    /// exactly one of any set of racing callers sees `Some`.
    async fn mark_live(&self, stream_id: Uuid) -> Result<Option<Stream>>;

    /// Compare-and-swap `{preparing, live} -> ended`, stamping `actual_end`
    /// and zeroing the viewer counter. Same winner-takes-all contract as
    /// [`StreamStore::mark_live`].
    async fn mark_ended(&self, stream_id: Uuid) -> Result<Option<Stream>>;

    /// Apply a metadata patch. Guarded against `live` streams so a stream
    /// that went live between check and write is left untouched.
    async fn update_metadata(&self, stream_id: Uuid, patch: StreamPatch) -> Result<Option<Stream>>;

    /// Remove the stream unless it is `live`. Returns whether a row went away.
    async fn remove(&self, stream_id: Uuid) -> Result<bool>;

    /// Atomic `current_viewers + 1`, returning the new count.
    async fn increment_viewers(&self, stream_id: Uuid) -> Result<i32>;

    /// Atomic `current_viewers - 1`, floored at zero.
    async fn decrement_viewers(&self, stream_id: Uuid) -> Result<i32>;

    /// Overwrite the viewer counter (reconciliation path).
    async fn set_viewers(&self, stream_id: Uuid, count: i32) -> Result<()>;

    async fn set_recording(
        &self,
        stream_id: Uuid,
        status: RecordingStatus,
        resource_id: Option<String>,
        session_id: Option<String>,
    ) -> Result<()>;

    async fn append_recording_files(&self, stream_id: Uuid, files: &[RecordingFile]) -> Result<()>;
}

const STREAM_COLUMNS: &str = "id, owner_id, title, description, channel_name, broadcaster_uid, \
     visibility, password_hash, co_hosts, max_viewers, current_viewers, \
     enable_chat, enable_recording, ticket_price_cents, \
     recording_status, recording_resource_id, recording_session_id, recording_files, \
     scheduled_start, scheduled_end, actual_start, actual_end, status, created_at";

#[derive(Clone)]
pub struct PgStreamStore {
    pool: PgPool,
}

impl PgStreamStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StreamStore for PgStreamStore {
    async fn insert(&self, new_stream: NewStream) -> Result<Stream> {
        let query = format!(
            r#"
            INSERT INTO live_streams (
                owner_id, title, description, channel_name, broadcaster_uid,
                visibility, password_hash, co_hosts, max_viewers,
                enable_chat, enable_recording, ticket_price_cents,
                scheduled_start, scheduled_end, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, 'preparing')
            RETURNING {STREAM_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, StreamRow>(&query)
            .bind(new_stream.owner_id)
            .bind(new_stream.title)
            .bind(new_stream.description)
            .bind(new_stream.channel_name)
            .bind(new_stream.broadcaster_uid as i64)
            .bind(new_stream.visibility)
            .bind(new_stream.password_hash)
            .bind(new_stream.co_hosts)
            .bind(new_stream.max_viewers)
            .bind(new_stream.enable_chat)
            .bind(new_stream.enable_recording)
            .bind(new_stream.ticket_price_cents)
            .bind(new_stream.scheduled_start)
            .bind(new_stream.scheduled_end)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.into())
    }

    async fn fetch(&self, stream_id: Uuid) -> Result<Option<Stream>> {
        let query = format!("SELECT {STREAM_COLUMNS} FROM live_streams WHERE id = $1");

        let row = sqlx::query_as::<_, StreamRow>(&query)
            .bind(stream_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    async fn count_active_for_owner(&self, owner_id: Uuid) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM live_streams
            WHERE owner_id = $1 AND status IN ('preparing', 'live')
            "#,
        )
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn list_by_status(&self, status: StreamStatus) -> Result<Vec<Stream>> {
        let query = format!("SELECT {STREAM_COLUMNS} FROM live_streams WHERE status = $1");

        let rows = sqlx::query_as::<_, StreamRow>(&query)
            .bind(status)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn mark_live(&self, stream_id: Uuid) -> Result<Option<Stream>> {
        let query = format!(
            r#"
            UPDATE live_streams
            SET status = 'live', actual_start = NOW()
            WHERE id = $1 AND status = 'preparing'
            RETURNING {STREAM_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, StreamRow>(&query)
            .bind(stream_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    async fn mark_ended(&self, stream_id: Uuid) -> Result<Option<Stream>> {
        let query = format!(
            r#"
            UPDATE live_streams
            SET status = 'ended', actual_end = NOW(), current_viewers = 0
            WHERE id = $1 AND status IN ('preparing', 'live')
            RETURNING {STREAM_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, StreamRow>(&query)
            .bind(stream_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    async fn update_metadata(&self, stream_id: Uuid, patch: StreamPatch) -> Result<Option<Stream>> {
        let query = format!(
            r#"
            UPDATE live_streams
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                visibility = COALESCE($4, visibility),
                password_hash = COALESCE($5, password_hash),
                co_hosts = COALESCE($6, co_hosts),
                max_viewers = COALESCE($7, max_viewers),
                enable_chat = COALESCE($8, enable_chat),
                enable_recording = COALESCE($9, enable_recording),
                ticket_price_cents = COALESCE($10, ticket_price_cents),
                scheduled_start = COALESCE($11, scheduled_start),
                scheduled_end = COALESCE($12, scheduled_end)
            WHERE id = $1 AND status <> 'live'
            RETURNING {STREAM_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, StreamRow>(&query)
            .bind(stream_id)
            .bind(patch.title)
            .bind(patch.description)
            .bind(patch.visibility)
            .bind(patch.password_hash)
            .bind(patch.co_hosts)
            .bind(patch.max_viewers)
            .bind(patch.enable_chat)
            .bind(patch.enable_recording)
            .bind(patch.ticket_price_cents)
            .bind(patch.scheduled_start)
            .bind(patch.scheduled_end)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    async fn remove(&self, stream_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM live_streams WHERE id = $1 AND status <> 'live'")
            .bind(stream_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn increment_viewers(&self, stream_id: Uuid) -> Result<i32> {
        let count = sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE live_streams
            SET current_viewers = current_viewers + 1
            WHERE id = $1
            RETURNING current_viewers
            "#,
        )
        .bind(stream_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(count.unwrap_or(0))
    }

    async fn decrement_viewers(&self, stream_id: Uuid) -> Result<i32> {
        let count = sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE live_streams
            SET current_viewers = GREATEST(current_viewers - 1, 0)
            WHERE id = $1
            RETURNING current_viewers
            "#,
        )
        .bind(stream_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(count.unwrap_or(0))
    }

    async fn set_viewers(&self, stream_id: Uuid, count: i32) -> Result<()> {
        sqlx::query("UPDATE live_streams SET current_viewers = $2 WHERE id = $1")
            .bind(stream_id)
            .bind(count.max(0))
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn set_recording(
        &self,
        stream_id: Uuid,
        status: RecordingStatus,
        resource_id: Option<String>,
        session_id: Option<String>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE live_streams
            SET recording_status = $2, recording_resource_id = $3, recording_session_id = $4
            WHERE id = $1
            "#,
        )
        .bind(stream_id)
        .bind(status)
        .bind(resource_id)
        .bind(session_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn append_recording_files(&self, stream_id: Uuid, files: &[RecordingFile]) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE live_streams
            SET recording_files = recording_files || $2
            WHERE id = $1
            "#,
        )
        .bind(stream_id)
        .bind(sqlx::types::Json(files))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
