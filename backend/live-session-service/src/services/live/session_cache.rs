//! Participant session cache
//!
//! A session entry is the sole source of truth for "is this user currently
//! counted as present in this stream". Entries are TTL-bounded so the
//! presence of a crashed or disconnected client self-heals; explicit leave
//! and end-of-stream purge remove them eagerly.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{aio::ConnectionManager, AsyncCommands};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use super::models::ParticipantRole;
use crate::error::Result;

/// Default session TTL, matching the credential validity window.
pub const DEFAULT_SESSION_TTL_SECS: u64 = 3600;

/// One participant's presence in one stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantSession {
    pub stream_id: Uuid,
    pub user_id: Uuid,
    pub uid: u32,
    pub role: ParticipantRole,
    pub joined_at: DateTime<Utc>,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Upsert the session entry with a fresh TTL.
    async fn put(&self, session: &ParticipantSession, ttl_seconds: u64) -> Result<()>;

    async fn get(&self, stream_id: Uuid, user_id: Uuid) -> Result<Option<ParticipantSession>>;

    async fn remove(&self, stream_id: Uuid, user_id: Uuid) -> Result<()>;

    /// Delete every session entry of a stream. Returns how many went away.
    async fn purge_stream(&self, stream_id: Uuid) -> Result<u64>;

    /// Number of live audience sessions for a stream. Basis for viewer
    /// counter reconciliation: TTL-expired entries are not counted.
    async fn audience_count(&self, stream_id: Uuid) -> Result<i64>;
}

/// Redis-backed session store. Values are JSON, keyed
/// `stream:session:{stream_id}:{user_id}`.
#[derive(Clone)]
pub struct RedisSessionStore {
    redis: ConnectionManager,
}

impl RedisSessionStore {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }

    fn key(stream_id: Uuid, user_id: Uuid) -> String {
        format!("stream:session:{}:{}", stream_id, user_id)
    }

    fn stream_pattern(stream_id: Uuid) -> String {
        format!("stream:session:{}:*", stream_id)
    }

    async fn stream_keys(&self, stream_id: Uuid) -> Result<Vec<String>> {
        let mut conn = self.redis.clone();
        let mut keys = Vec::new();
        let mut iter = conn
            .scan_match::<_, String>(Self::stream_pattern(stream_id))
            .await?;
        while let Some(key) = iter.next_item().await {
            keys.push(key);
        }
        Ok(keys)
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn put(&self, session: &ParticipantSession, ttl_seconds: u64) -> Result<()> {
        let mut conn = self.redis.clone();
        let payload = serde_json::to_string(session)
            .map_err(|e| crate::AppError::Internal(format!("session encoding failed: {e}")))?;
        conn.set_ex::<_, _, ()>(
            Self::key(session.stream_id, session.user_id),
            payload,
            ttl_seconds,
        )
        .await?;
        Ok(())
    }

    async fn get(&self, stream_id: Uuid, user_id: Uuid) -> Result<Option<ParticipantSession>> {
        let mut conn = self.redis.clone();
        let raw: Option<String> = conn.get(Self::key(stream_id, user_id)).await?;

        Ok(raw.and_then(|payload| match serde_json::from_str(&payload) {
            Ok(session) => Some(session),
            Err(err) => {
                warn!(%stream_id, %user_id, error = %err, "discarding undecodable session entry");
                None
            }
        }))
    }

    async fn remove(&self, stream_id: Uuid, user_id: Uuid) -> Result<()> {
        let mut conn = self.redis.clone();
        conn.del::<_, ()>(Self::key(stream_id, user_id)).await?;
        Ok(())
    }

    async fn purge_stream(&self, stream_id: Uuid) -> Result<u64> {
        let keys = self.stream_keys(stream_id).await?;
        if keys.is_empty() {
            return Ok(0);
        }

        let mut conn = self.redis.clone();
        let removed: u64 = conn.del(keys).await?;
        Ok(removed)
    }

    async fn audience_count(&self, stream_id: Uuid) -> Result<i64> {
        let keys = self.stream_keys(stream_id).await?;
        if keys.is_empty() {
            return Ok(0);
        }

        let mut conn = self.redis.clone();
        let payloads: Vec<Option<String>> = conn.get(&keys).await?;

        let count = payloads
            .into_iter()
            .flatten()
            .filter_map(|payload| serde_json::from_str::<ParticipantSession>(&payload).ok())
            .filter(|session| session.role.counts_toward_cap())
            .count();

        Ok(count as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_format_is_stable() {
        let stream_id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        let user_id = Uuid::parse_str("660e8400-e29b-41d4-a716-446655440001").unwrap();

        assert_eq!(
            RedisSessionStore::key(stream_id, user_id),
            "stream:session:550e8400-e29b-41d4-a716-446655440000:660e8400-e29b-41d4-a716-446655440001"
        );
        assert_eq!(
            RedisSessionStore::stream_pattern(stream_id),
            "stream:session:550e8400-e29b-41d4-a716-446655440000:*"
        );
    }

    #[test]
    fn session_round_trips_through_json() {
        let session = ParticipantSession {
            stream_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            uid: 42,
            role: ParticipantRole::Subscriber,
            joined_at: Utc::now(),
        };

        let payload = serde_json::to_string(&session).unwrap();
        let decoded: ParticipantSession = serde_json::from_str(&payload).unwrap();

        assert_eq!(decoded.stream_id, session.stream_id);
        assert_eq!(decoded.uid, 42);
        assert_eq!(decoded.role, ParticipantRole::Subscriber);
    }
}
