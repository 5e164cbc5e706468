//! In-memory collaborators for driving the orchestrator without
//! PostgreSQL or Redis. The stream store performs its status transitions
//! under one lock, so the compare-and-swap contract matches the SQL
//! implementation.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use rtc_token::TokenIssuer;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use live_session_service::error::Result;
use live_session_service::services::live::models::{
    Caller, CreateStreamRequest, NewStream, RecordingFile, RecordingStatus, Stream, StreamPatch,
    StreamStatus, StreamVisibility,
};
use live_session_service::services::live::plans::PlanProvider;
use live_session_service::services::live::recording::{RecordingBackend, RecordingController};
use live_session_service::services::live::repository::StreamStore;
use live_session_service::services::live::session_cache::{ParticipantSession, SessionStore};
use live_session_service::services::live::LiveStreamService;

// ============================================================================
// Stream store
// ============================================================================

#[derive(Default)]
pub struct MemStreamStore {
    streams: Mutex<HashMap<Uuid, Stream>>,
}

impl MemStreamStore {
    pub fn get(&self, stream_id: Uuid) -> Option<Stream> {
        self.streams.lock().unwrap().get(&stream_id).cloned()
    }
}

#[async_trait]
impl StreamStore for MemStreamStore {
    async fn insert(&self, new_stream: NewStream) -> Result<Stream> {
        let stream = Stream {
            id: Uuid::new_v4(),
            owner_id: new_stream.owner_id,
            title: new_stream.title,
            description: new_stream.description,
            channel_name: new_stream.channel_name,
            broadcaster_uid: new_stream.broadcaster_uid,
            visibility: new_stream.visibility,
            password_hash: new_stream.password_hash,
            co_hosts: new_stream.co_hosts,
            max_viewers: new_stream.max_viewers,
            current_viewers: 0,
            enable_chat: new_stream.enable_chat,
            enable_recording: new_stream.enable_recording,
            ticket_price_cents: new_stream.ticket_price_cents,
            recording_status: RecordingStatus::None,
            recording_resource_id: None,
            recording_session_id: None,
            recording_files: Vec::new(),
            scheduled_start: new_stream.scheduled_start,
            scheduled_end: new_stream.scheduled_end,
            actual_start: None,
            actual_end: None,
            status: StreamStatus::Preparing,
            created_at: Utc::now(),
        };
        self.streams
            .lock()
            .unwrap()
            .insert(stream.id, stream.clone());
        Ok(stream)
    }

    async fn fetch(&self, stream_id: Uuid) -> Result<Option<Stream>> {
        Ok(self.get(stream_id))
    }

    async fn count_active_for_owner(&self, owner_id: Uuid) -> Result<i64> {
        let count = self
            .streams
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.owner_id == owner_id && s.status.is_joinable())
            .count();
        Ok(count as i64)
    }

    async fn list_by_status(&self, status: StreamStatus) -> Result<Vec<Stream>> {
        Ok(self
            .streams
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.status == status)
            .cloned()
            .collect())
    }

    async fn mark_live(&self, stream_id: Uuid) -> Result<Option<Stream>> {
        let mut streams = self.streams.lock().unwrap();
        match streams.get_mut(&stream_id) {
            Some(stream) if StreamStatus::STARTABLE.contains(&stream.status) => {
                stream.status = StreamStatus::Live;
                stream.actual_start = Some(Utc::now());
                Ok(Some(stream.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn mark_ended(&self, stream_id: Uuid) -> Result<Option<Stream>> {
        let mut streams = self.streams.lock().unwrap();
        match streams.get_mut(&stream_id) {
            Some(stream) if StreamStatus::ENDABLE.contains(&stream.status) => {
                stream.status = StreamStatus::Ended;
                stream.actual_end = Some(Utc::now());
                stream.current_viewers = 0;
                Ok(Some(stream.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn update_metadata(&self, stream_id: Uuid, patch: StreamPatch) -> Result<Option<Stream>> {
        let mut streams = self.streams.lock().unwrap();
        match streams.get_mut(&stream_id) {
            Some(stream) if stream.status != StreamStatus::Live => {
                if let Some(title) = patch.title {
                    stream.title = title;
                }
                if let Some(description) = patch.description {
                    stream.description = Some(description);
                }
                if let Some(visibility) = patch.visibility {
                    stream.visibility = visibility;
                }
                if let Some(password_hash) = patch.password_hash {
                    stream.password_hash = Some(password_hash);
                }
                if let Some(co_hosts) = patch.co_hosts {
                    stream.co_hosts = co_hosts;
                }
                if let Some(max_viewers) = patch.max_viewers {
                    stream.max_viewers = max_viewers;
                }
                if let Some(enable_chat) = patch.enable_chat {
                    stream.enable_chat = enable_chat;
                }
                if let Some(enable_recording) = patch.enable_recording {
                    stream.enable_recording = enable_recording;
                }
                if let Some(ticket) = patch.ticket_price_cents {
                    stream.ticket_price_cents = Some(ticket);
                }
                if let Some(scheduled_start) = patch.scheduled_start {
                    stream.scheduled_start = Some(scheduled_start);
                }
                if let Some(scheduled_end) = patch.scheduled_end {
                    stream.scheduled_end = Some(scheduled_end);
                }
                Ok(Some(stream.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn remove(&self, stream_id: Uuid) -> Result<bool> {
        let mut streams = self.streams.lock().unwrap();
        match streams.get(&stream_id) {
            Some(stream) if stream.status != StreamStatus::Live => {
                streams.remove(&stream_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn increment_viewers(&self, stream_id: Uuid) -> Result<i32> {
        let mut streams = self.streams.lock().unwrap();
        Ok(streams
            .get_mut(&stream_id)
            .map(|s| {
                s.current_viewers += 1;
                s.current_viewers
            })
            .unwrap_or(0))
    }

    async fn decrement_viewers(&self, stream_id: Uuid) -> Result<i32> {
        let mut streams = self.streams.lock().unwrap();
        Ok(streams
            .get_mut(&stream_id)
            .map(|s| {
                s.current_viewers = (s.current_viewers - 1).max(0);
                s.current_viewers
            })
            .unwrap_or(0))
    }

    async fn set_viewers(&self, stream_id: Uuid, count: i32) -> Result<()> {
        if let Some(stream) = self.streams.lock().unwrap().get_mut(&stream_id) {
            stream.current_viewers = count.max(0);
        }
        Ok(())
    }

    async fn set_recording(
        &self,
        stream_id: Uuid,
        status: RecordingStatus,
        resource_id: Option<String>,
        session_id: Option<String>,
    ) -> Result<()> {
        if let Some(stream) = self.streams.lock().unwrap().get_mut(&stream_id) {
            stream.recording_status = status;
            stream.recording_resource_id = resource_id;
            stream.recording_session_id = session_id;
        }
        Ok(())
    }

    async fn append_recording_files(&self, stream_id: Uuid, files: &[RecordingFile]) -> Result<()> {
        if let Some(stream) = self.streams.lock().unwrap().get_mut(&stream_id) {
            stream.recording_files.extend_from_slice(files);
        }
        Ok(())
    }
}

// ============================================================================
// Session store
// ============================================================================

#[derive(Default)]
pub struct MemSessionStore {
    sessions: Mutex<HashMap<(Uuid, Uuid), ParticipantSession>>,
}

impl MemSessionStore {
    pub fn count(&self, stream_id: Uuid) -> usize {
        self.sessions
            .lock()
            .unwrap()
            .keys()
            .filter(|(sid, _)| *sid == stream_id)
            .count()
    }
}

#[async_trait]
impl SessionStore for MemSessionStore {
    async fn put(&self, session: &ParticipantSession, _ttl_seconds: u64) -> Result<()> {
        self.sessions
            .lock()
            .unwrap()
            .insert((session.stream_id, session.user_id), session.clone());
        Ok(())
    }

    async fn get(&self, stream_id: Uuid, user_id: Uuid) -> Result<Option<ParticipantSession>> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .get(&(stream_id, user_id))
            .cloned())
    }

    async fn remove(&self, stream_id: Uuid, user_id: Uuid) -> Result<()> {
        self.sessions.lock().unwrap().remove(&(stream_id, user_id));
        Ok(())
    }

    async fn purge_stream(&self, stream_id: Uuid) -> Result<u64> {
        let mut sessions = self.sessions.lock().unwrap();
        let before = sessions.len();
        sessions.retain(|(sid, _), _| *sid != stream_id);
        Ok((before - sessions.len()) as u64)
    }

    async fn audience_count(&self, stream_id: Uuid) -> Result<i64> {
        let count = self
            .sessions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.stream_id == stream_id && s.role.counts_toward_cap())
            .count();
        Ok(count as i64)
    }
}

// ============================================================================
// Recording backend
// ============================================================================

#[derive(Default)]
pub struct MockRecordingBackend {
    pub fail_start: AtomicBool,
    pub fail_stop: AtomicBool,
    pub start_calls: AtomicUsize,
    pub stop_calls: AtomicUsize,
}

impl MockRecordingBackend {
    pub fn failing_start() -> Self {
        let backend = Self::default();
        backend.fail_start.store(true, Ordering::SeqCst);
        backend
    }

    pub fn failing_stop() -> Self {
        let backend = Self::default();
        backend.fail_stop.store(true, Ordering::SeqCst);
        backend
    }
}

#[async_trait]
impl RecordingBackend for MockRecordingBackend {
    async fn acquire(&self, _channel: &str, _uid: u32) -> anyhow::Result<String> {
        if self.fail_start.load(Ordering::SeqCst) {
            anyhow::bail!("acquire rejected by backend");
        }
        Ok("res-1".to_string())
    }

    async fn start(&self, _channel: &str, _uid: u32, _resource_id: &str) -> anyhow::Result<String> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        Ok("ses-1".to_string())
    }

    async fn stop(
        &self,
        channel: &str,
        _uid: u32,
        _resource_id: &str,
        _session_id: &str,
    ) -> anyhow::Result<Vec<RecordingFile>> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_stop.load(Ordering::SeqCst) {
            anyhow::bail!("stop rejected by backend");
        }
        Ok(vec![RecordingFile {
            file_name: format!("{channel}.m3u8"),
            track_type: Some("mix".to_string()),
        }])
    }
}

// ============================================================================
// Plans
// ============================================================================

pub struct StaticPlans {
    pub premium_owners: HashSet<Uuid>,
    pub max_streams: i64,
    pub max_viewers: i32,
}

impl Default for StaticPlans {
    fn default() -> Self {
        Self {
            premium_owners: HashSet::new(),
            max_streams: 10,
            max_viewers: 10_000,
        }
    }
}

#[async_trait]
impl PlanProvider for StaticPlans {
    async fn is_premium(&self, owner_id: Uuid) -> Result<bool> {
        Ok(self.premium_owners.contains(&owner_id))
    }

    async fn max_concurrent_streams(&self, _owner_id: Uuid) -> Result<i64> {
        Ok(self.max_streams)
    }

    async fn max_concurrent_viewers(&self, _owner_id: Uuid) -> Result<i32> {
        Ok(self.max_viewers)
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub service: LiveStreamService,
    pub streams: Arc<MemStreamStore>,
    pub sessions: Arc<MemSessionStore>,
    pub recorder: Arc<MockRecordingBackend>,
}

pub fn harness() -> Harness {
    build_harness(StaticPlans::default(), MockRecordingBackend::default())
}

pub fn harness_with_plans(plans: StaticPlans) -> Harness {
    build_harness(plans, MockRecordingBackend::default())
}

pub fn harness_with_recorder(recorder: MockRecordingBackend) -> Harness {
    build_harness(StaticPlans::default(), recorder)
}

pub fn build_harness(plans: StaticPlans, recorder: MockRecordingBackend) -> Harness {
    let streams = Arc::new(MemStreamStore::default());
    let sessions = Arc::new(MemSessionStore::default());
    let recorder = Arc::new(recorder);

    let service = LiveStreamService::new(
        streams.clone(),
        sessions.clone(),
        Arc::new(plans),
        RecordingController::new(recorder.clone()),
        TokenIssuer::new("test-app", "test-secret-0123456789"),
        3600,
        3600,
    );

    Harness {
        service,
        streams,
        sessions,
        recorder,
    }
}

pub fn user() -> Caller {
    Caller {
        id: Uuid::new_v4(),
        admin: false,
    }
}

pub fn admin() -> Caller {
    Caller {
        id: Uuid::new_v4(),
        admin: true,
    }
}

pub fn base_create_request() -> CreateStreamRequest {
    CreateStreamRequest {
        title: "Test Stream".to_string(),
        description: None,
        visibility: StreamVisibility::Public,
        password: None,
        co_hosts: vec![],
        max_viewers: 100,
        enable_chat: true,
        enable_recording: false,
        ticket_price_cents: None,
        scheduled_start: None,
        scheduled_end: None,
    }
}
