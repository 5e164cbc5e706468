//! Data models for live stream sessions
//!
//! These models are the contract between API handlers and the service
//! layer; the database row type lives at the bottom of the file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

// =============================================================================
// Stream Status
// =============================================================================

/// Stream lifecycle status. Transitions only move forward:
/// `preparing -> live -> ended`, with `preparing -> ended` covering streams
/// cancelled before they go live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR(20)", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    /// Created, channel allocated, broadcaster not yet live.
    Preparing,
    /// Broadcaster is live on the channel.
    Live,
    /// Stream finished or cancelled; terminal.
    Ended,
}

impl StreamStatus {
    /// States a stream may be started from.
    pub const STARTABLE: &'static [StreamStatus] = &[StreamStatus::Preparing];

    /// States a stream may be ended from.
    pub const ENDABLE: &'static [StreamStatus] = &[StreamStatus::Preparing, StreamStatus::Live];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preparing => "preparing",
            Self::Live => "live",
            Self::Ended => "ended",
        }
    }

    /// Transition table. Validated again at the compare-and-swap boundary
    /// in the store, so losing racers observe a failed guard, never a
    /// backward transition.
    pub fn can_transition(from: StreamStatus, to: StreamStatus) -> bool {
        match to {
            StreamStatus::Live => Self::STARTABLE.contains(&from),
            StreamStatus::Ended => Self::ENDABLE.contains(&from),
            StreamStatus::Preparing => false,
        }
    }

    /// Participants may join while the stream is preparing or live.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Preparing | Self::Live)
    }
}

// =============================================================================
// Visibility / Roles / Recording
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR(20)", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum StreamVisibility {
    Public,
    Unlisted,
    /// Owner-only access.
    Private,
    /// Requires the joining account to hold a premium entitlement.
    Premium,
}

/// Role a participant holds inside a channel. Resolved once per join by
/// [`super::stream_service::LiveStreamService`]; only subscribers count
/// against the viewer cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    Publisher,
    Subscriber,
}

impl ParticipantRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Publisher => "publisher",
            Self::Subscriber => "subscriber",
        }
    }

    /// Whether this participant is counted against `max_viewers`.
    pub fn counts_toward_cap(&self) -> bool {
        matches!(self, Self::Subscriber)
    }
}

impl From<ParticipantRole> for rtc_token::RtcRole {
    fn from(role: ParticipantRole) -> Self {
        match role {
            ParticipantRole::Publisher => rtc_token::RtcRole::Publisher,
            ParticipantRole::Subscriber => rtc_token::RtcRole::Subscriber,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR(20)", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RecordingStatus {
    /// No recording for this stream.
    None,
    /// Cloud recording in progress; vendor resource/session ids are set.
    Recording,
    /// Recording finished; produced files are in `recording_files`.
    Stopped,
}

/// One file produced by the cloud recording backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingFile {
    pub file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_type: Option<String>,
}

// =============================================================================
// Caller Identity
// =============================================================================

/// Authenticated caller identity, extracted from the bearer token by the
/// auth middleware. Admin callers bypass ownership checks on mutations.
#[derive(Debug, Clone, Copy)]
pub struct Caller {
    pub id: Uuid,
    pub admin: bool,
}

// =============================================================================
// Stream Entity
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Stream {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub channel_name: String,
    pub broadcaster_uid: u32,
    pub visibility: StreamVisibility,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub co_hosts: Vec<Uuid>,
    pub max_viewers: i32,
    pub current_viewers: i32,
    pub enable_chat: bool,
    pub enable_recording: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_price_cents: Option<i64>,
    pub recording_status: RecordingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recording_resource_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recording_session_id: Option<String>,
    pub recording_files: Vec<RecordingFile>,
    pub scheduled_start: Option<DateTime<Utc>>,
    pub scheduled_end: Option<DateTime<Utc>>,
    pub actual_start: Option<DateTime<Utc>>,
    pub actual_end: Option<DateTime<Utc>>,
    pub status: StreamStatus,
    pub created_at: DateTime<Utc>,
}

impl Stream {
    pub fn is_owner(&self, user_id: Uuid) -> bool {
        self.owner_id == user_id
    }

    pub fn is_co_host(&self, user_id: Uuid) -> bool {
        self.co_hosts.contains(&user_id)
    }

    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }
}

/// Insert payload, assembled by the service after entitlement and
/// concurrency checks pass.
#[derive(Debug, Clone)]
pub struct NewStream {
    pub owner_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub channel_name: String,
    pub broadcaster_uid: u32,
    pub visibility: StreamVisibility,
    pub password_hash: Option<String>,
    pub co_hosts: Vec<Uuid>,
    pub max_viewers: i32,
    pub enable_chat: bool,
    pub enable_recording: bool,
    pub ticket_price_cents: Option<i64>,
    pub scheduled_start: Option<DateTime<Utc>>,
    pub scheduled_end: Option<DateTime<Utc>>,
}

/// Metadata patch. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct StreamPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub visibility: Option<StreamVisibility>,
    pub password_hash: Option<String>,
    pub co_hosts: Option<Vec<Uuid>>,
    pub max_viewers: Option<i32>,
    pub enable_chat: Option<bool>,
    pub enable_recording: Option<bool>,
    pub ticket_price_cents: Option<i64>,
    pub scheduled_start: Option<DateTime<Utc>>,
    pub scheduled_end: Option<DateTime<Utc>>,
}

// =============================================================================
// API Request Models
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct CreateStreamRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: String,

    #[validate(length(max = 5000))]
    pub description: Option<String>,

    #[serde(default = "default_visibility")]
    pub visibility: StreamVisibility,

    #[validate(length(min = 4, max = 128))]
    pub password: Option<String>,

    #[serde(default)]
    pub co_hosts: Vec<Uuid>,

    #[serde(default = "default_max_viewers")]
    #[validate(range(min = 0))]
    pub max_viewers: i32,

    #[serde(default = "default_true")]
    pub enable_chat: bool,

    #[serde(default)]
    pub enable_recording: bool,

    #[validate(range(min = 0))]
    pub ticket_price_cents: Option<i64>,

    pub scheduled_start: Option<DateTime<Utc>>,
    pub scheduled_end: Option<DateTime<Utc>>,
}

fn default_visibility() -> StreamVisibility {
    StreamVisibility::Public
}

fn default_max_viewers() -> i32 {
    100
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateStreamRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,

    #[validate(length(max = 5000))]
    pub description: Option<String>,

    pub visibility: Option<StreamVisibility>,

    #[validate(length(min = 4, max = 128))]
    pub password: Option<String>,

    pub co_hosts: Option<Vec<Uuid>>,

    #[validate(range(min = 0))]
    pub max_viewers: Option<i32>,

    pub enable_chat: Option<bool>,
    pub enable_recording: Option<bool>,

    #[validate(range(min = 0))]
    pub ticket_price_cents: Option<i64>,

    pub scheduled_start: Option<DateTime<Utc>>,
    pub scheduled_end: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct JoinStreamRequest {
    pub password: Option<String>,
    /// Request publisher rights; honored only for co-host grant holders.
    #[serde(default)]
    pub as_broadcaster: bool,
}

// =============================================================================
// API Response Models
// =============================================================================

/// Stream summary embedded in join responses.
#[derive(Debug, Serialize)]
pub struct StreamSummary {
    pub id: Uuid,
    pub title: String,
    pub channel_name: String,
    pub status: StreamStatus,
    pub visibility: StreamVisibility,
    pub enable_chat: bool,
    pub current_viewers: i32,
    pub max_viewers: i32,
}

impl From<&Stream> for StreamSummary {
    fn from(stream: &Stream) -> Self {
        Self {
            id: stream.id,
            title: stream.title.clone(),
            channel_name: stream.channel_name.clone(),
            status: stream.status,
            visibility: stream.visibility,
            enable_chat: stream.enable_chat,
            current_viewers: stream.current_viewers,
            max_viewers: stream.max_viewers,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JoinStreamResponse {
    pub stream: StreamSummary,
    pub rtc_token: String,
    pub rtm_token: String,
    pub uid: u32,
    pub role: ParticipantRole,
    /// Viewer count after this join.
    pub current_viewers: i32,
}

// =============================================================================
// Database Row
// =============================================================================

/// Row of the `live_streams` table.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct StreamRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub channel_name: String,
    pub broadcaster_uid: i64,
    pub visibility: StreamVisibility,
    pub password_hash: Option<String>,
    pub co_hosts: Vec<Uuid>,
    pub max_viewers: i32,
    pub current_viewers: i32,
    pub enable_chat: bool,
    pub enable_recording: bool,
    pub ticket_price_cents: Option<i64>,
    pub recording_status: RecordingStatus,
    pub recording_resource_id: Option<String>,
    pub recording_session_id: Option<String>,
    pub recording_files: sqlx::types::Json<Vec<RecordingFile>>,
    pub scheduled_start: Option<DateTime<Utc>>,
    pub scheduled_end: Option<DateTime<Utc>>,
    pub actual_start: Option<DateTime<Utc>>,
    pub actual_end: Option<DateTime<Utc>>,
    pub status: StreamStatus,
    pub created_at: DateTime<Utc>,
}

impl From<StreamRow> for Stream {
    fn from(row: StreamRow) -> Self {
        Self {
            id: row.id,
            owner_id: row.owner_id,
            title: row.title,
            description: row.description,
            channel_name: row.channel_name,
            broadcaster_uid: row.broadcaster_uid as u32,
            visibility: row.visibility,
            password_hash: row.password_hash,
            co_hosts: row.co_hosts,
            max_viewers: row.max_viewers,
            current_viewers: row.current_viewers,
            enable_chat: row.enable_chat,
            enable_recording: row.enable_recording,
            ticket_price_cents: row.ticket_price_cents,
            recording_status: row.recording_status,
            recording_resource_id: row.recording_resource_id,
            recording_session_id: row.recording_session_id,
            recording_files: row.recording_files.0,
            scheduled_start: row.scheduled_start,
            scheduled_end: row.scheduled_end,
            actual_start: row.actual_start,
            actual_end: row.actual_end,
            status: row.status,
            created_at: row.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serialization() {
        assert_eq!(StreamStatus::Preparing.as_str(), "preparing");
        assert_eq!(StreamStatus::Live.as_str(), "live");
        assert_eq!(StreamStatus::Ended.as_str(), "ended");
    }

    #[test]
    fn transition_table_has_no_backward_edges() {
        use StreamStatus::*;

        assert!(StreamStatus::can_transition(Preparing, Live));
        assert!(StreamStatus::can_transition(Preparing, Ended));
        assert!(StreamStatus::can_transition(Live, Ended));

        assert!(!StreamStatus::can_transition(Live, Live));
        assert!(!StreamStatus::can_transition(Ended, Live));
        assert!(!StreamStatus::can_transition(Ended, Ended));
        assert!(!StreamStatus::can_transition(Live, Preparing));
        assert!(!StreamStatus::can_transition(Ended, Preparing));
    }

    #[test]
    fn only_subscribers_count_toward_cap() {
        assert!(ParticipantRole::Subscriber.counts_toward_cap());
        assert!(!ParticipantRole::Publisher.counts_toward_cap());
    }

    #[test]
    fn create_request_validation() {
        let valid = CreateStreamRequest {
            title: "Launch party".to_string(),
            description: None,
            visibility: StreamVisibility::Public,
            password: None,
            co_hosts: vec![],
            max_viewers: 50,
            enable_chat: true,
            enable_recording: false,
            ticket_price_cents: None,
            scheduled_start: None,
            scheduled_end: None,
        };
        assert!(valid.validate().is_ok());

        let empty_title = CreateStreamRequest {
            title: "".to_string(),
            ..valid
        };
        assert!(empty_title.validate().is_err());
    }
}
