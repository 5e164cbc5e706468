//! Live Stream Session Orchestration
//!
//! This module owns a stream's lifecycle and everything that hangs off it:
//! - Stream lifecycle management (create, start, end, update, delete)
//! - Concurrency enforcement (concurrent-stream and viewer ceilings)
//! - Join/leave protocols with role assignment and credential issuance
//! - Participant session bookkeeping (Redis, TTL-bounded)
//! - Best-effort cloud recording control
//!
//! ## Module Structure
//!
//! - `models.rs` - Data models (stream entity, DTOs, state machine)
//! - `repository.rs` - Stream persistence (PostgreSQL)
//! - `session_cache.rs` - Participant sessions (Redis)
//! - `plans.rs` - Plan/entitlement collaborator
//! - `guard.rs` - Concurrency guard
//! - `recording.rs` - Cloud recording backend + controller
//! - `stream_service.rs` - Lifecycle orchestration

pub mod guard;
pub mod models;
pub mod plans;
pub mod recording;
pub mod repository;
pub mod session_cache;
pub mod stream_service;

pub use models::{
    Caller, CreateStreamRequest, JoinStreamRequest, JoinStreamResponse, ParticipantRole,
    RecordingStatus, Stream, StreamStatus, StreamSummary, StreamVisibility, UpdateStreamRequest,
};
pub use stream_service::LiveStreamService;

// Re-export for convenience
pub use guard::ConcurrencyGuard;
pub use recording::{RecordingBackend, RecordingController};
pub use repository::StreamStore;
pub use session_cache::{ParticipantSession, SessionStore};
