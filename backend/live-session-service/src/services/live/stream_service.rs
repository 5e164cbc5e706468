//! Stream lifecycle orchestration
//!
//! `LiveStreamService` owns the stream state machine and is the only
//! writer of stream status. It coordinates the concurrency guard, session
//! cache, credential issuer and recording controller; recording failures
//! are logged and swallowed so the lifecycle never fails because
//! recording did.

use chrono::Utc;
use rtc_token::TokenIssuer;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::guard::ConcurrencyGuard;
use super::models::*;
use super::plans::PlanProvider;
use super::recording::RecordingController;
use super::repository::StreamStore;
use super::session_cache::{ParticipantSession, SessionStore};
use crate::error::{AppError, Result};
use crate::metrics;
use crate::security;

pub struct LiveStreamService {
    store: Arc<dyn StreamStore>,
    sessions: Arc<dyn SessionStore>,
    plans: Arc<dyn PlanProvider>,
    guard: ConcurrencyGuard,
    recorder: RecordingController,
    tokens: TokenIssuer,
    session_ttl_seconds: u64,
    token_ttl_seconds: u64,
}

impl LiveStreamService {
    pub fn new(
        store: Arc<dyn StreamStore>,
        sessions: Arc<dyn SessionStore>,
        plans: Arc<dyn PlanProvider>,
        recorder: RecordingController,
        tokens: TokenIssuer,
        session_ttl_seconds: u64,
        token_ttl_seconds: u64,
    ) -> Self {
        let guard = ConcurrencyGuard::new(store.clone(), plans.clone());
        Self {
            store,
            sessions,
            plans,
            guard,
            recorder,
            tokens,
            session_ttl_seconds,
            token_ttl_seconds,
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Create a stream in `preparing` state, allocating its channel
    /// identity and the broadcaster's fixed uid.
    pub async fn create(&self, caller: &Caller, request: CreateStreamRequest) -> Result<Stream> {
        self.check_entitlements(
            caller.id,
            request.visibility,
            request.enable_recording,
            request.ticket_price_cents,
        )
        .await?;
        self.guard.check_create_allowed(caller.id).await?;

        // The owner-configured cap cannot exceed the plan's viewer ceiling.
        let viewer_ceiling = self.plans.max_concurrent_viewers(caller.id).await?;
        let max_viewers = request.max_viewers.min(viewer_ceiling);

        let password_hash = request
            .password
            .as_deref()
            .map(security::hash_password)
            .transpose()?;

        let stream = self
            .store
            .insert(NewStream {
                owner_id: caller.id,
                title: request.title,
                description: request.description,
                channel_name: rtc_token::generate_channel_name("stream"),
                broadcaster_uid: rtc_token::generate_uid(),
                visibility: request.visibility,
                password_hash,
                co_hosts: request.co_hosts,
                max_viewers,
                enable_chat: request.enable_chat,
                enable_recording: request.enable_recording,
                ticket_price_cents: request.ticket_price_cents,
                scheduled_start: request.scheduled_start,
                scheduled_end: request.scheduled_end,
            })
            .await?;

        metrics::stream_created();
        info!(stream_id = %stream.id, owner_id = %caller.id, channel = %stream.channel_name, "stream created");
        Ok(stream)
    }

    /// Transition `preparing -> live`. Racing duplicate calls are settled
    /// by the store's compare-and-swap: exactly one caller wins.
    pub async fn start(&self, stream_id: Uuid, caller: &Caller) -> Result<Stream> {
        let stream = self.fetch_existing(stream_id).await?;
        self.ensure_can_mutate(&stream, caller)?;

        let Some(mut started) = self.store.mark_live(stream_id).await? else {
            return Err(self.invalid_state(stream_id, "start").await?);
        };
        metrics::stream_started();

        if started.enable_recording {
            match self
                .recorder
                .start(&started.channel_name, started.broadcaster_uid)
                .await
            {
                Ok((resource_id, session_id)) => {
                    self.store
                        .set_recording(
                            stream_id,
                            RecordingStatus::Recording,
                            Some(resource_id.clone()),
                            Some(session_id.clone()),
                        )
                        .await?;
                    started.recording_status = RecordingStatus::Recording;
                    started.recording_resource_id = Some(resource_id);
                    started.recording_session_id = Some(session_id);
                }
                Err(err) => {
                    metrics::recording_failure();
                    warn!(
                        stream_id = %stream_id,
                        channel = %started.channel_name,
                        error = %err,
                        "recording start failed; stream goes live without recording"
                    );
                }
            }
        }

        info!(stream_id = %stream_id, "stream live");
        Ok(started)
    }

    /// Transition `{preparing, live} -> ended`, stop any active recording,
    /// and purge the stream's session entries. Ending from `preparing`
    /// cancels a stream that never went live.
    pub async fn end(&self, stream_id: Uuid, caller: &Caller) -> Result<Stream> {
        let stream = self.fetch_existing(stream_id).await?;
        self.ensure_can_mutate(&stream, caller)?;

        let Some(mut ended) = self.store.mark_ended(stream_id).await? else {
            return Err(self.invalid_state(stream_id, "end").await?);
        };
        metrics::stream_ended();

        if ended.recording_status == RecordingStatus::Recording {
            self.finish_recording(&mut ended).await?;
        }

        match self.sessions.purge_stream(stream_id).await {
            Ok(purged) => debug!(stream_id = %stream_id, purged, "session entries purged"),
            Err(err) => warn!(
                stream_id = %stream_id,
                error = %err,
                "session purge failed after stream end; entries will expire by TTL"
            ),
        }

        info!(stream_id = %stream_id, "stream ended");
        Ok(ended)
    }

    /// Apply a metadata patch. Rejected while the stream is live; premium
    /// entitlement is re-checked when a premium feature is being enabled.
    pub async fn update(
        &self,
        stream_id: Uuid,
        caller: &Caller,
        request: UpdateStreamRequest,
    ) -> Result<Stream> {
        let stream = self.fetch_existing(stream_id).await?;
        self.ensure_can_mutate(&stream, caller)?;

        if stream.status == StreamStatus::Live {
            return Err(AppError::InvalidState(
                "stream metadata cannot be edited while live".into(),
            ));
        }

        let enabling_premium = matches!(request.visibility, Some(StreamVisibility::Premium))
            || request.enable_recording == Some(true)
            || request.ticket_price_cents.is_some();
        if enabling_premium && !self.plans.is_premium(stream.owner_id).await? {
            return Err(AppError::PermissionDenied(
                "premium entitlement required for this feature".into(),
            ));
        }

        let password_hash = request
            .password
            .as_deref()
            .map(security::hash_password)
            .transpose()?;

        let patch = StreamPatch {
            title: request.title,
            description: request.description,
            visibility: request.visibility,
            password_hash,
            co_hosts: request.co_hosts,
            max_viewers: request.max_viewers,
            enable_chat: request.enable_chat,
            enable_recording: request.enable_recording,
            ticket_price_cents: request.ticket_price_cents,
            scheduled_start: request.scheduled_start,
            scheduled_end: request.scheduled_end,
        };

        match self.store.update_metadata(stream_id, patch).await? {
            Some(updated) => Ok(updated),
            // The store refuses writes to live streams, so losing the race
            // against a concurrent start leaves the entity untouched.
            None => Err(AppError::InvalidState(
                "stream went live during the update".into(),
            )),
        }
    }

    /// Remove a non-live stream, stopping any recording and purging its
    /// sessions first (both best-effort).
    pub async fn delete(&self, stream_id: Uuid, caller: &Caller) -> Result<()> {
        let stream = self.fetch_existing(stream_id).await?;
        self.ensure_can_mutate(&stream, caller)?;

        if stream.status == StreamStatus::Live {
            return Err(AppError::InvalidState(
                "live streams cannot be deleted".into(),
            ));
        }

        if stream.recording_status == RecordingStatus::Recording {
            if let (Some(resource_id), Some(session_id)) = (
                stream.recording_resource_id.as_deref(),
                stream.recording_session_id.as_deref(),
            ) {
                if let Err(err) = self
                    .recorder
                    .stop(
                        &stream.channel_name,
                        stream.broadcaster_uid,
                        resource_id,
                        session_id,
                    )
                    .await
                {
                    metrics::recording_failure();
                    warn!(
                        stream_id = %stream_id,
                        channel = %stream.channel_name,
                        error = %err,
                        "recording stop failed during delete"
                    );
                }
            }
        }

        if let Err(err) = self.sessions.purge_stream(stream_id).await {
            warn!(stream_id = %stream_id, error = %err, "session purge failed during delete");
        }

        if !self.store.remove(stream_id).await? {
            return Err(AppError::InvalidState(
                "stream went live during the delete".into(),
            ));
        }

        info!(stream_id = %stream_id, "stream deleted");
        Ok(())
    }

    pub async fn get(&self, stream_id: Uuid) -> Result<Stream> {
        self.fetch_existing(stream_id).await
    }

    // =========================================================================
    // Join / Leave
    // =========================================================================

    pub async fn join(
        &self,
        stream_id: Uuid,
        caller: &Caller,
        request: JoinStreamRequest,
    ) -> Result<JoinStreamResponse> {
        let stream = self.fetch_existing(stream_id).await?;

        self.check_access(&stream, caller, request.password.as_deref())
            .await?;

        if !stream.status.is_joinable() {
            return Err(AppError::InvalidState(format!(
                "stream is {}",
                stream.status.as_str()
            )));
        }

        // A live session entry makes the join idempotent: same uid and
        // role come back, the TTL refreshes, and nothing is re-counted.
        let existing = self.sessions.get(stream_id, caller.id).await?;
        let (role, uid) = match &existing {
            Some(session) => (session.role, session.uid),
            None => {
                let (role, uid) = resolve_role(&stream, caller.id, request.as_broadcaster);
                self.guard.check_join_allowed(&stream, role)?;
                (role, uid)
            }
        };

        let rtc_token =
            self.tokens
                .issue_rtc(&stream.channel_name, uid, role.into(), self.token_ttl_seconds)?;
        let rtm_token = self
            .tokens
            .issue_rtm(&caller.id.to_string(), self.token_ttl_seconds)?;

        let current_viewers = if role.counts_toward_cap() && existing.is_none() {
            self.store.increment_viewers(stream_id).await?
        } else {
            stream.current_viewers
        };

        let session = ParticipantSession {
            stream_id,
            user_id: caller.id,
            uid,
            role,
            joined_at: existing.map(|s| s.joined_at).unwrap_or_else(Utc::now),
        };
        self.sessions.put(&session, self.session_ttl_seconds).await?;

        metrics::participant_joined();
        debug!(stream_id = %stream_id, user_id = %caller.id, role = role.as_str(), uid, "participant joined");

        Ok(JoinStreamResponse {
            stream: (&stream).into(),
            rtc_token,
            rtm_token,
            uid,
            role,
            current_viewers,
        })
    }

    /// The session entry decides whether this participant was counted as an
    /// audience viewer; the counter never drops below zero.
    pub async fn leave(&self, stream_id: Uuid, caller: &Caller) -> Result<()> {
        if let Some(session) = self.sessions.get(stream_id, caller.id).await? {
            if session.role.counts_toward_cap() {
                self.store.decrement_viewers(stream_id).await?;
            }
        }
        self.sessions.remove(stream_id, caller.id).await?;

        debug!(stream_id = %stream_id, user_id = %caller.id, "participant left");
        Ok(())
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Recompute `current_viewers` from the cache's live audience sessions.
    /// Clients that disconnect without leaving stop being counted once
    /// their session entry expires.
    pub async fn reconcile_viewers(&self, stream_id: Uuid) -> Result<i32> {
        let audience = self.sessions.audience_count(stream_id).await? as i32;
        self.store.set_viewers(stream_id, audience).await?;
        Ok(audience)
    }

    /// Reconciliation sweep over all live streams; per-stream failures are
    /// logged and do not stop the sweep.
    pub async fn reconcile_all_live(&self) -> Result<()> {
        for stream in self.store.list_by_status(StreamStatus::Live).await? {
            if let Err(err) = self.reconcile_viewers(stream.id).await {
                warn!(stream_id = %stream.id, error = %err, "viewer reconciliation failed");
            }
        }
        Ok(())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn fetch_existing(&self, stream_id: Uuid) -> Result<Stream> {
        self.store
            .fetch(stream_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("stream {stream_id}")))
    }

    fn ensure_can_mutate(&self, stream: &Stream, caller: &Caller) -> Result<()> {
        if stream.is_owner(caller.id) || caller.admin {
            Ok(())
        } else {
            Err(AppError::PermissionDenied(
                "only the stream owner may do this".into(),
            ))
        }
    }

    async fn check_entitlements(
        &self,
        owner_id: Uuid,
        visibility: StreamVisibility,
        enable_recording: bool,
        ticket_price_cents: Option<i64>,
    ) -> Result<()> {
        let needs_premium = visibility == StreamVisibility::Premium
            || enable_recording
            || ticket_price_cents.is_some();

        if needs_premium && !self.plans.is_premium(owner_id).await? {
            return Err(AppError::PermissionDenied(
                "premium entitlement required for this feature".into(),
            ));
        }
        Ok(())
    }

    /// Access rules for joiners, evaluated in order: password, private,
    /// premium. The owner always passes. Each failure is a distinct error
    /// kind so callers can present the right UX.
    async fn check_access(
        &self,
        stream: &Stream,
        caller: &Caller,
        password: Option<&str>,
    ) -> Result<()> {
        if stream.is_owner(caller.id) {
            return Ok(());
        }

        if let Some(hash) = &stream.password_hash {
            let supplied = password.ok_or(AppError::PasswordRequired)?;
            if !security::verify_password(supplied, hash) {
                return Err(AppError::PasswordRequired);
            }
        }

        match stream.visibility {
            StreamVisibility::Private => return Err(AppError::PrivateAccess),
            StreamVisibility::Premium => {
                if !self.plans.is_premium(caller.id).await? {
                    return Err(AppError::PremiumRequired);
                }
            }
            StreamVisibility::Public | StreamVisibility::Unlisted => {}
        }

        Ok(())
    }

    /// Stop an active recording after the end transition committed. The
    /// stop itself is best-effort, but recording status always leaves the
    /// `recording` state so the resource/session id invariant holds.
    async fn finish_recording(&self, ended: &mut Stream) -> Result<()> {
        let (Some(resource_id), Some(session_id)) = (
            ended.recording_resource_id.clone(),
            ended.recording_session_id.clone(),
        ) else {
            return Ok(());
        };

        match self
            .recorder
            .stop(
                &ended.channel_name,
                ended.broadcaster_uid,
                &resource_id,
                &session_id,
            )
            .await
        {
            Ok(files) => {
                self.store
                    .append_recording_files(ended.id, &files)
                    .await?;
                ended.recording_files.extend(files);
            }
            Err(err) => {
                metrics::recording_failure();
                warn!(
                    stream_id = %ended.id,
                    channel = %ended.channel_name,
                    error = %err,
                    "recording stop failed; stream ends without archived files"
                );
            }
        }

        self.store
            .set_recording(ended.id, RecordingStatus::Stopped, None, None)
            .await?;
        ended.recording_status = RecordingStatus::Stopped;
        ended.recording_resource_id = None;
        ended.recording_session_id = None;

        Ok(())
    }

    /// Build the `InvalidState` error for a failed compare-and-swap,
    /// re-reading the row so the message reflects the state that won.
    async fn invalid_state(&self, stream_id: Uuid, action: &str) -> Result<AppError> {
        let status = self
            .store
            .fetch(stream_id)
            .await?
            .map(|s| s.status.as_str())
            .unwrap_or("deleted");
        Ok(AppError::InvalidState(format!(
            "cannot {action} stream in '{status}' state"
        )))
    }
}

/// Role decision for a join: the owner is always the publisher on the
/// fixed broadcaster uid; a grant-list co-host asking for broadcaster
/// rights publishes on a fresh uid; everyone else is audience.
fn resolve_role(stream: &Stream, user_id: Uuid, as_broadcaster: bool) -> (ParticipantRole, u32) {
    if stream.is_owner(user_id) {
        return (ParticipantRole::Publisher, stream.broadcaster_uid);
    }
    if as_broadcaster && stream.is_co_host(user_id) {
        return (ParticipantRole::Publisher, rtc_token::generate_uid());
    }
    (ParticipantRole::Subscriber, rtc_token::generate_uid())
}
