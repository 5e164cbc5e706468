//! Concurrency guard
//!
//! Enforces the plan's concurrent-stream ceiling before creation and the
//! per-stream viewer cap before audience joins. Both are check-then-act
//! against stored counts, not locks: concurrent callers may over-admit by
//! a small margin, never under-admit.

use std::sync::Arc;
use uuid::Uuid;

use super::models::{ParticipantRole, Stream};
use super::plans::PlanProvider;
use super::repository::StreamStore;
use crate::error::{AppError, Result};
use crate::metrics;

pub struct ConcurrencyGuard {
    store: Arc<dyn StreamStore>,
    plans: Arc<dyn PlanProvider>,
}

impl ConcurrencyGuard {
    pub fn new(store: Arc<dyn StreamStore>, plans: Arc<dyn PlanProvider>) -> Self {
        Self { store, plans }
    }

    /// Reject creation once the owner is at the plan's concurrent-stream
    /// ceiling (streams in `preparing` or `live`).
    pub async fn check_create_allowed(&self, owner_id: Uuid) -> Result<()> {
        let ceiling = self.plans.max_concurrent_streams(owner_id).await?;
        let active = self.store.count_active_for_owner(owner_id).await?;

        if active >= ceiling {
            metrics::limit_rejected("concurrent_streams");
            return Err(AppError::TooManyActiveStreams);
        }
        Ok(())
    }

    /// Reject audience joins once the stream is at its viewer cap. The
    /// owner and authorized co-hosts join as publishers and bypass the cap.
    pub fn check_join_allowed(&self, stream: &Stream, role: ParticipantRole) -> Result<()> {
        if role.counts_toward_cap() && stream.current_viewers >= stream.max_viewers {
            metrics::limit_rejected("viewer_cap");
            return Err(AppError::CapacityExceeded);
        }
        Ok(())
    }
}
