use std::sync::Arc;

use crate::config::Config;
use crate::services::live::LiveStreamService;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub live: Arc<LiveStreamService>,
    pub config: Config,
}
