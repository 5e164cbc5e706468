//! Cloud recording integration
//!
//! Recording is a best-effort side effect of the stream lifecycle: the
//! lifecycle manager calls the controller and catches every error, so a
//! recording failure can never abort a start or end transition.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::models::RecordingFile;

/// Vendor recording contract: acquire a recording resource for a channel,
/// start a recording session on it, stop it and collect produced files.
#[async_trait]
pub trait RecordingBackend: Send + Sync {
    async fn acquire(&self, channel: &str, uid: u32) -> anyhow::Result<String>;

    async fn start(&self, channel: &str, uid: u32, resource_id: &str) -> anyhow::Result<String>;

    async fn stop(
        &self,
        channel: &str,
        uid: u32,
        resource_id: &str,
        session_id: &str,
    ) -> anyhow::Result<Vec<RecordingFile>>;
}

/// REST client for the vendor's cloud recording API.
pub struct CloudRecordingClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct AcquireResponse {
    resource_id: String,
}

#[derive(Deserialize)]
struct StartResponse {
    session_id: String,
}

#[derive(Deserialize)]
struct StopResponse {
    #[serde(default)]
    files: Vec<RecordingFile>,
}

impl CloudRecordingClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl RecordingBackend for CloudRecordingClient {
    async fn acquire(&self, channel: &str, uid: u32) -> anyhow::Result<String> {
        let response = self
            .http
            .post(format!("{}/v1/recording/acquire", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({ "channel": channel, "uid": uid.to_string() }))
            .send()
            .await?
            .error_for_status()?
            .json::<AcquireResponse>()
            .await?;

        Ok(response.resource_id)
    }

    async fn start(&self, channel: &str, uid: u32, resource_id: &str) -> anyhow::Result<String> {
        let response = self
            .http
            .post(format!(
                "{}/v1/recording/{}/start",
                self.base_url, resource_id
            ))
            .bearer_auth(&self.api_key)
            .json(&json!({ "channel": channel, "uid": uid.to_string() }))
            .send()
            .await?
            .error_for_status()?
            .json::<StartResponse>()
            .await?;

        Ok(response.session_id)
    }

    async fn stop(
        &self,
        channel: &str,
        uid: u32,
        resource_id: &str,
        session_id: &str,
    ) -> anyhow::Result<Vec<RecordingFile>> {
        let response = self
            .http
            .post(format!(
                "{}/v1/recording/{}/sessions/{}/stop",
                self.base_url, resource_id, session_id
            ))
            .bearer_auth(&self.api_key)
            .json(&json!({ "channel": channel, "uid": uid.to_string() }))
            .send()
            .await?
            .error_for_status()?
            .json::<StopResponse>()
            .await?;

        Ok(response.files)
    }
}

/// Backend used when no recording endpoint is configured. Every call
/// fails, which the best-effort callers log and ignore.
pub struct DisabledRecordingBackend;

#[async_trait]
impl RecordingBackend for DisabledRecordingBackend {
    async fn acquire(&self, _channel: &str, _uid: u32) -> anyhow::Result<String> {
        anyhow::bail!("recording backend not configured")
    }

    async fn start(&self, _channel: &str, _uid: u32, _resource_id: &str) -> anyhow::Result<String> {
        anyhow::bail!("recording backend not configured")
    }

    async fn stop(
        &self,
        _channel: &str,
        _uid: u32,
        _resource_id: &str,
        _session_id: &str,
    ) -> anyhow::Result<Vec<RecordingFile>> {
        anyhow::bail!("recording backend not configured")
    }
}

/// Thin wrapper sequencing acquire + start; callers own error handling.
#[derive(Clone)]
pub struct RecordingController {
    backend: Arc<dyn RecordingBackend>,
}

impl RecordingController {
    pub fn new(backend: Arc<dyn RecordingBackend>) -> Self {
        Self { backend }
    }

    /// Acquire a recording resource and start recording on the channel.
    /// Returns `(resource_id, session_id)`.
    pub async fn start(&self, channel: &str, uid: u32) -> anyhow::Result<(String, String)> {
        let resource_id = self.backend.acquire(channel, uid).await?;
        let session_id = self.backend.start(channel, uid, &resource_id).await?;
        Ok((resource_id, session_id))
    }

    /// Stop recording and collect the produced file references.
    pub async fn stop(
        &self,
        channel: &str,
        uid: u32,
        resource_id: &str,
        session_id: &str,
    ) -> anyhow::Result<Vec<RecordingFile>> {
        self.backend
            .stop(channel, uid, resource_id, session_id)
            .await
    }
}
