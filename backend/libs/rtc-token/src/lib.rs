//! RTC/RTM credential issuing for live stream channels
//!
//! Tokens are compact HS256 JWTs bound to a vendor application id and signed
//! with its secret. An RTC token authorizes media transport on one channel
//! with one role; an RTM token authorizes text messaging for one user id.
//! Expiry is enforced by the vendor verifying the token, so tokens must
//! never be persisted past their validity window — callers re-issue on
//! every join.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64_URL, Engine};
use hmac::{Hmac, Mac};
use rand::Rng;
use serde::Serialize;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid signing secret: {0}")]
    InvalidSecret(String),

    #[error("claims serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Media role granted by an RTC token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtcRole {
    /// May send media into the channel.
    Publisher,
    /// May only receive media.
    Subscriber,
}

impl RtcRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Publisher => "publisher",
            Self::Subscriber => "subscriber",
        }
    }
}

#[derive(Serialize)]
struct RtcClaims<'a> {
    iss: &'a str,
    sub: String,
    channel: &'a str,
    role: &'a str,
    iat: i64,
    nbf: i64,
    exp: i64,
}

#[derive(Serialize)]
struct RtmClaims<'a> {
    iss: &'a str,
    sub: &'a str,
    service: &'a str,
    iat: i64,
    exp: i64,
}

/// Issues channel credentials for one vendor application.
#[derive(Clone)]
pub struct TokenIssuer {
    app_id: String,
    app_secret: String,
}

impl TokenIssuer {
    pub fn new(app_id: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            app_secret: app_secret.into(),
        }
    }

    /// Issue a media-transport token scoped to `channel` and `role`.
    pub fn issue_rtc(
        &self,
        channel: &str,
        uid: u32,
        role: RtcRole,
        ttl_seconds: u64,
    ) -> Result<String, TokenError> {
        let now = chrono::Utc::now().timestamp();
        let claims = RtcClaims {
            iss: &self.app_id,
            sub: uid.to_string(),
            channel,
            role: role.as_str(),
            iat: now,
            nbf: now,
            exp: now + ttl_seconds as i64,
        };
        self.sign(&claims)
    }

    /// Issue a messaging token for `user_id`, independent of any RTC role.
    pub fn issue_rtm(&self, user_id: &str, ttl_seconds: u64) -> Result<String, TokenError> {
        let now = chrono::Utc::now().timestamp();
        let claims = RtmClaims {
            iss: &self.app_id,
            sub: user_id,
            service: "rtm",
            iat: now,
            exp: now + ttl_seconds as i64,
        };
        self.sign(&claims)
    }

    fn sign<C: Serialize>(&self, claims: &C) -> Result<String, TokenError> {
        let header = serde_json::json!({ "alg": "HS256", "typ": "JWT" });
        let header_b64 = BASE64_URL.encode(serde_json::to_string(&header)?);
        let claims_b64 = BASE64_URL.encode(serde_json::to_string(claims)?);
        let message = format!("{}.{}", header_b64, claims_b64);

        let mut mac = HmacSha256::new_from_slice(self.app_secret.as_bytes())
            .map_err(|e| TokenError::InvalidSecret(e.to_string()))?;
        mac.update(message.as_bytes());
        let signature_b64 = BASE64_URL.encode(mac.finalize().into_bytes());

        Ok(format!("{}.{}", message, signature_b64))
    }
}

/// Generate a non-zero participant uid. The vendor treats uid 0 as
/// "let the server pick", so it is never handed out.
pub fn generate_uid() -> u32 {
    rand::thread_rng().gen_range(1..=u32::MAX)
}

/// Generate a vendor-routable channel name: `{prefix}-{16 hex chars}`.
pub fn generate_channel_name(prefix: &str) -> String {
    let entropy: [u8; 8] = rand::thread_rng().gen();
    format!("{}-{}", prefix, hex::encode(entropy))
}
