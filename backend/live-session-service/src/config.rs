use anyhow::{anyhow, Context, Result};
use dotenv::dotenv;
use std::env;
use uuid::Uuid;

use crate::services::live::plans::PlanCeilings;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    pub redis_url: String,
    pub jwt_secret: String,
    pub rtc_app_id: String,
    pub rtc_app_secret: String,
    /// Cloud recording REST endpoint; recording is disabled when unset.
    pub recording_api_url: Option<String>,
    pub recording_api_key: Option<String>,
    pub session_ttl_seconds: u64,
    pub token_ttl_seconds: u64,
    pub reconcile_interval_seconds: u64,
    pub free_plan: PlanCeilings,
    pub premium_plan: PlanCeilings,
    /// Owner accounts holding a premium entitlement. Stands in for the
    /// billing-side entitlement lookup.
    pub premium_owner_ids: Vec<Uuid>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let database_url = required("DATABASE_URL")?;
        let redis_url = required("REDIS_URL")?;
        let jwt_secret = required("JWT_SECRET")?;
        let rtc_app_id = required("RTC_APP_ID")?;
        let rtc_app_secret = required("RTC_APP_SECRET")?;

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: parse_var("PORT", 8085)?,
            database_url,
            database_max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 10)?,
            redis_url,
            jwt_secret,
            rtc_app_id,
            rtc_app_secret,
            recording_api_url: env::var("RECORDING_API_URL").ok().filter(|s| !s.is_empty()),
            recording_api_key: env::var("RECORDING_API_KEY").ok().filter(|s| !s.is_empty()),
            session_ttl_seconds: parse_var("SESSION_TTL_SECONDS", 3600)?,
            token_ttl_seconds: parse_var("TOKEN_TTL_SECONDS", 3600)?,
            reconcile_interval_seconds: parse_var("VIEWER_RECONCILE_INTERVAL_SECONDS", 60)?,
            free_plan: PlanCeilings {
                max_concurrent_streams: parse_var("FREE_MAX_CONCURRENT_STREAMS", 1)?,
                max_concurrent_viewers: parse_var("FREE_MAX_CONCURRENT_VIEWERS", 100)?,
            },
            premium_plan: PlanCeilings {
                max_concurrent_streams: parse_var("PREMIUM_MAX_CONCURRENT_STREAMS", 5)?,
                max_concurrent_viewers: parse_var("PREMIUM_MAX_CONCURRENT_VIEWERS", 10_000)?,
            },
            premium_owner_ids: parse_id_list(
                &env::var("PREMIUM_OWNER_IDS").unwrap_or_default(),
            )?,
        })
    }
}

fn required(name: &str) -> Result<String> {
    env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow!("{name} must be set"))
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) if !raw.is_empty() => raw
            .parse()
            .with_context(|| format!("invalid value for {name}")),
        _ => Ok(default),
    }
}

/// Parse a comma separated list of UUIDs.
fn parse_id_list(raw: &str) -> Result<Vec<Uuid>> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| Uuid::parse_str(s).with_context(|| format!("invalid uuid in list: {s}")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_list_parsing_skips_blanks() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let raw = format!(" {a}, ,{b} ");
        assert_eq!(parse_id_list(&raw).unwrap(), vec![a, b]);
        assert!(parse_id_list("").unwrap().is_empty());
    }

    #[test]
    fn malformed_ids_are_rejected() {
        assert!(parse_id_list("not-a-uuid").is_err());
    }
}
