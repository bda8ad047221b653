//! Process configuration

use anyhow::Context;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    /// Endpoint signing secret (`whsec_...`)
    pub webhook_secret: String,
    /// Path segment the webhook URL must carry; requests with any other id
    /// are rejected before verification
    pub webhook_endpoint_id: Uuid,
}

impl Config {
    /// Load configuration from the environment, failing fast on anything
    /// required that is missing or malformed.
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let webhook_secret = std::env::var("LITESTRIPE_WEBHOOK_SECRET")
            .context("LITESTRIPE_WEBHOOK_SECRET must be set")?;
        let webhook_endpoint_id = std::env::var("LITESTRIPE_WEBHOOK_UUID")
            .context("LITESTRIPE_WEBHOOK_UUID must be set")?
            .parse::<Uuid>()
            .context("LITESTRIPE_WEBHOOK_UUID must be a valid UUID")?;
        let bind_addr =
            std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        Ok(Self {
            database_url,
            bind_addr,
            webhook_secret,
            webhook_endpoint_id,
        })
    }
}
