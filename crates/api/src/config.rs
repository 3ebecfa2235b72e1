//! Process configuration read from the environment at startup.

use shopdesk_infra::EngineConfig;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: String,
    pub jwt_secret: String,
    /// Postgres connection string; the in-memory store is used when unset.
    pub database_url: Option<String>,
    pub engine: EngineConfig,
}

impl ApiConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let jwt_secret = lookup("JWT_SECRET").filter(|s| !s.is_empty()).unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });

        Self {
            bind_addr: lookup("SHOPDESK_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            jwt_secret,
            database_url: lookup("DATABASE_URL").filter(|s| !s.trim().is_empty()),
            engine: EngineConfig::from_lookup(&lookup),
        }
    }
}
