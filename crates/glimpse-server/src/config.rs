use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use glimpse_api::identity::GOOGLE_TOKENINFO_URL;
use glimpse_api::middleware::DEFAULT_SESSION_COOKIE;
use glimpse_api::token::DEFAULT_TOKEN_TTL_DAYS;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

/// Upper bound on session lifetime. Keeps `now + ttl` well inside chrono's range.
const MAX_TOKEN_TTL_DAYS: i64 = 3650;

/// Process-wide settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub token_ttl_days: i64,
    pub session_cookie: String,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub tokeninfo_url: String,
    pub image_upload_url: Option<String>,
    pub image_upload_preset: Option<String>,
    pub cors_origin: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let jwt_secret = get("GLIMPSE_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("GLIMPSE_JWT_SECRET is unset or still a placeholder");
        }

        let host = var("GLIMPSE_HOST", "0.0.0.0");
        let port: u16 = var("GLIMPSE_PORT", "4000")
            .parse()
            .context("GLIMPSE_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .context("GLIMPSE_HOST must be an IP address")?;

        let token_ttl_days: i64 = var("GLIMPSE_TOKEN_TTL_DAYS", &DEFAULT_TOKEN_TTL_DAYS.to_string())
            .parse()
            .context("GLIMPSE_TOKEN_TTL_DAYS must be a whole number of days")?;
        if !(1..=MAX_TOKEN_TTL_DAYS).contains(&token_ttl_days) {
            bail!(
                "GLIMPSE_TOKEN_TTL_DAYS must be between 1 and {}",
                MAX_TOKEN_TTL_DAYS
            );
        }

        Ok(Self {
            jwt_secret,
            token_ttl_days,
            session_cookie: var("GLIMPSE_SESSION_COOKIE", DEFAULT_SESSION_COOKIE),
            db_path: var("GLIMPSE_DB_PATH", "glimpse.db").into(),
            addr,
            tokeninfo_url: var("GLIMPSE_TOKENINFO_URL", GOOGLE_TOKENINFO_URL),
            image_upload_url: get("GLIMPSE_IMAGE_UPLOAD_URL").filter(|v| !v.is_empty()),
            image_upload_preset: get("GLIMPSE_IMAGE_UPLOAD_PRESET").filter(|v| !v.is_empty()),
            cors_origin: get("GLIMPSE_CORS_ORIGIN").filter(|v| !v.is_empty()),
        })
    }
}
