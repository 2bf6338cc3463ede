//! Configuration module
//!
//! Server settings loaded from the environment. Every component that needs a
//! value takes it as a plain constructor parameter, so only the binary calls
//! [`Config::from_env`].

use std::env;
use std::time::Duration;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);
const DEFAULT_RESULT_TTL: Duration = Duration::from_secs(5 * 60);
const DEFAULT_TOMBSTONE_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_HUB_WRITE_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_SCAN_MAX_PAGES: usize = 50;
const DEFAULT_SCAN_UPLOAD_MAX_BYTES: usize = 20 * 1024 * 1024;
const DEFAULT_RESULT_UPLOAD_MAX_BYTES: usize = 50 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    /// Public origin used to build phone-facing session URLs.
    pub base_url: String,
    pub api_keys: Vec<String>,
    pub environment: String,
    pub session_ttl: Duration,
    pub result_ttl: Duration,
    pub tombstone_ttl: Duration,
    pub sweep_interval: Duration,
    pub hub_write_timeout: Duration,
    pub scan_max_pages: usize,
    pub scan_upload_max_bytes: usize,
    pub result_upload_max_bytes: usize,
}

impl Config {
    /// Configuration with every optional setting at its default.
    pub fn new(base_url: impl Into<String>, api_keys: Vec<String>) -> Self {
        Self {
            server_port: DEFAULT_PORT,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_keys,
            environment: "development".to_string(),
            session_ttl: DEFAULT_SESSION_TTL,
            result_ttl: DEFAULT_RESULT_TTL,
            tombstone_ttl: DEFAULT_TOMBSTONE_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            hub_write_timeout: DEFAULT_HUB_WRITE_TIMEOUT,
            scan_max_pages: DEFAULT_SCAN_MAX_PAGES,
            scan_upload_max_bytes: DEFAULT_SCAN_UPLOAD_MAX_BYTES,
            result_upload_max_bytes: DEFAULT_RESULT_UPLOAD_MAX_BYTES,
        }
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let base_url =
            env::var("BASE_URL").map_err(|_| anyhow::anyhow!("BASE_URL must be set"))?;

        let api_keys: Vec<String> = env::var("API_KEYS")
            .map_err(|_| anyhow::anyhow!("API_KEYS must be set"))?
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let mut config = Config::new(base_url, api_keys);

        config.environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        config.server_port = env::var("PORT")
            .unwrap_or_else(|_| DEFAULT_PORT.to_string())
            .parse()
            .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?;

        config.session_ttl = duration_var("SESSION_TTL", DEFAULT_SESSION_TTL)?;
        config.result_ttl = duration_var("RESULT_TTL", DEFAULT_RESULT_TTL)?;
        config.tombstone_ttl = duration_var("TOMBSTONE_TTL", DEFAULT_TOMBSTONE_TTL)?;
        config.sweep_interval = duration_var("STORE_SWEEP_INTERVAL", DEFAULT_SWEEP_INTERVAL)?;
        config.hub_write_timeout = duration_var("HUB_WRITE_TIMEOUT", DEFAULT_HUB_WRITE_TIMEOUT)?;

        config.scan_max_pages = usize_var("SCAN_MAX_PAGES", DEFAULT_SCAN_MAX_PAGES)?;
        config.scan_upload_max_bytes =
            usize_var("SCAN_UPLOAD_MAX_BYTES", DEFAULT_SCAN_UPLOAD_MAX_BYTES)?;
        config.result_upload_max_bytes =
            usize_var("RESULT_UPLOAD_MAX_BYTES", DEFAULT_RESULT_UPLOAD_MAX_BYTES)?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.base_url.is_empty() {
            anyhow::bail!("BASE_URL cannot be empty");
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            anyhow::bail!("BASE_URL must start with http:// or https://");
        }
        if self.api_keys.is_empty() {
            anyhow::bail!("API_KEYS must contain at least one key");
        }
        if self.session_ttl.is_zero() {
            anyhow::bail!("SESSION_TTL must be greater than zero");
        }
        if self.result_ttl.is_zero() {
            anyhow::bail!("RESULT_TTL must be greater than zero");
        }
        if self.tombstone_ttl < self.session_ttl {
            anyhow::bail!("TOMBSTONE_TTL must be at least SESSION_TTL");
        }
        if self.sweep_interval.is_zero() {
            anyhow::bail!("STORE_SWEEP_INTERVAL must be greater than zero");
        }
        if self.scan_max_pages == 0 {
            anyhow::bail!("SCAN_MAX_PAGES must be greater than zero");
        }
        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }
}

/// Parses a duration string such as `30m`, `1h30m` or `100ms`.
pub fn parse_duration(value: &str) -> Result<Duration, humantime::DurationError> {
    humantime::parse_duration(value.trim())
}

fn duration_var(key: &str, default: Duration) -> Result<Duration, anyhow::Error> {
    match env::var(key) {
        Ok(value) => parse_duration(&value)
            .map_err(|e| anyhow::anyhow!("{} must be a duration like \"30m\": {}", key, e)),
        Err(_) => Ok(default),
    }
}

fn usize_var(key: &str, default: usize) -> Result<usize, anyhow::Error> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a positive integer", key)),
        Err(_) => Ok(default),
    }
}
