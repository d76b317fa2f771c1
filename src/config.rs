use std::net::IpAddr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub remote_api_url: String,
    pub remote_api_key: Option<String>,
    pub host: IpAddr,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub max_payload_size: usize,
    pub sync_interval: Duration,
    pub request_timeout: Duration,
    pub max_attempts: Option<i64>,
    pub probe: Option<ProbeConfig>,
    pub start_online: bool,
    pub log_level: String,
}

#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub url: String,
    pub interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url = env_or("SYNCQUEUE_DATABASE_URL", "sqlite://syncqueue.db?mode=rwc");
        let jwt_secret = env_required("SYNCQUEUE_JWT_SECRET")?;
        let jwt_audience = env_or("SYNCQUEUE_JWT_AUDIENCE", "authenticated");
        let remote_api_url = env_required("SYNCQUEUE_REMOTE_API_URL")?;
        let remote_api_key = std::env::var("SYNCQUEUE_REMOTE_API_KEY")
            .ok()
            .filter(|s| !s.is_empty());

        let host: IpAddr = env_or("SYNCQUEUE_HOST", "127.0.0.1")
            .parse()
            .map_err(|e| format!("Invalid SYNCQUEUE_HOST: {e}"))?;

        let port: u16 = env_or("SYNCQUEUE_PORT", "4010")
            .parse()
            .map_err(|e| format!("Invalid SYNCQUEUE_PORT: {e}"))?;

        let cors_origins: Vec<String> = env_or("SYNCQUEUE_CORS_ORIGINS", "http://localhost:3000")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let max_payload_size: usize = env_or("SYNCQUEUE_MAX_PAYLOAD_SIZE", "65536")
            .parse()
            .map_err(|e| format!("Invalid SYNCQUEUE_MAX_PAYLOAD_SIZE: {e}"))?;

        let sync_interval = env_secs("SYNCQUEUE_SYNC_INTERVAL_SECS", "30")?;
        let request_timeout = env_secs("SYNCQUEUE_REQUEST_TIMEOUT_SECS", "30")?;

        let max_attempts = match std::env::var("SYNCQUEUE_MAX_ATTEMPTS") {
            Ok(v) if !v.trim().is_empty() => {
                let max: i64 = v
                    .trim()
                    .parse()
                    .map_err(|e| format!("Invalid SYNCQUEUE_MAX_ATTEMPTS: {e}"))?;
                if max < 1 {
                    return Err("SYNCQUEUE_MAX_ATTEMPTS must be at least 1".to_string());
                }
                Some(max)
            }
            _ => None,
        };

        let probe = match std::env::var("SYNCQUEUE_PROBE_URL").ok().filter(|s| !s.is_empty()) {
            Some(url) => Some(ProbeConfig {
                url,
                interval: env_secs("SYNCQUEUE_PROBE_INTERVAL_SECS", "15")?,
            }),
            None => None,
        };

        let start_online = match env_or("SYNCQUEUE_START_ONLINE", "true").as_str() {
            "false" | "0" | "no" => false,
            _ => true,
        };

        let log_level = env_or("SYNCQUEUE_LOG_LEVEL", "info");

        Ok(Config {
            database_url,
            jwt_secret,
            jwt_audience,
            remote_api_url,
            remote_api_key,
            host,
            port,
            cors_origins,
            max_payload_size,
            sync_interval,
            request_timeout,
            max_attempts,
            probe,
            start_online,
            log_level,
        })
    }
}

fn env_required(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("Missing required environment variable: {key}"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_secs(key: &str, default: &str) -> Result<Duration, String> {
    let secs: u64 = env_or(key, default)
        .parse()
        .map_err(|e| format!("Invalid {key}: {e}"))?;
    if secs == 0 {
        return Err(format!("{key} must be greater than zero"));
    }
    Ok(Duration::from_secs(secs))
}
