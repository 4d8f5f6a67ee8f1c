use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
    #[error("REDIS_URL is required when SESSION_BACKEND=redis")]
    MissingRedisUrl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionBackendKind {
    Memory,
    Redis,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub data_file: PathBuf,
    pub session_idle_timeout_secs: u64,
    pub session_backend: SessionBackendKind,
    pub redis_url: Option<String>,
    pub session_store_timeout_ms: u64,
    pub bcrypt_cost: u32,
    pub rate_limit_window_secs: u64,
    pub rate_limit_requests: u32,
    pub trust_proxy_headers: bool,
    pub production: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "0.0.0.0".into(),
            server_port: 3000,
            data_file: PathBuf::from("data/db.json"),
            session_idle_timeout_secs: 3600,
            session_backend: SessionBackendKind::Memory,
            redis_url: None,
            session_store_timeout_ms: 500,
            bcrypt_cost: 10,
            rate_limit_window_secs: 15 * 60,
            rate_limit_requests: 100,
            trust_proxy_headers: false,
            production: false,
        }
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
            name,
            value: raw,
        }),
        Err(_) => Ok(default),
    }
}

fn parse_bool(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(name) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid { name, value: raw }),
        },
        Err(_) => Ok(default),
    }
}

/// 当前时间加上空闲超时不能越出 chrono 的时间范围
fn idle_timeout_fits(secs: u64) -> bool {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .and_then(|ttl| chrono::Utc::now().checked_add_signed(ttl))
        .is_some()
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        let defaults = Config::default();

        let session_backend = match env::var("SESSION_BACKEND") {
            Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "memory" => SessionBackendKind::Memory,
                "redis" => SessionBackendKind::Redis,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "SESSION_BACKEND",
                        value: raw,
                    });
                }
            },
            Err(_) => defaults.session_backend,
        };
        let redis_url = env::var("REDIS_URL").ok().filter(|v| !v.trim().is_empty());
        if session_backend == SessionBackendKind::Redis && redis_url.is_none() {
            return Err(ConfigError::MissingRedisUrl);
        }

        let bcrypt_cost = parse_var("BCRYPT_COST", defaults.bcrypt_cost)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid {
                name: "BCRYPT_COST",
                value: bcrypt_cost.to_string(),
            });
        }

        let session_idle_timeout_secs =
            parse_var("SESSION_IDLE_TIMEOUT", defaults.session_idle_timeout_secs)?;
        let rate_limit_window_secs = parse_var("RATE_LIMIT_WINDOW", defaults.rate_limit_window_secs)?;
        if session_idle_timeout_secs == 0 || rate_limit_window_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "SESSION_IDLE_TIMEOUT/RATE_LIMIT_WINDOW",
                value: "0".into(),
            });
        }
        if !idle_timeout_fits(session_idle_timeout_secs) {
            return Err(ConfigError::Invalid {
                name: "SESSION_IDLE_TIMEOUT",
                value: session_idle_timeout_secs.to_string(),
            });
        }

        Ok(Config {
            server_host: env::var("SERVER_HOST").unwrap_or(defaults.server_host),
            server_port: parse_var("SERVER_PORT", defaults.server_port)?,
            data_file: env::var("DATA_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_file),
            session_idle_timeout_secs,
            session_backend,
            redis_url,
            session_store_timeout_ms: parse_var(
                "SESSION_STORE_TIMEOUT_MS",
                defaults.session_store_timeout_ms,
            )?,
            bcrypt_cost,
            rate_limit_window_secs,
            rate_limit_requests: parse_var("RATE_LIMIT_REQUESTS", defaults.rate_limit_requests)?,
            trust_proxy_headers: parse_bool("TRUST_PROXY_HEADERS", defaults.trust_proxy_headers)?,
            production: env::var("APP_ENV")
                .map(|v| v.eq_ignore_ascii_case("production"))
                .unwrap_or(defaults.production),
        })
    }

    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_timeout_secs)
    }

    pub fn session_store_timeout(&self) -> Duration {
        Duration::from_millis(self.session_store_timeout_ms)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }
}
