use std::env;
use std::fmt::Display;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

/// Where the hosted auth provider lives.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Project URL, without a trailing slash.
    pub url: String,
    /// Public (anonymous) API key sent with every request.
    pub anon_key: String,
}

/// Fixed delays used while reconciling a callback without an exchangeable code.
#[derive(Debug, Clone, Copy)]
pub struct CallbackTiming {
    /// How long to wait before polling for an existing session.
    pub poll_delay: Duration,
    /// How long to wait for any signal before giving up.
    pub timeout: Duration,
}

impl Default for CallbackTiming {
    fn default() -> Self {
        CallbackTiming {
            poll_delay: Duration::from_millis(500),
            timeout: Duration::from_millis(2000),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub database_url: String,
    pub pool_size: u32,
    pub backend: BackendConfig,
    /// Public URL of the front end; used for CORS and for email redirect links.
    pub site_url: String,
    pub secure_cookies: bool,
    pub callback: CallbackTiming,
    pub search_debounce: Duration,
}

#[derive(Debug, Display)]
pub enum ConfigError {
    #[display(fmt = "${} must be set", _0)]
    Missing(&'static str),

    #[display(fmt = "Failed to parse ${}: {}", _0, _1)]
    Invalid(&'static str, String),
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Read the configuration from the environment (after `.env` has been loaded).
    pub fn from_env() -> Result<Config, ConfigError> {
        // Read the IP address and port on which to listen.
        let ip: IpAddr = parse_or("LISTEN_IP", "127.0.0.1")?;
        let port: u16 = parse_or("PORT", "1234")?;

        Ok(Config {
            listen_addr: SocketAddr::new(ip, port),
            database_url: required("DATABASE_URL")?,
            pool_size: parse_or("DATABASE_POOL_SIZE", "4")?,
            backend: BackendConfig {
                url: required("BACKEND_URL")?.trim_end_matches('/').to_owned(),
                anon_key: required("BACKEND_ANON_KEY")?,
            },
            site_url: env::var("SITE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into())
                .trim_end_matches('/')
                .to_owned(),
            secure_cookies: parse_or("SECURE_COOKIES", "false")?,
            callback: CallbackTiming {
                poll_delay: millis_or("CALLBACK_POLL_DELAY_MS", 500)?,
                timeout: millis_or("CALLBACK_TIMEOUT_MS", 2000)?,
            },
            search_debounce: millis_or("SEARCH_DEBOUNCE_MS", 300)?,
        })
    }

    /// Absolute URL of a path on the front end.
    pub fn site_link(&self, path: &str) -> String {
        format!("{}{}", self.site_url, path)
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::Missing(key)),
    }
}

fn parse_or<T>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        debug!("{} not set, using default: {}", key, default);
        default.to_owned()
    });

    raw.parse()
        .map_err(|e: T::Err| ConfigError::Invalid(key, e.to_string()))
}

fn millis_or(key: &'static str, default: u64) -> Result<Duration, ConfigError> {
    parse_or::<u64>(key, &default.to_string()).map(Duration::from_millis)
}
