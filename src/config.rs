use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_MODEL: &str = "mistral:latest";
pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_AVAILABILITY_TTL_SECS: u64 = 30;

/// Process settings, read once at startup.
///
/// Values come from the environment; a `.env` file in the working directory
/// is honoured through `dotenvy`. There is no reload.
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: IpAddr,
    pub port: u16,
    pub model: String,
    pub ollama_base_url: String,
    pub generation_timeout: Duration,
    /// Zero means the backend is checked before every generation request.
    pub availability_ttl: Duration,
    pub prompt_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: IpAddr::from([0, 0, 0, 0]),
            port: DEFAULT_PORT,
            model: DEFAULT_MODEL.to_string(),
            ollama_base_url: DEFAULT_OLLAMA_BASE_URL.to_string(),
            generation_timeout: Duration::from_secs(DEFAULT_GENERATION_TIMEOUT_SECS),
            availability_ttl: Duration::from_secs(DEFAULT_AVAILABILITY_TTL_SECS),
            prompt_dir: None,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| dotenvy::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = get("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let host: IpAddr = host
            .trim()
            .parse()
            .map_err(|e| anyhow!("invalid HOST {host:?}: {e}"))?;

        let port = match get("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .with_context(|| format!("invalid PORT {raw:?}"))?,
            None => DEFAULT_PORT,
        };

        let model = get("OLLAMA_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let ollama_base_url = get("OLLAMA_BASE_URL")
            .unwrap_or_else(|| DEFAULT_OLLAMA_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let generation_timeout = Duration::from_secs(parse_secs(
            get("GENERATION_TIMEOUT_SECS"),
            "GENERATION_TIMEOUT_SECS",
            DEFAULT_GENERATION_TIMEOUT_SECS,
        )?);
        if generation_timeout.is_zero() {
            return Err(anyhow!("GENERATION_TIMEOUT_SECS must be at least 1"));
        }

        let availability_ttl = Duration::from_secs(parse_secs(
            get("AVAILABILITY_TTL_SECS"),
            "AVAILABILITY_TTL_SECS",
            DEFAULT_AVAILABILITY_TTL_SECS,
        )?);

        let prompt_dir = get("PROMPT_DIR").map(PathBuf::from);

        Ok(Self {
            host,
            port,
            model,
            ollama_base_url,
            generation_timeout,
            availability_ttl,
            prompt_dir,
        })
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_secs(raw: Option<String>, key: &str, default: u64) -> Result<u64> {
    match raw {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .with_context(|| format!("invalid {key} {raw:?}")),
        None => Ok(default),
    }
}
