use crate::auth::{DEFAULT_ITERATIONS, DEFAULT_SESSION_TTL_SECS};
use anyhow::{Context, Result};
use derive_getters::Getters;
use std::net::SocketAddr;
use std::str::FromStr;

const DEFAULT_DATABASE_URL: &str = "sqlite://instance/site.db?mode=rwc";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_MAX_DB_CONNECTIONS: u32 = 5;

/// Process configuration, read from the environment (and `.env` when present).
#[derive(Debug, Clone, Getters)]
pub struct Config {
    database_url: String,
    bind_addr: SocketAddr,
    password_iterations: u32,
    max_db_connections: u32,
    session_ttl_secs: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            bind_addr: parse_or(&lookup, "BIND_ADDR", DEFAULT_BIND_ADDR.parse()?)?,
            password_iterations: parse_or(&lookup, "PASSWORD_ITERATIONS", DEFAULT_ITERATIONS)?,
            max_db_connections: parse_or(
                &lookup,
                "MAX_DB_CONNECTIONS",
                DEFAULT_MAX_DB_CONNECTIONS,
            )?,
            session_ttl_secs: parse_or(&lookup, "SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?,
        })
    }

    /// Directory that must exist before a file-backed SQLite URL can be opened.
    pub fn sqlite_dir(&self) -> Option<std::path::PathBuf> {
        let path = self.database_url.strip_prefix("sqlite://")?;
        let path = path.split('?').next().unwrap_or(path);
        if path.is_empty() || path.starts_with(':') {
            return None;
        }
        std::path::Path::new(path)
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(|dir| dir.to_path_buf())
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        None => Ok(default),
    }
}
