use std::{env, fmt::Display, str::FromStr, time::Duration};

use anyhow::{Context, Result};
use til_board::ResponseOrdering;
use tracing::info;

/// Settings read from the environment at start-up.
#[derive(Debug, Clone)]
pub struct Config {
    /// Embedded table used when no hosted store is configured.
    pub db_path: String,
    pub store: Option<HostedStore>,
    pub response_ordering: ResponseOrdering,
}

/// Hosted PostgREST table.
#[derive(Clone)]
pub struct HostedStore {
    pub url: String,
    pub api_key: String,
    pub table: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for HostedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostedStore")
            .field("url", &self.url)
            .field("api_key", &"<redacted>")
            .field("table", &self.table)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let store = match var("TIL_STORE_URL") {
            Some(url) => Some(HostedStore {
                url,
                api_key: var("TIL_STORE_KEY")
                    .context("TIL_STORE_KEY is required when TIL_STORE_URL is set")?,
                table: try_load("TIL_STORE_TABLE", "facts")?,
                timeout: Duration::from_secs(try_load("TIL_STORE_TIMEOUT_SECS", "10")?),
            }),
            None => None,
        };

        Ok(Self {
            db_path: try_load("TIL_MCP_DB_PATH", "./til-mcp.redb")?,
            store,
            response_ordering: try_load("TIL_RESPONSE_ORDERING", "completion")?,
        })
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    let raw = var(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    raw.parse()
        .map_err(|e| anyhow::anyhow!("invalid {key} value {raw:?}: {e}"))
}
