//! Typed daemon settings extracted from the merged config JSON.

use std::net::SocketAddr;

use anyhow::{anyhow, Context, Result};
use serde_json::Value;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8899";
pub const DEFAULT_DB_URL_ENV: &str = "PACT_DATABASE_URL";
const DEFAULT_HEARTBEAT_SECS: u64 = 1;
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

const DEFAULT_CORS_ORIGINS: &[&str] = &[
    "http://localhost",
    "http://127.0.0.1",
    "http://localhost:3000",
    "http://127.0.0.1:3000",
    "http://localhost:5173",
    "http://127.0.0.1:5173",
];

/// Every pointer the daemon reads. Anything else in the config is reported
/// by `report_unused_keys`.
pub const DAEMON_CONSUMED_POINTERS: &[&str] = &[
    "/daemon/bind_addr",
    "/daemon/heartbeat_secs",
    "/daemon/cors_origins",
    "/database/url_env",
    "/database/max_connections",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    pub bind_addr: SocketAddr,
    pub heartbeat_secs: u64,
    pub cors_origins: Vec<String>,
    /// Name of the environment variable holding the database URL.
    pub database_url_env: String,
    pub max_connections: u32,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR
                .parse()
                .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 8899))),
            heartbeat_secs: DEFAULT_HEARTBEAT_SECS,
            cors_origins: DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect(),
            database_url_env: DEFAULT_DB_URL_ENV.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl DaemonConfig {
    /// Read daemon settings from merged config JSON; absent keys keep their
    /// defaults, present keys of the wrong shape are errors.
    pub fn from_config_json(v: &Value) -> Result<Self> {
        let mut cfg = Self::default();

        if let Some(raw) = v.pointer("/daemon/bind_addr") {
            let s = raw
                .as_str()
                .ok_or_else(|| anyhow!("/daemon/bind_addr must be a string"))?;
            cfg.bind_addr = s
                .parse()
                .with_context(|| format!("/daemon/bind_addr is not a socket address: {s}"))?;
        }

        if let Some(raw) = v.pointer("/daemon/heartbeat_secs") {
            let n = raw
                .as_u64()
                .ok_or_else(|| anyhow!("/daemon/heartbeat_secs must be a non-negative integer"))?;
            if n == 0 {
                return Err(anyhow!("/daemon/heartbeat_secs must be > 0"));
            }
            cfg.heartbeat_secs = n;
        }

        if let Some(raw) = v.pointer("/daemon/cors_origins") {
            let arr = raw
                .as_array()
                .ok_or_else(|| anyhow!("/daemon/cors_origins must be a list"))?;
            cfg.cors_origins = arr
                .iter()
                .map(|o| {
                    o.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| anyhow!("/daemon/cors_origins entries must be strings"))
                })
                .collect::<Result<Vec<_>>>()?;
        }

        if let Some(raw) = v.pointer("/database/url_env") {
            let s = raw
                .as_str()
                .filter(|s| !s.trim().is_empty())
                .ok_or_else(|| anyhow!("/database/url_env must be a non-empty string"))?;
            cfg.database_url_env = s.to_string();
        }

        if let Some(raw) = v.pointer("/database/max_connections") {
            let n = raw
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .filter(|n| *n > 0)
                .ok_or_else(|| anyhow!("/database/max_connections must be a positive integer"))?;
            cfg.max_connections = n;
        }

        Ok(cfg)
    }
}
