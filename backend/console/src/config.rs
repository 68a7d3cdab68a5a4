//! Application configuration loaded from environment variables.

use crowd_tank::Timestamp;

use crate::errors::{ConsoleError, Result};

#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite database holding the deployment and the journal
    pub database_url: String,
    /// Identity used as the caller when `--caller` is not given
    pub caller: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            database_url: env_var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./crowdtank.db".to_string()),
            caller: env_var("CROWDTANK_CALLER").ok(),
        })
    }
}

/// Fixed clock reading (unix seconds) instead of wall time. The `--at` flag
/// wins; `CROWDTANK_NOW` is only read and validated without it.
pub fn fixed_now(flag: Option<Timestamp>) -> Result<Option<Timestamp>> {
    pick_now(flag, || env_var("CROWDTANK_NOW").ok())
}

fn pick_now(
    flag: Option<Timestamp>,
    env: impl FnOnce() -> Option<String>,
) -> Result<Option<Timestamp>> {
    if flag.is_some() {
        return Ok(flag);
    }
    env()
        .map(|raw| {
            raw.parse::<Timestamp>()
                .map_err(|_| ConsoleError::Config(format!("Invalid CROWDTANK_NOW: {raw}")))
        })
        .transpose()
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| ConsoleError::Config(format!("Missing env var: {key}")))
}
