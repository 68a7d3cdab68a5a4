//! Application-wide error types.

use crowd_tank::Timestamp;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Ledger error: {0}")]
    Ledger(#[from] crowd_tank::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Ledger has not been deployed; run `crowdtank deploy` first")]
    NotDeployed,

    #[error("Ledger is already deployed (operator {operator}, {commission_bps} bps)")]
    AlreadyDeployed {
        operator: String,
        commission_bps: u16,
    },

    #[error("Journal replay diverged at event #{seq}: {reason}")]
    Journal { seq: i64, reason: String },

    #[error("Journal advanced to event #{found} while this command ran from #{expected}; run it again")]
    Conflict { expected: i64, found: i64 },

    #[error("Time {now} is earlier than {latest}, which the ledger has already observed")]
    ClockRewind { now: Timestamp, latest: Timestamp },
}

pub type Result<T> = std::result::Result<T, ConsoleError>;
