//! Database layer: migrations, the deployment record and the event journal.

use std::str::FromStr;

use crowd_tank::{LedgerEvent, Timestamp};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::errors::{ConsoleError, Result};

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };

    // Every connection to an in-memory database sees its own database.
    let max_connections = if url.contains(":memory:") { 1 } else { 5 };
    let options = SqliteConnectOptions::from_str(&url)?.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied successfully");
    Ok(pool)
}

// ─────────────────────────────────────────────────────────
// Deployment
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deployment {
    pub operator: String,
    pub commission_bps: u16,
    pub deployed_at: Timestamp,
}

pub async fn load_deployment(pool: &SqlitePool) -> Result<Option<Deployment>> {
    let row: Option<(String, i64, i64)> = sqlx::query_as(
        "SELECT operator, commission_bps, deployed_at FROM deployment WHERE id = 1",
    )
    .fetch_optional(pool)
    .await?;

    row.map(|(operator, commission_bps, deployed_at)| -> Result<Deployment> {
        Ok(Deployment {
            operator,
            commission_bps: u16::try_from(commission_bps).map_err(|_| {
                ConsoleError::Config(format!("Stored commission rate {commission_bps} is invalid"))
            })?,
            deployed_at: deployed_at.max(0) as Timestamp,
        })
    })
    .transpose()
}

/// Write the deployment row. Fails if one already exists.
pub async fn save_deployment(pool: &SqlitePool, deployment: &Deployment) -> Result<()> {
    if let Some(existing) = load_deployment(pool).await? {
        return Err(ConsoleError::AlreadyDeployed {
            operator: existing.operator,
            commission_bps: existing.commission_bps,
        });
    }
    sqlx::query(
        "INSERT INTO deployment (id, operator, commission_bps, deployed_at, observed_at) VALUES (1, ?1, ?2, ?3, ?3)",
    )
        .bind(&deployment.operator)
        .bind(i64::from(deployment.commission_bps))
        .bind(deployment.deployed_at as i64)
        .execute(pool)
        .await?;
    Ok(())
}

/// Latest time any command has run at, or 0 before deployment.
pub async fn load_observed_at(pool: &SqlitePool) -> Result<Timestamp> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT observed_at FROM deployment WHERE id = 1")
        .fetch_optional(pool)
        .await?;
    Ok(row.map_or(0, |(at,)| at.max(0) as Timestamp))
}

// ─────────────────────────────────────────────────────────
// Event writes
// ─────────────────────────────────────────────────────────

/// Append `events` after journal entry `head` and raise the stored
/// `observed_at` watermark, in one transaction.
///
/// Fails with [`ConsoleError::Conflict`] if the journal no longer ends at
/// `head`, and with [`ConsoleError::ClockRewind`] if another command has
/// already run later than the first event. The check and the writes share a
/// transaction, so a writer that commits in between makes SQLite refuse ours
/// instead of interleaving. Returns the new head.
pub async fn append_events(
    pool: &SqlitePool,
    head: i64,
    observed_at: Timestamp,
    events: &[LedgerEvent],
) -> Result<i64> {
    let mut tx = pool.begin().await?;

    let (found, watermark): (i64, i64) = sqlx::query_as(
        r#"
        SELECT (SELECT COALESCE(MAX(seq), 0) FROM events),
               COALESCE((SELECT observed_at FROM deployment WHERE id = 1), 0)
        "#,
    )
    .fetch_one(&mut *tx)
    .await?;

    if let Some(first) = events.first() {
        if found != head {
            return Err(ConsoleError::Conflict {
                expected: head,
                found,
            });
        }
        let latest = watermark.max(0) as Timestamp;
        if latest > first.at() {
            return Err(ConsoleError::ClockRewind {
                now: first.at(),
                latest,
            });
        }
    }

    let mut last = head;
    for ev in events {
        let inserted = sqlx::query(
            r#"
            INSERT INTO events
                (event_type, project_id, actor, amount, timestamp, payload)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(ev.kind().as_str())
        .bind(ev.project_id().map(|id| id as i64))
        .bind(ev.actor().map(|who| who.to_string()))
        .bind(ev.amount().map(|amount| amount.to_string()))
        .bind(ev.at() as i64)
        .bind(serde_json::to_string(ev)?)
        .execute(&mut *tx)
        .await?;
        last = inserted.last_insert_rowid();
    }

    sqlx::query("UPDATE deployment SET observed_at = MAX(observed_at, ?1) WHERE id = 1")
        .bind(observed_at as i64)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(last)
}

// ─────────────────────────────────────────────────────────
// Event reads
// ─────────────────────────────────────────────────────────

/// A journal row as stored in / read from the database.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct EventRecord {
    pub seq: i64,
    pub event_type: String,
    pub project_id: Option<i64>,
    pub actor: Option<String>,
    pub amount: Option<String>,
    pub timestamp: i64,
    pub payload: String,
    pub created_at: i64,
}

impl EventRecord {
    pub fn decode(&self) -> Result<LedgerEvent> {
        Ok(serde_json::from_str(&self.payload)?)
    }
}

/// Fetch the whole journal in replay order.
pub async fn get_all_events(pool: &SqlitePool) -> Result<Vec<EventRecord>> {
    let rows = sqlx::query_as::<_, EventRecord>(
        r#"
        SELECT seq, event_type, project_id, actor, amount, timestamp, payload, created_at
        FROM   events
        ORDER  BY seq ASC
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Fetch all events for a given project, in replay order.
pub async fn get_events_for_project(pool: &SqlitePool, project_id: u64) -> Result<Vec<EventRecord>> {
    let rows = sqlx::query_as::<_, EventRecord>(
        r#"
        SELECT seq, event_type, project_id, actor, amount, timestamp, payload, created_at
        FROM   events
        WHERE  project_id = ?1
        ORDER  BY seq ASC
        "#,
    )
    .bind(project_id as i64)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
