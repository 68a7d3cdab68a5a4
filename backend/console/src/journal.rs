//! Rebuilds a live [`Ledger`] from the persisted journal and appends new events.
//!
//! The ledger itself is in-memory. Every accepted operation emits one event;
//! replaying those events in order, with the clock set to each event's
//! timestamp, re-runs the same operations against the same state and
//! therefore reproduces the ledger exactly. Any replayed result that differs
//! from what was recorded aborts with [`ConsoleError::Journal`].

use std::sync::Arc;

use crowd_tank::{BalanceBook, Clock, Ledger, LedgerConfig, LedgerEvent, ManualClock, Timestamp};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::db::{self, Deployment, EventRecord};
use crate::errors::{ConsoleError, Result};

/// A ledger rebuilt from the journal, plus where the journal ended.
///
/// After a [`ConsoleError::Conflict`] the session is stale and must be
/// reopened.
pub struct Session {
    pub ledger: Ledger<Arc<BalanceBook>>,
    pub deployment: Deployment,
    clock: Arc<ManualClock>,
    pool: SqlitePool,
    /// `seq` of the last journal entry this session has replayed or written.
    head: i64,
    /// Watermark last persisted by this session.
    observed_at: Timestamp,
}

impl Session {
    /// Load the deployment and replay the full journal.
    pub async fn open(pool: SqlitePool) -> Result<Self> {
        let deployment = db::load_deployment(&pool)
            .await?
            .ok_or(ConsoleError::NotDeployed)?;
        let config = LedgerConfig::new(deployment.operator.as_str(), deployment.commission_bps)?;

        let clock = Arc::new(ManualClock::new(deployment.deployed_at));
        let ledger = Ledger::new(config, clock.clone(), Arc::new(BalanceBook::new()));

        let records = db::get_all_events(&pool).await?;
        for record in &records {
            replay(&ledger, &clock, record)?;
        }
        // Replayed events are already persisted.
        ledger.drain_events();

        let observed_at = db::load_observed_at(&pool).await?.max(clock.now());
        clock.set(observed_at);
        let head = records.last().map_or(0, |record| record.seq);
        info!(events = records.len(), projects = ledger.total_projects(), head, "journal replayed");

        Ok(Self {
            ledger,
            deployment,
            clock,
            pool,
            head,
            observed_at,
        })
    }

    /// Set the time observed by the next operation. Time never moves back
    /// past anything already recorded or observed.
    pub fn set_now(&self, now: Timestamp) -> Result<()> {
        let latest = self.clock.now();
        if now < latest {
            return Err(ConsoleError::ClockRewind { now, latest });
        }
        self.clock.set(now);
        Ok(())
    }

    /// Persist every event emitted since the last commit, and the time they
    /// were observed at.
    pub async fn commit(&mut self) -> Result<usize> {
        let events = self.ledger.drain_events();
        let now = self.clock.now();
        if events.is_empty() && now <= self.observed_at {
            return Ok(0);
        }
        self.head = db::append_events(&self.pool, self.head, now, &events).await?;
        self.observed_at = now;
        debug!(written = events.len(), head = self.head, "journal appended");
        Ok(events.len())
    }
}

fn replay(ledger: &Ledger<Arc<BalanceBook>>, clock: &ManualClock, record: &EventRecord) -> Result<()> {
    let event = record.decode()?;
    let diverged = |reason: String| ConsoleError::Journal {
        seq: record.seq,
        reason,
    };
    if event.at() < clock.now() {
        return Err(diverged(format!(
            "recorded at {}, before the previous entry at {}",
            event.at(),
            clock.now()
        )));
    }
    clock.set(event.at());

    match &event {
        LedgerEvent::ProjectCreated {
            project_id,
            owner,
            goal,
            duration_secs,
            ..
        } => {
            let id = ledger.create_project(owner.clone(), *goal, *duration_secs)?;
            if id != *project_id {
                return Err(diverged(format!("created project {id}, expected {project_id}")));
            }
        }
        LedgerEvent::ProjectFunded {
            project_id,
            contributor,
            amount,
            ..
        } => ledger.fund_project(*project_id, contributor, *amount)?,
        LedgerEvent::DeadlineExtended {
            project_id,
            caller,
            additional_secs,
            ..
        } => {
            ledger.enhance_deadline(*project_id, caller, *additional_secs)?;
        }
        LedgerEvent::ProjectSettled { project_id, .. } => {
            ledger.settle_project(*project_id)?;
        }
        LedgerEvent::CommissionWithdrawn { operator, .. } => {
            ledger.withdraw_commission(operator)?;
        }
    }

    // The replayed operation must have emitted exactly the recorded event.
    let emitted = ledger.drain_events();
    if emitted.as_slice() != std::slice::from_ref(&event) {
        return Err(diverged(format!("replayed {emitted:?}, recorded {event:?}")));
    }
    Ok(())
}
