//! # CrowdTank Ledger
//!
//! Campaign funding ledger: custodies contributions, enforces per-project
//! deadlines, settles each project exactly once and accrues an operator
//! commission on successful campaigns.
//!
//! | Phase        | Entry Point(s)                                            |
//! |--------------|-----------------------------------------------------------|
//! | Bootstrap    | [`LedgerConfig::new`], [`Ledger::new`]                    |
//! | Registration | [`Ledger::create_project`]                                |
//! | Funding      | [`Ledger::fund_project`], [`Ledger::enhance_deadline`]    |
//! | Settlement   | [`Ledger::settle_project`]                                |
//! | Commission   | [`Ledger::withdraw_commission`]                           |
//! | Queries      | `remaining_time`, `successful_projects`, `failed_projects`, `project`, `status` |
//!
//! ## Architecture
//!
//! Time comes from an injected [`Clock`], outbound funds go through a
//! [`CreditSink`]. State lives in [`storage`]; the only status mutation is
//! settlement, everything else is derived by [`classify`].

mod clock;
mod credit;
mod errors;
mod events;
mod storage;
mod types;

#[cfg(test)]
mod test_settlement;

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

pub use clock::{Clock, ManualClock, SystemClock};
pub use credit::{BalanceBook, CreditSink};
pub use errors::{Error, Result};
pub use events::{EventKind, LedgerEvent};
pub use types::{
    classify, split_commission, Amount, CreditReason, Identity, Outcome, Project, ProjectId,
    ProjectStatus, Settlement, Timestamp, BASIS_POINTS_DENOMINATOR,
};

use storage::{ProjectRegistry, Totals};

/// Deployment-time configuration, fixed for the ledger's lifetime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerConfig {
    operator: Identity,
    commission_rate_bps: u16,
}

impl LedgerConfig {
    /// `commission_rate_bps` must be within `0..=10000`.
    pub fn new(operator: impl Into<Identity>, commission_rate_bps: u16) -> Result<Self> {
        if commission_rate_bps > BASIS_POINTS_DENOMINATOR {
            return Err(Error::InvalidParameters(
                "commission rate must not exceed 10000 basis points",
            ));
        }
        Ok(Self {
            operator: operator.into(),
            commission_rate_bps,
        })
    }

    pub fn operator(&self) -> &Identity {
        &self.operator
    }

    pub fn commission_rate_bps(&self) -> u16 {
        self.commission_rate_bps
    }
}

pub struct Ledger<S = BalanceBook> {
    config: LedgerConfig,
    clock: Arc<dyn Clock>,
    sink: S,
    registry: ProjectRegistry,
    totals: Mutex<Totals>,
    journal: Mutex<Vec<LedgerEvent>>,
}

impl<S: CreditSink> Ledger<S> {
    pub fn new(config: LedgerConfig, clock: Arc<dyn Clock>, sink: S) -> Self {
        info!(
            operator = %config.operator,
            commission_rate_bps = config.commission_rate_bps,
            "ledger initialised"
        );
        Self {
            config,
            clock,
            sink,
            registry: ProjectRegistry::default(),
            totals: Mutex::new(Totals::default()),
            journal: Mutex::new(Vec::new()),
        }
    }

    // ─────────────────────────────────────────────────────────
    // Registration
    // ─────────────────────────────────────────────────────────

    /// Register a new project owned by `owner`, open for `duration_secs`.
    pub fn create_project(
        &self,
        owner: Identity,
        goal: Amount,
        duration_secs: u64,
    ) -> Result<ProjectId> {
        if goal == 0 {
            return Err(Error::InvalidParameters("goal must be greater than zero"));
        }
        if duration_secs == 0 {
            return Err(Error::InvalidParameters("duration must be greater than zero"));
        }

        let now = self.clock.now();
        let deadline = now
            .checked_add(duration_secs)
            .ok_or(Error::Overflow("project deadline"))?;

        let id = self.registry.insert_with(|id| {
            let project = Project::new(id, owner.clone(), goal, deadline, now);
            self.journal.lock().push(LedgerEvent::ProjectCreated {
                project_id: id,
                owner: owner.clone(),
                goal,
                duration_secs,
                deadline,
                at: now,
            });
            Ok((project, id))
        })?;

        info!(project_id = id, %owner, goal, deadline, "project created");
        Ok(id)
    }

    // ─────────────────────────────────────────────────────────
    // Funding
    // ─────────────────────────────────────────────────────────

    /// Record a contribution of `amount` from `contributor`.
    ///
    /// The funds enter custody in the same step as the accounting update.
    pub fn fund_project(&self, id: ProjectId, contributor: &Identity, amount: Amount) -> Result<()> {
        let cell = self.registry.get(id)?;
        if amount == 0 {
            return Err(Error::InvalidAmount);
        }

        let mut project = cell.lock();
        let now = self.clock.now();
        if !project.is_open(now) {
            return Err(Error::ProjectClosed(id));
        }

        let raised = project
            .raised
            .checked_add(amount)
            .ok_or(Error::Overflow("project raised total"))?;
        let contributed = project
            .contribution_of(contributor)
            .checked_add(amount)
            .ok_or(Error::Overflow("contribution total"))?;

        let mut totals = self.totals.lock();
        let custody = totals
            .custody
            .checked_add(amount)
            .ok_or(Error::Overflow("ledger custody"))?;

        project.raised = raised;
        project.contributions.insert(contributor.clone(), contributed);
        totals.custody = custody;
        self.journal.lock().push(LedgerEvent::ProjectFunded {
            project_id: id,
            contributor: contributor.clone(),
            amount,
            raised,
            at: now,
        });

        debug!(project_id = id, %contributor, amount, raised, "contribution accepted");
        Ok(())
    }

    /// Push the deadline of an open project back by `additional_secs`.
    ///
    /// Only the owner may extend, and only before the current deadline: once a
    /// deadline has lapsed the project's classification is final.
    /// Returns the new deadline.
    pub fn enhance_deadline(
        &self,
        id: ProjectId,
        caller: &Identity,
        additional_secs: u64,
    ) -> Result<Timestamp> {
        let cell = self.registry.get(id)?;
        let mut project = cell.lock();

        if *caller != project.owner {
            return Err(Error::Unauthorized {
                caller: caller.clone(),
                action: "extend this project's deadline",
            });
        }
        if additional_secs == 0 {
            return Err(Error::InvalidParameters(
                "deadline extension must be greater than zero",
            ));
        }
        let now = self.clock.now();
        if !project.is_open(now) {
            return Err(Error::ProjectClosed(id));
        }
        let deadline = project
            .deadline
            .checked_add(additional_secs)
            .ok_or(Error::Overflow("project deadline"))?;

        project.deadline = deadline;
        self.journal.lock().push(LedgerEvent::DeadlineExtended {
            project_id: id,
            caller: caller.clone(),
            additional_secs,
            deadline,
            at: now,
        });

        info!(project_id = id, additional_secs, deadline, "deadline extended");
        Ok(deadline)
    }

    // ─────────────────────────────────────────────────────────
    // Settlement
    // ─────────────────────────────────────────────────────────

    /// Pay out or refund an expired project. Succeeds exactly once per project.
    pub fn settle_project(&self, id: ProjectId) -> Result<Settlement> {
        let cell = self.registry.get(id)?;
        let mut project = cell.lock();
        let now = self.clock.now();

        let outcome = match classify(&project, now) {
            ProjectStatus::Settled => return Err(Error::AlreadySettled(id)),
            ProjectStatus::Active => {
                return Err(Error::NotYetExpired {
                    project_id: id,
                    remaining: project.remaining_time(now),
                })
            }
            ProjectStatus::Successful => Outcome::Successful,
            ProjectStatus::Failed => Outcome::Failed,
        };

        let mut totals = self.totals.lock();
        let mut next = *totals;

        let settlement = match outcome {
            Outcome::Successful => {
                let (payout, commission) =
                    split_commission(project.raised, self.config.commission_rate_bps);
                next.commission_pool = next
                    .commission_pool
                    .checked_add(commission)
                    .ok_or(Error::Overflow("commission pool"))?;
                next.custody = next
                    .custody
                    .checked_sub(payout)
                    .ok_or(Error::Overflow("ledger custody"))?;
                Settlement {
                    project_id: id,
                    outcome,
                    payout,
                    commission,
                    refunds: Vec::new(),
                }
            }
            Outcome::Failed => {
                next.custody = next
                    .custody
                    .checked_sub(project.raised)
                    .ok_or(Error::Overflow("ledger custody"))?;
                Settlement {
                    project_id: id,
                    outcome,
                    payout: 0,
                    commission: 0,
                    refunds: project
                        .contributions
                        .iter()
                        .map(|(who, amount)| (who.clone(), *amount))
                        .collect(),
                }
            }
        };
        next.record_outcome(outcome);

        // Validation is complete; from here on nothing can fail.
        match outcome {
            Outcome::Successful if settlement.payout > 0 => self.sink.credit(
                &project.owner,
                settlement.payout,
                CreditReason::Payout { project_id: id },
            ),
            Outcome::Successful => {}
            Outcome::Failed => {
                for (contributor, amount) in &settlement.refunds {
                    self.sink
                        .credit(contributor, *amount, CreditReason::Refund { project_id: id });
                }
            }
        }
        project.status = ProjectStatus::Settled;
        project.outcome = Some(outcome);
        *totals = next;
        self.journal.lock().push(LedgerEvent::ProjectSettled {
            project_id: id,
            outcome,
            payout: settlement.payout,
            commission: settlement.commission,
            refunded: settlement.total_refunded(),
            at: now,
        });

        info!(
            project_id = id,
            %outcome,
            raised = project.raised,
            payout = settlement.payout,
            commission = settlement.commission,
            refunds = settlement.refunds.len(),
            "project settled"
        );
        Ok(settlement)
    }

    // ─────────────────────────────────────────────────────────
    // Commission
    // ─────────────────────────────────────────────────────────

    /// Pay the whole commission pool to the operator. An empty pool yields 0.
    pub fn withdraw_commission(&self, caller: &Identity) -> Result<Amount> {
        if *caller != self.config.operator {
            return Err(Error::Unauthorized {
                caller: caller.clone(),
                action: "withdraw commission",
            });
        }

        let mut totals = self.totals.lock();
        let amount = totals.commission_pool;
        let custody = totals
            .custody
            .checked_sub(amount)
            .ok_or(Error::Overflow("ledger custody"))?;

        if amount > 0 {
            self.sink.credit(caller, amount, CreditReason::Commission);
        }
        totals.commission_pool = 0;
        totals.custody = custody;
        self.journal.lock().push(LedgerEvent::CommissionWithdrawn {
            operator: caller.clone(),
            amount,
            at: self.clock.now(),
        });

        info!(operator = %caller, amount, "commission withdrawn");
        Ok(amount)
    }

    // ─────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────

    /// Seconds left before the deadline; 0 once lapsed or settled.
    pub fn remaining_time(&self, id: ProjectId) -> Result<u64> {
        let cell = self.registry.get(id)?;
        let project = cell.lock();
        Ok(project.remaining_time(self.clock.now()))
    }

    /// Lifecycle status of `id` as of now.
    pub fn status(&self, id: ProjectId) -> Result<ProjectStatus> {
        let cell = self.registry.get(id)?;
        let project = cell.lock();
        Ok(classify(&project, self.clock.now()))
    }

    pub fn project(&self, id: ProjectId) -> Result<Project> {
        let cell = self.registry.get(id)?;
        let project = cell.lock().clone();
        Ok(project)
    }

    pub fn projects(&self) -> Vec<Project> {
        self.registry.snapshot()
    }

    pub fn contribution_of(&self, id: ProjectId, contributor: &Identity) -> Result<Amount> {
        let cell = self.registry.get(id)?;
        let amount = cell.lock().contribution_of(contributor);
        Ok(amount)
    }

    pub fn total_projects(&self) -> u64 {
        self.registry.len()
    }

    pub fn successful_projects(&self) -> u64 {
        self.totals.lock().successful
    }

    pub fn failed_projects(&self) -> u64 {
        self.totals.lock().failed
    }

    /// Number of settled projects; always `successful_projects() + failed_projects()`.
    pub fn settled_projects(&self) -> u64 {
        self.totals.lock().settled()
    }

    pub fn commission_pool(&self) -> Amount {
        self.totals.lock().commission_pool
    }

    /// Everything currently held: unsettled contributions plus the commission pool.
    pub fn custody(&self) -> Amount {
        self.totals.lock().custody
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Every event recorded since creation or the last drain.
    pub fn events(&self) -> Vec<LedgerEvent> {
        self.journal.lock().clone()
    }

    /// Take the recorded events, leaving the journal empty.
    pub fn drain_events(&self) -> Vec<LedgerEvent> {
        std::mem::take(&mut *self.journal.lock())
    }
}
