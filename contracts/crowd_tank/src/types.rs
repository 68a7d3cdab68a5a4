//! # Types
//!
//! Shared data structures used across all modules of the CrowdTank ledger.
//!
//! ## Status as a Finite-State Machine
//!
//! [`ProjectStatus`] follows a strict forward-only lifecycle:
//!
//! ```text
//! Active ──(deadline passed, raised >= goal)──► Successful ──settle──► Settled
//!    └────(deadline passed, raised <  goal)──► Failed     ──settle──► Settled
//! ```
//!
//! Only `Active` and `Settled` are ever stored. `Successful` and `Failed` are
//! derived on demand by [`classify`] from the deadline and the raised total, so
//! the single mutation point of the state machine is settlement.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Sequential project identifier, starting at 0.
pub type ProjectId = u64;

/// Amount in the smallest currency unit.
pub type Amount = u128;

/// Unix timestamp in seconds.
pub type Timestamp = u64;

/// Commission rates are expressed in units of 1/10000.
pub const BASIS_POINTS_DENOMINATOR: u16 = 10_000;

/// An authenticated participant: contributor, project owner or operator.
///
/// Authentication happens outside the ledger; the ledger only compares
/// identities for equality.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for Identity {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Lifecycle status of a project.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    /// Accepting contributions.
    Active,
    /// Deadline passed with the goal met; awaiting settlement.
    Successful,
    /// Deadline passed with the goal missed; awaiting settlement.
    Failed,
    /// Funds paid out or refunded. Terminal.
    Settled,
}

/// Recorded result of a settlement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Successful,
    Failed,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Successful => f.write_str("successful"),
            Outcome::Failed => f.write_str("failed"),
        }
    }
}

/// A single funding campaign.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Unique identifier (auto-incremented).
    pub id: ProjectId,
    /// Identity paid on a successful settlement; the only one allowed to extend the deadline.
    pub owner: Identity,
    /// Target funding amount. Always > 0.
    pub goal: Amount,
    /// Timestamp from which contributions are rejected.
    pub deadline: Timestamp,
    /// Sum of every accepted contribution. Kept after settlement for audit.
    pub raised: Amount,
    /// Stored status: `Active` until settlement, then `Settled`.
    pub status: ProjectStatus,
    /// Set exactly once, by settlement.
    pub outcome: Option<Outcome>,
    /// Contributor -> cumulative amount.
    pub contributions: BTreeMap<Identity, Amount>,
    /// Timestamp of creation.
    pub created_at: Timestamp,
}

impl Project {
    pub(crate) fn new(
        id: ProjectId,
        owner: Identity,
        goal: Amount,
        deadline: Timestamp,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            owner,
            goal,
            deadline,
            raised: 0,
            status: ProjectStatus::Active,
            outcome: None,
            contributions: BTreeMap::new(),
            created_at,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.status == ProjectStatus::Settled
    }

    /// Whether contributions are still accepted at `now`.
    pub fn is_open(&self, now: Timestamp) -> bool {
        self.status == ProjectStatus::Active && now < self.deadline
    }

    /// Seconds until the deadline, or 0 once lapsed or settled.
    pub fn remaining_time(&self, now: Timestamp) -> u64 {
        if self.is_settled() {
            return 0;
        }
        self.deadline.saturating_sub(now)
    }

    pub fn contribution_of(&self, contributor: &Identity) -> Amount {
        self.contributions.get(contributor).copied().unwrap_or(0)
    }

    pub fn contributor_count(&self) -> usize {
        self.contributions.len()
    }
}

/// Derive the lifecycle status of `project` at `now` without mutating it.
pub fn classify(project: &Project, now: Timestamp) -> ProjectStatus {
    match project.status {
        ProjectStatus::Settled => ProjectStatus::Settled,
        _ if now < project.deadline => ProjectStatus::Active,
        _ if project.raised >= project.goal => ProjectStatus::Successful,
        _ => ProjectStatus::Failed,
    }
}

/// Why funds left ledger custody.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum CreditReason {
    /// Owner payout of a successful project.
    Payout { project_id: ProjectId },
    /// Contributor refund of a failed project.
    Refund { project_id: ProjectId },
    /// Operator commission withdrawal.
    Commission,
}

/// Receipt returned by a settlement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub project_id: ProjectId,
    pub outcome: Outcome,
    /// Paid to the owner. Zero for failed projects.
    pub payout: Amount,
    /// Added to the commission pool. Zero for failed projects.
    pub commission: Amount,
    /// Per-contributor refunds. Empty for successful projects.
    pub refunds: Vec<(Identity, Amount)>,
}

impl Settlement {
    pub fn total_refunded(&self) -> Amount {
        self.refunds.iter().map(|(_, amount)| *amount).sum()
    }
}

/// Split `raised` into `(payout, commission)` at `rate_bps`.
///
/// The commission is floored; the rounding remainder stays with the payout.
/// Rates above [`BASIS_POINTS_DENOMINATOR`] are clamped. The product
/// `raised * rate_bps` is never formed, so every `raised` splits.
pub fn split_commission(raised: Amount, rate_bps: u16) -> (Amount, Amount) {
    let denominator = Amount::from(BASIS_POINTS_DENOMINATOR);
    let rate = Amount::from(rate_bps.min(BASIS_POINTS_DENOMINATOR));
    let commission = raised / denominator * rate + raised % denominator * rate / denominator;
    (raised - commission, commission)
}
