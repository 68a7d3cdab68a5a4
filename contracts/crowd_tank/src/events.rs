//! Events emitted by the ledger.
//!
//! Each accepted state-changing operation appends exactly one [`LedgerEvent`]
//! to the ledger's journal. Events carry enough data to re-run the operation
//! that produced them, at the timestamp it ran at.

use serde::{Deserialize, Serialize};

use crate::types::{Amount, Identity, Outcome, ProjectId, Timestamp};

/// All event kinds emitted by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ProjectCreated,
    ProjectFunded,
    DeadlineExtended,
    ProjectSettled,
    CommissionWithdrawn,
}

impl EventKind {
    /// Short identifier suitable for storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProjectCreated => "project_created",
            Self::ProjectFunded => "project_funded",
            Self::DeadlineExtended => "deadline_extended",
            Self::ProjectSettled => "project_settled",
            Self::CommissionWithdrawn => "commission_withdrawn",
        }
    }

    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "project_created" => Some(Self::ProjectCreated),
            "project_funded" => Some(Self::ProjectFunded),
            "deadline_extended" => Some(Self::DeadlineExtended),
            "project_settled" => Some(Self::ProjectSettled),
            "commission_withdrawn" => Some(Self::CommissionWithdrawn),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEvent {
    ProjectCreated {
        project_id: ProjectId,
        owner: Identity,
        goal: Amount,
        duration_secs: u64,
        deadline: Timestamp,
        at: Timestamp,
    },
    ProjectFunded {
        project_id: ProjectId,
        contributor: Identity,
        amount: Amount,
        raised: Amount,
        at: Timestamp,
    },
    DeadlineExtended {
        project_id: ProjectId,
        caller: Identity,
        additional_secs: u64,
        deadline: Timestamp,
        at: Timestamp,
    },
    ProjectSettled {
        project_id: ProjectId,
        outcome: Outcome,
        payout: Amount,
        commission: Amount,
        refunded: Amount,
        at: Timestamp,
    },
    CommissionWithdrawn {
        operator: Identity,
        amount: Amount,
        at: Timestamp,
    },
}

impl LedgerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::ProjectCreated { .. } => EventKind::ProjectCreated,
            Self::ProjectFunded { .. } => EventKind::ProjectFunded,
            Self::DeadlineExtended { .. } => EventKind::DeadlineExtended,
            Self::ProjectSettled { .. } => EventKind::ProjectSettled,
            Self::CommissionWithdrawn { .. } => EventKind::CommissionWithdrawn,
        }
    }

    pub fn project_id(&self) -> Option<ProjectId> {
        match self {
            Self::ProjectCreated { project_id, .. }
            | Self::ProjectFunded { project_id, .. }
            | Self::DeadlineExtended { project_id, .. }
            | Self::ProjectSettled { project_id, .. } => Some(*project_id),
            Self::CommissionWithdrawn { .. } => None,
        }
    }

    /// The identity that initiated or benefits from the event, if any.
    pub fn actor(&self) -> Option<&Identity> {
        match self {
            Self::ProjectCreated { owner, .. } => Some(owner),
            Self::ProjectFunded { contributor, .. } => Some(contributor),
            Self::DeadlineExtended { caller, .. } => Some(caller),
            Self::CommissionWithdrawn { operator, .. } => Some(operator),
            Self::ProjectSettled { .. } => None,
        }
    }

    /// The headline amount: goal, contribution, settled total or withdrawal.
    pub fn amount(&self) -> Option<Amount> {
        match self {
            Self::ProjectCreated { goal, .. } => Some(*goal),
            Self::ProjectFunded { amount, .. } => Some(*amount),
            Self::ProjectSettled {
                payout,
                commission,
                refunded,
                ..
            } => Some(payout + commission + refunded),
            Self::CommissionWithdrawn { amount, .. } => Some(*amount),
            Self::DeadlineExtended { .. } => None,
        }
    }

    pub fn at(&self) -> Timestamp {
        match self {
            Self::ProjectCreated { at, .. }
            | Self::ProjectFunded { at, .. }
            | Self::DeadlineExtended { at, .. }
            | Self::ProjectSettled { at, .. }
            | Self::CommissionWithdrawn { at, .. } => *at,
        }
    }
}
