//! Ledger error types.
//!
//! Every rejected operation returns one of these before any state is written.

use thiserror::Error;

use crate::types::{Identity, ProjectId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("project {0} not found")]
    NotFound(ProjectId),

    #[error("invalid parameters: {0}")]
    InvalidParameters(&'static str),

    #[error("contribution amount must be greater than zero")]
    InvalidAmount,

    #[error("project {0} is closed")]
    ProjectClosed(ProjectId),

    #[error("{caller} is not authorized to {action}")]
    Unauthorized {
        caller: Identity,
        action: &'static str,
    },

    #[error("project {project_id} is still open for {remaining} more seconds")]
    NotYetExpired { project_id: ProjectId, remaining: u64 },

    #[error("project {0} is already settled")]
    AlreadySettled(ProjectId),

    #[error("arithmetic overflow while computing {0}")]
    Overflow(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
