//! Command-line surface of the `crowdtank` binary.

use clap::{Parser, Subcommand};

/// CrowdTank operator console
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(name = "crowdtank")]
pub struct CrowdTankCli {
    /// SQLite database holding the deployment and the journal (overrides DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Identity issuing the command (overrides CROWDTANK_CALLER)
    #[arg(short, long)]
    pub caller: Option<String>,

    /// Run the command at this unix timestamp instead of wall time (overrides CROWDTANK_NOW)
    #[arg(long)]
    pub at: Option<u64>,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,

    #[command(subcommand)]
    pub command: CrowdTankCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CrowdTankCommand {
    /// Deploy the ledger with a fixed operator and commission rate
    Deploy {
        /// Identity allowed to withdraw commission
        #[arg(long)]
        operator: String,
        /// Commission rate in basis points (0-10000)
        #[arg(long, default_value_t = 500)]
        commission_bps: u16,
    },

    /// Create a project owned by the caller
    CreateProject {
        /// Funding goal in the smallest currency unit
        #[arg(long)]
        goal: u128,
        /// Seconds until the funding deadline
        #[arg(long)]
        duration: u64,
    },

    /// Seconds left before a project's deadline
    RemainingTime { project_id: u64 },

    /// Contribute to a project as the caller
    Fund { project_id: u64, amount: u128 },

    /// Extend a project's deadline (owner only)
    EnhanceDeadline {
        project_id: u64,
        additional_seconds: u64,
    },

    /// Pay out or refund an expired project
    Settle { project_id: u64 },

    /// Number of projects settled as successful
    Successful,

    /// Number of projects settled as failed
    Failed,

    /// Number of projects ever created
    TotalProjects,

    /// Withdraw the commission pool (operator only)
    WithdrawCommission,

    /// Show a project's full record
    Show { project_id: u64 },

    /// Show credited balances, commission pool and custody
    Balances,

    /// List journal events
    Events {
        /// Only events for this project
        #[arg(long)]
        project: Option<u64>,
    },
}

impl CrowdTankCommand {
    /// Whether the command needs an authenticated caller.
    pub fn needs_caller(&self) -> bool {
        matches!(
            self,
            Self::CreateProject { .. }
                | Self::Fund { .. }
                | Self::EnhanceDeadline { .. }
                | Self::WithdrawCommission
        )
    }
}
