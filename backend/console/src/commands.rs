//! Command handlers. Each ledger command replays the journal, runs one
//! operation and appends whatever it emitted.

use chrono::{DateTime, Utc};
use crowd_tank::{Identity, LedgerConfig, ProjectId, Timestamp};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::cli::CrowdTankCommand;
use crate::db::{self, Deployment};
use crate::errors::{ConsoleError, Result};
use crate::journal::Session;

/// Per-invocation inputs resolved from flags and environment.
#[derive(Debug, Clone)]
pub struct Context {
    pub caller: Option<Identity>,
    pub now: Timestamp,
}

impl Context {
    fn caller(&self) -> Result<&Identity> {
        self.caller.as_ref().ok_or_else(|| {
            ConsoleError::Config("this command needs --caller or CROWDTANK_CALLER".to_string())
        })
    }
}

/// Result of a command, renderable for humans or as JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub text: String,
    pub value: Value,
}

impl Output {
    fn new(text: impl Into<String>, value: Value) -> Self {
        Self {
            text: text.into(),
            value,
        }
    }
}

pub async fn run(pool: SqlitePool, command: CrowdTankCommand, ctx: &Context) -> Result<Output> {
    match command {
        CrowdTankCommand::Deploy {
            operator,
            commission_bps,
        } => deploy(&pool, operator, commission_bps, ctx.now).await,
        CrowdTankCommand::Events { project } => list_events(&pool, project).await,
        command => {
            let mut session = Session::open(pool).await?;
            session.set_now(ctx.now)?;
            let output = execute(&session, command, ctx);
            // Rejected commands emit nothing but still observed `now`.
            session.commit().await?;
            output.map_err(|e| {
                warn!("command rejected: {e}");
                e
            })
        }
    }
}

async fn deploy(
    pool: &SqlitePool,
    operator: String,
    commission_bps: u16,
    now: Timestamp,
) -> Result<Output> {
    // Validate before anything is written.
    LedgerConfig::new(operator.as_str(), commission_bps)?;
    let deployment = Deployment {
        operator,
        commission_bps,
        deployed_at: now,
    };
    db::save_deployment(pool, &deployment).await?;
    info!(operator = %deployment.operator, commission_bps, "ledger deployed");

    Ok(Output::new(
        format!(
            "CrowdTank deployed: operator {}, commission {} bps",
            deployment.operator, deployment.commission_bps
        ),
        serde_json::to_value(&deployment)?,
    ))
}

async fn list_events(pool: &SqlitePool, project: Option<ProjectId>) -> Result<Output> {
    let records = match project {
        Some(id) => db::get_events_for_project(pool, id).await?,
        None => db::get_all_events(pool).await?,
    };

    let text = records
        .iter()
        .map(|r| {
            format!(
                "#{:<5} {} {:<22} project={} actor={} amount={}",
                r.seq,
                format_time(r.timestamp.max(0) as Timestamp),
                r.event_type,
                r.project_id.map_or("-".to_string(), |id| id.to_string()),
                r.actor.as_deref().unwrap_or("-"),
                r.amount.as_deref().unwrap_or("-"),
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    Ok(Output::new(
        text,
        json!({ "count": records.len(), "events": records }),
    ))
}

fn execute(session: &Session, command: CrowdTankCommand, ctx: &Context) -> Result<Output> {
    let ledger = &session.ledger;

    let output = match command {
        CrowdTankCommand::CreateProject { goal, duration } => {
            let owner = ctx.caller()?.clone();
            let id = ledger.create_project(owner, goal, duration)?;
            let project = ledger.project(id)?;
            Output::new(
                format!(
                    "Project {id} created, deadline {}",
                    format_time(project.deadline)
                ),
                json!({ "project_id": id, "deadline": project.deadline }),
            )
        }
        CrowdTankCommand::RemainingTime { project_id } => {
            let remaining = ledger.remaining_time(project_id)?;
            Output::new(
                format!("Remaining Time: {remaining}"),
                json!({ "project_id": project_id, "remaining_time": remaining }),
            )
        }
        CrowdTankCommand::Fund { project_id, amount } => {
            let contributor = ctx.caller()?;
            ledger.fund_project(project_id, contributor, amount)?;
            let raised = ledger.project(project_id)?.raised;
            Output::new(
                format!("Funded project {project_id} with {amount} (raised {raised})"),
                json!({
                    "project_id": project_id,
                    "amount": amount.to_string(),
                    "raised": raised.to_string(),
                }),
            )
        }
        CrowdTankCommand::EnhanceDeadline {
            project_id,
            additional_seconds,
        } => {
            let deadline = ledger.enhance_deadline(project_id, ctx.caller()?, additional_seconds)?;
            Output::new(
                format!(
                    "Deadline for project {project_id} extended to {}",
                    format_time(deadline)
                ),
                json!({ "project_id": project_id, "deadline": deadline }),
            )
        }
        CrowdTankCommand::Settle { project_id } => {
            let settlement = ledger.settle_project(project_id)?;
            Output::new(
                format!(
                    "Project {project_id} settled as {}: payout {}, commission {}, refunded {}",
                    settlement.outcome,
                    settlement.payout,
                    settlement.commission,
                    settlement.total_refunded()
                ),
                json!({
                    "project_id": project_id,
                    "outcome": settlement.outcome,
                    "payout": settlement.payout.to_string(),
                    "commission": settlement.commission.to_string(),
                    "refunded": settlement.total_refunded().to_string(),
                }),
            )
        }
        CrowdTankCommand::Successful => {
            let count = ledger.successful_projects();
            Output::new(
                format!("Successful projects: {count}"),
                json!({ "successful": count }),
            )
        }
        CrowdTankCommand::Failed => {
            let count = ledger.failed_projects();
            Output::new(format!("Failed projects: {count}"), json!({ "failed": count }))
        }
        CrowdTankCommand::TotalProjects => {
            let count = ledger.total_projects();
            Output::new(
                format!("Total projects: {count}"),
                json!({ "total_projects": count }),
            )
        }
        CrowdTankCommand::WithdrawCommission => {
            let amount = ledger.withdraw_commission(ctx.caller()?)?;
            Output::new(
                format!("Commission withdrawn: {amount}"),
                json!({ "amount": amount.to_string() }),
            )
        }
        CrowdTankCommand::Show { project_id } => {
            let project = ledger.project(project_id)?;
            let status = ledger.status(project_id)?;
            let mut text = format!(
                "Project {}\n  owner:     {}\n  goal:      {}\n  raised:    {}\n  deadline:  {}\n  status:    {:?}",
                project.id,
                project.owner,
                project.goal,
                project.raised,
                format_time(project.deadline),
                status,
            );
            for (who, amount) in &project.contributions {
                text.push_str(&format!("\n  {who}: {amount}"));
            }
            let contributions: serde_json::Map<String, Value> = project
                .contributions
                .iter()
                .map(|(who, amount)| (who.to_string(), Value::String(amount.to_string())))
                .collect();
            Output::new(
                text,
                json!({
                    "id": project.id,
                    "owner": project.owner,
                    "goal": project.goal.to_string(),
                    "raised": project.raised.to_string(),
                    "deadline": project.deadline,
                    "status": status,
                    "outcome": project.outcome,
                    "contributions": contributions,
                }),
            )
        }
        CrowdTankCommand::Balances => {
            let balances = ledger.sink().snapshot();
            let deployment = &session.deployment;
            let mut text = format!(
                "Operator:        {} ({} bps)\nCommission pool: {}\nCustody:         {}",
                deployment.operator,
                deployment.commission_bps,
                ledger.commission_pool(),
                ledger.custody()
            );
            for (who, amount) in &balances {
                text.push_str(&format!("\n  {who}: {amount}"));
            }
            let credited: serde_json::Map<String, Value> = balances
                .iter()
                .map(|(who, amount)| (who.to_string(), Value::String(amount.to_string())))
                .collect();
            Output::new(
                text,
                json!({
                    "operator": deployment.operator,
                    "commission_bps": deployment.commission_bps,
                    "commission_pool": ledger.commission_pool().to_string(),
                    "custody": ledger.custody().to_string(),
                    "balances": credited,
                }),
            )
        }
        CrowdTankCommand::Deploy { .. } | CrowdTankCommand::Events { .. } => {
            unreachable!("handled before the journal is opened")
        }
    };
    Ok(output)
}

fn format_time(ts: Timestamp) -> String {
    i64::try_from(ts)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| ts.to_string())
}
