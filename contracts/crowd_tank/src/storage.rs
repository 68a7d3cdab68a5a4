//! # Storage
//!
//! In-memory state owned by a [`Ledger`](crate::Ledger).
//!
//! | Item              | Guard                        | Description                         |
//! |-------------------|------------------------------|-------------------------------------|
//! | `ProjectRegistry` | `RwLock<BTreeMap<..>>`       | Arena of projects keyed by id       |
//! | each project      | `Mutex<Project>`             | Serializes operations per project   |
//! | `Totals`          | `Mutex<Totals>`              | Commission pool, custody, outcomes  |
//!
//! The registry lock is only held for writing while a project is inserted, so
//! operations on different projects never wait on each other beyond the brief
//! `Totals` update. Locks are always taken in the order
//! registry -> project -> totals -> journal.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::errors::{Error, Result};
use crate::types::{Amount, Outcome, Project, ProjectId};

pub(crate) type ProjectCell = Arc<Mutex<Project>>;

#[derive(Debug, Default)]
pub(crate) struct ProjectRegistry {
    projects: RwLock<BTreeMap<ProjectId, ProjectCell>>,
}

impl ProjectRegistry {
    /// Insert the project built by `build` under the next sequential id.
    ///
    /// `build` runs with the registry write-locked, so ids are handed out
    /// strictly in order and never reused. If it fails nothing is inserted.
    pub fn insert_with<T, F>(&self, build: F) -> Result<T>
    where
        F: FnOnce(ProjectId) -> Result<(Project, T)>,
    {
        let mut projects = self.projects.write();
        let id = projects.len() as ProjectId;
        let (project, extra) = build(id)?;
        debug_assert_eq!(project.id, id);
        projects.insert(id, Arc::new(Mutex::new(project)));
        Ok(extra)
    }

    pub fn get(&self, id: ProjectId) -> Result<ProjectCell> {
        self.projects
            .read()
            .get(&id)
            .cloned()
            .ok_or(Error::NotFound(id))
    }

    /// Number of projects ever created.
    pub fn len(&self) -> u64 {
        self.projects.read().len() as u64
    }

    /// Snapshot of every project, ordered by id.
    pub fn snapshot(&self) -> Vec<Project> {
        let cells: Vec<ProjectCell> = self.projects.read().values().cloned().collect();
        cells.iter().map(|cell| cell.lock().clone()).collect()
    }
}

/// Ledger-wide counters updated alongside per-project state.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Totals {
    /// Commission accrued from successful settlements, not yet withdrawn.
    pub commission_pool: Amount,
    /// Everything the ledger currently holds.
    pub custody: Amount,
    pub successful: u64,
    pub failed: u64,
}

impl Totals {
    pub fn record_outcome(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Successful => self.successful += 1,
            Outcome::Failed => self.failed += 1,
        }
    }

    pub fn settled(&self) -> u64 {
        self.successful + self.failed
    }
}
