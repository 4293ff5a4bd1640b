//! Parallel dispatch of partition tasks onto a fixed-size worker pool.
//!
//! RULES:
//!   - Workers share nothing mutable. Each task borrows its control groups
//!     read-only and returns a freshly built result vector.
//!   - Results are concatenated in task submission order, never in
//!     completion order.
//!   - Any task error aborts the whole dispatch.

use crate::{
    error::ControlResult,
    partition::Task,
    record::Transaction,
    search::ControlSearch,
    types::PropertyId,
};
use chrono::NaiveDate;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};

/// The search output for one treated unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitOutcome<T> {
    pub property_id: PropertyId,
    pub date_trans:  NaiveDate,
    pub output:      T,
}

pub struct Dispatcher {
    pool:    ThreadPool,
    workers: usize,
}

impl Dispatcher {
    /// A pool of `workers` threads, or the host's available parallelism.
    pub fn new(workers: Option<usize>) -> ControlResult<Self> {
        let workers = workers.unwrap_or_else(available_workers);
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("control-worker-{i}"))
            .build()?;
        Ok(Self { pool, workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `search` over every task and concatenate the per-task results.
    pub fn run<S: ControlSearch>(
        &self,
        tasks:  &[Task<'_>],
        search: &S,
    ) -> ControlResult<Vec<UnitOutcome<S::Output>>> {
        log::debug!(
            "dispatch: {} tasks on {} workers ({} search)",
            tasks.len(), self.workers, search.name()
        );

        let per_task: Vec<Vec<UnitOutcome<S::Output>>> = self.pool.install(|| {
            tasks
                .par_iter()
                .map(|task| run_task(task, search))
                .collect::<ControlResult<Vec<_>>>()
        })?;

        Ok(per_task.into_iter().flatten().collect())
    }
}

/// Process one task on the current thread.
pub fn run_task<S: ControlSearch>(
    task:   &Task<'_>,
    search: &S,
) -> ControlResult<Vec<UnitOutcome<S::Output>>> {
    task.treated
        .iter()
        .map(|treated| unit_outcome(treated, task, search))
        .collect()
}

fn unit_outcome<S: ControlSearch>(
    treated: &Transaction,
    task:    &Task<'_>,
    search:  &S,
) -> ControlResult<UnitOutcome<S::Output>> {
    Ok(UnitOutcome {
        property_id: treated.property_id.clone(),
        date_trans:  treated.date_trans,
        output:      search.search(treated, task.purchase_pool, task.sale_pool)?,
    })
}

pub fn available_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
