//! The control engine: one matching run from raw rows to output tables.
//!
//! EXECUTION ORDER (fixed):
//!   1. Prepare     (drop missing outcomes, split treated / controls)
//!   2. Partition   (group, chunk, drop chunks without control groups)
//!   3. Dispatch    (per-unit search on the worker pool)
//!   4. Coalesce    (statistics mode only)
//!
//! RULES:
//!   - The engine owns its configuration; nothing is read from globals.
//!   - No stage mutates its input. Each stage returns a new table.

use crate::{
    coalesce::{coalesce, NearestControls},
    config::MatchConfig,
    dispatch::{Dispatcher, UnitOutcome},
    error::ControlResult,
    output::{identity_rows, IdentityRow},
    partition::{group_controls, plan, single_task, ControlGroups, MissingControls, Task},
    prepare::{prepare, Prepared},
    record::Transaction,
    search::{ControlSearch, IdentityMatch, IdentitySearch, RadiusStats, StatisticsSearch},
};
use serde::{Deserialize, Serialize};

/// Diagnostics for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchReport {
    pub chunks_submitted: usize,
    /// Chunks skipped because a control group they need is absent.
    pub chunks_dropped:   usize,
    pub units_dropped:    usize,
    pub units_processed:  usize,
    /// Processed units for which no radius produced controls.
    pub units_unmatched:  usize,
}

impl MatchReport {
    /// Treated units left without controls, for whatever reason.
    pub fn missing_controls(&self) -> usize {
        self.units_dropped + self.units_unmatched
    }
}

/// Identity-mode result of a run.
#[derive(Debug, Clone)]
pub struct PropertyRun {
    pub units:  Vec<UnitOutcome<IdentityMatch>>,
    pub rows:   Vec<IdentityRow>,
    pub report: MatchReport,
}

/// Statistics-mode result of a run.
#[derive(Debug, Clone)]
pub struct StatisticsRun {
    pub units:   Vec<UnitOutcome<RadiusStats>>,
    pub nearest: Vec<NearestControls>,
    pub report:  MatchReport,
}

pub struct ControlEngine {
    pub config: MatchConfig,
    dispatcher: Dispatcher,
}

impl ControlEngine {
    pub fn new(config: MatchConfig) -> ControlResult<Self> {
        config.validate()?;
        let dispatcher = Dispatcher::new(config.workers)?;
        Ok(Self { config, dispatcher })
    }

    pub fn workers(&self) -> usize {
        self.dispatcher.workers()
    }

    /// Identity mode: the matched controls of every treated unit.
    pub fn match_properties(&self, rows: &[Transaction]) -> ControlResult<PropertyRun> {
        let search = IdentitySearch { config: &self.config };
        let (units, mut report) = self.execute(rows, &search)?;

        report.units_unmatched = units.iter().filter(|u| !u.output.is_matched()).count();
        let rows = units.iter().flat_map(identity_rows).collect();

        log::info!(
            "match_properties: {} units, {} unmatched, {} dropped for missing controls",
            report.units_processed, report.units_unmatched, report.units_dropped
        );
        Ok(PropertyRun { units, rows, report })
    }

    /// Statistics mode: per-radius statistics coalesced to the nearest
    /// usable radius.
    pub fn match_statistics(&self, rows: &[Transaction]) -> ControlResult<StatisticsRun> {
        let search = StatisticsSearch { config: &self.config };
        let (units, mut report) = self.execute(rows, &search)?;

        let nearest = coalesce(&units, &self.config.radius_ladder);
        report.units_unmatched = nearest.iter().filter(|n| n.d_index.is_none()).count();

        log::info!(
            "match_statistics[{}]: {} units, {} without a complete radius, {} dropped for missing controls",
            self.config.outcome_field,
            report.units_processed, report.units_unmatched, report.units_dropped
        );
        Ok(StatisticsRun { units, nearest, report })
    }

    /// Prepare, partition and dispatch.
    fn execute<S: ControlSearch>(
        &self,
        rows:   &[Transaction],
        search: &S,
    ) -> ControlResult<(Vec<UnitOutcome<S::Output>>, MatchReport)> {
        let Prepared { treated, controls, .. } = prepare(rows, &self.config)?;

        let groups: ControlGroups;
        let (tasks, missing): (Vec<Task<'_>>, MissingControls) = if self.config.parallelize {
            groups = group_controls(&controls);
            plan(&treated, &groups, self.workers(), self.config.max_chunk_size)?
        } else {
            (vec![single_task(&treated, &controls)], MissingControls::default())
        };

        let units = self.dispatcher.run(&tasks, search)?;
        let report = MatchReport {
            chunks_submitted: tasks.len(),
            chunks_dropped:   missing.chunks,
            units_dropped:    missing.units,
            units_processed:  units.len(),
            units_unmatched:  0,
        };
        Ok((units, report))
    }
}
