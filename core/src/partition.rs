//! Partitioning treated units and controls for parallel dispatch.
//!
//! Treated units are grouped by (sale year, purchase year, area); controls
//! by (year, area). A treated group only ever needs two control groups:
//! (sale year, area) for the sale side and (purchase year, area) for the
//! purchase side. Groups are kept in sorted key order so the task list,
//! and therefore the concatenated output, is deterministic.

use crate::{
    error::{ControlError, ControlResult},
    record::Transaction,
    types::{Area, Year},
};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TreatedKey {
    pub year:   Year,
    pub l_year: Year,
    pub area:   Area,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ControlKey {
    pub year: Year,
    pub area: Area,
}

impl TreatedKey {
    pub fn sale_key(&self) -> ControlKey {
        ControlKey { year: self.year, area: self.area.clone() }
    }

    pub fn purchase_key(&self) -> ControlKey {
        ControlKey { year: self.l_year, area: self.area.clone() }
    }
}

/// Controls grouped by (year, area).
pub type ControlGroups = BTreeMap<ControlKey, Vec<Transaction>>;

/// One unit of parallel work: a chunk of treated rows and the two control
/// groups it is matched against.
#[derive(Debug, Clone)]
pub struct Task<'a> {
    pub key:           Option<TreatedKey>,
    pub treated:       Vec<Transaction>,
    pub sale_pool:     &'a [Transaction],
    pub purchase_pool: &'a [Transaction],
}

/// Treated chunks skipped because a control group they need is absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MissingControls {
    pub chunks: usize,
    pub units:  usize,
}

pub fn group_treated(treated: &[Transaction]) -> ControlResult<BTreeMap<TreatedKey, Vec<Transaction>>> {
    let mut groups: BTreeMap<TreatedKey, Vec<Transaction>> = BTreeMap::new();
    for row in treated {
        let l_year = row.l_year.ok_or_else(|| ControlError::MissingField {
            field:       "L_year".into(),
            property_id: row.property_id.clone(),
        })?;
        let key = TreatedKey { year: row.year, l_year, area: row.area.clone() };
        groups.entry(key).or_default().push(row.clone());
    }
    Ok(groups)
}

pub fn group_controls(controls: &[Transaction]) -> ControlGroups {
    let mut groups: ControlGroups = BTreeMap::new();
    for row in controls {
        let key = ControlKey { year: row.year, area: row.area.clone() };
        groups.entry(key).or_default().push(row.clone());
    }
    groups
}

/// Largest chunk size allowed: an even share of the treated rows per
/// worker, capped at `max_chunk_size`, never below one row.
pub fn chunk_threshold(total_treated: usize, workers: usize, max_chunk_size: usize) -> f64 {
    let share = total_treated as f64 / workers.max(1) as f64;
    share.min(max_chunk_size as f64).max(1.0)
}

/// Split `rows` into `n` contiguous chunks whose sizes differ by at most
/// one, the larger chunks first.
pub fn split_even<T: Clone>(rows: &[T], n: usize) -> Vec<Vec<T>> {
    let n = n.clamp(1, rows.len().max(1));
    let base = rows.len() / n;
    let extra = rows.len() % n;

    let mut chunks = Vec::with_capacity(n);
    let mut start = 0;
    for i in 0..n {
        let len = base + usize::from(i < extra);
        chunks.push(rows[start..start + len].to_vec());
        start += len;
    }
    chunks
}

/// Split every group larger than `threshold` into `ceil(len / threshold)`
/// near-equal chunks; smaller groups pass through whole.
pub fn split_into_chunks<K: Clone>(groups: BTreeMap<K, Vec<Transaction>>, threshold: f64) -> Vec<(K, Vec<Transaction>)> {
    let mut chunks = Vec::new();
    for (key, group) in groups {
        if group.len() as f64 > threshold {
            let n_chunks = (group.len() as f64 / threshold).ceil() as usize;
            for chunk in split_even(&group, n_chunks) {
                chunks.push((key.clone(), chunk));
            }
        } else {
            chunks.push((key, group));
        }
    }
    chunks
}

/// Build the task list for a partitioned run.
pub fn plan<'a>(
    treated:        &[Transaction],
    controls:       &'a ControlGroups,
    workers:        usize,
    max_chunk_size: usize,
) -> ControlResult<(Vec<Task<'a>>, MissingControls)> {
    let threshold = chunk_threshold(treated.len(), workers, max_chunk_size);
    let chunks = split_into_chunks(group_treated(treated)?, threshold);

    let mut tasks = Vec::with_capacity(chunks.len());
    let mut missing = MissingControls::default();
    for (key, chunk) in chunks {
        let sale_pool = controls.get(&key.sale_key());
        let purchase_pool = controls.get(&key.purchase_key());

        match (sale_pool, purchase_pool) {
            (Some(sale_pool), Some(purchase_pool)) => tasks.push(Task {
                key: Some(key),
                treated: chunk,
                sale_pool,
                purchase_pool,
            }),
            _ => {
                log::debug!(
                    "partition: no controls for year={} L_year={} area={} ({} units)",
                    key.year, key.l_year, key.area, chunk.len()
                );
                missing.chunks += 1;
                missing.units += chunk.len();
            }
        }
    }

    if missing.chunks > 0 {
        log::warn!(
            "partition: missing controls for {} chunks / {} units",
            missing.chunks, missing.units
        );
    }
    log::info!("partition: {} tasks (threshold {:.1} rows)", tasks.len(), threshold);
    Ok((tasks, missing))
}

/// A single task matching every treated row against the whole control table.
pub fn single_task<'a>(treated: &[Transaction], controls: &'a [Transaction]) -> Task<'a> {
    Task {
        key:           None,
        treated:       treated.to_vec(),
        sale_pool:     controls,
        purchase_pool: controls,
    }
}
