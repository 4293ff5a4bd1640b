//! Preparing a raw transaction table for matching.
//!
//! Splits treated units from controls and applies the run-level filters
//! that do not depend on any single treated unit.

use crate::{
    config::MatchConfig,
    error::{ControlError, ControlResult},
    record::Transaction,
};

/// Treated units and eligible controls, ready for partitioning.
#[derive(Debug, Clone, Default)]
pub struct Prepared {
    pub treated:  Vec<Transaction>,
    pub controls: Vec<Transaction>,
    /// Rows dropped because the outcome field was missing.
    pub dropped_missing_outcome: usize,
}

pub fn prepare(rows: &[Transaction], config: &MatchConfig) -> ControlResult<Prepared> {
    let mut prepared = Prepared::default();

    for row in rows {
        if row.numeric(&config.outcome_field)?.is_none() {
            prepared.dropped_missing_outcome += 1;
            continue;
        }
        if row.is_treated() {
            if config.real_time_year.is_some_and(|y| row.year != y) {
                continue;
            }
            prepared.treated.push(row.clone());
        } else if row.extension == 0 && row.duration > 0.0 {
            prepared.controls.push(row.clone());
        }
    }

    // Every treated unit must carry what both sides of the search need.
    let mut shortest_sale: Option<f64> = None;
    let mut longest_purchase: Option<f64> = None;
    for row in &prepared.treated {
        row.l_year.ok_or_else(|| ControlError::MissingField {
            field:       "L_year".into(),
            property_id: row.property_id.clone(),
        })?;
        let sale = row.require(&config.sale_duration_field)?;
        let purchase = row.require(&config.purchase_duration_field)?;
        shortest_sale = Some(shortest_sale.map_or(sale, |s| s.min(sale)));
        longest_purchase = Some(longest_purchase.map_or(purchase, |p| p.max(purchase)));
    }

    if let (Some(cap), Some(longest)) = (config.control_duration_cap, longest_purchase) {
        prepared.controls.retain(|c| c.duration <= longest + cap);
    }

    log::info!(
        "prepare: {} treated, {} controls, {} dropped for missing '{}'",
        prepared.treated.len(),
        prepared.controls.len(),
        prepared.dropped_missing_outcome,
        config.outcome_field
    );
    log::debug!(
        "prepare: shortest treated {}={:?}, longest treated {}={:?}",
        config.sale_duration_field, shortest_sale,
        config.purchase_duration_field, longest_purchase
    );

    Ok(prepared)
}
