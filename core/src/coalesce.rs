//! Coalescing per-radius statistics into one nearest-radius answer per unit.
//!
//! Walking the ladder narrowest first, a unit is filled from the first
//! radius at which both its sale-side index and purchase-side index are
//! present. All four fields come from that same radius.

use crate::{
    dispatch::UnitOutcome,
    search::{RadiusStats, RungStats, SideStats},
    types::{Km, PropertyId},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Statistic fields in the order they appear in the output table.
pub const OUTPUT_FIELDS: [&str; 6] = [
    "index", "L_index", "d_index", "radius", "duration_idx", "L_duration_idx",
];

/// Fields present once per radius before coalescing.
pub const PER_RADIUS_FIELDS: [&str; 4] = ["L_index", "L_duration_idx", "index", "duration_idx"];

/// The coalesced statistics for one treated unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestControls {
    pub property_id:    PropertyId,
    pub date_trans:     NaiveDate,
    /// Mean sale-side outcome.
    pub index:          Option<f64>,
    /// Mean purchase-side outcome.
    pub l_index:        Option<f64>,
    pub d_index:        Option<f64>,
    /// The radius the values were taken from. Units never complete keep the
    /// widest radius they were filled from; `None` when no radius was evaluated.
    pub radius:         Option<Km>,
    pub duration_idx:   Option<f64>,
    pub l_duration_idx: Option<f64>,
}

impl NearestControls {
    /// Column headers with the caller's tag appended.
    pub fn header(tag: &str) -> Vec<String> {
        ["property_id".to_string(), "date_trans".to_string()]
            .into_iter()
            .chain(OUTPUT_FIELDS.iter().map(|f| format!("{f}{tag}")))
            .collect()
    }

    /// Values in `header` order, blank where missing.
    pub fn record(&self) -> Vec<String> {
        let cell = |v: Option<f64>| v.map(|x| x.to_string()).unwrap_or_default();
        vec![
            self.property_id.clone(),
            self.date_trans.to_string(),
            cell(self.index),
            cell(self.l_index),
            cell(self.d_index),
            cell(self.radius),
            cell(self.duration_idx),
            cell(self.l_duration_idx),
        ]
    }

    /// The coalesced values viewed as a single-radius statistics table.
    pub fn as_single_rung(&self) -> RadiusStats {
        let Some(radius) = self.radius else {
            return RadiusStats::default();
        };
        let side = |mean_outcome: Option<f64>, mean_duration: Option<f64>| SideStats {
            count: usize::from(mean_outcome.is_some()),
            mean_outcome,
            mean_duration,
        };
        RadiusStats {
            rungs: vec![RungStats {
                radius,
                purchase: side(self.l_index, self.l_duration_idx),
                sale:     side(self.index, self.duration_idx),
            }],
        }
    }
}

/// Per-radius column name, e.g. `L_index_0.5_km`.
pub fn radius_column(field: &str, radius: Km) -> String {
    format!("{field}_{radius}_km")
}

/// Coalesce one unit's per-radius statistics.
pub fn coalesce_unit(unit: &UnitOutcome<RadiusStats>, ladder: &[Km]) -> NearestControls {
    let mut ascending = ladder.to_vec();
    ascending.sort_by(|a, b| a.total_cmp(b));
    ascending.dedup();

    let mut out = NearestControls {
        property_id:    unit.property_id.clone(),
        date_trans:     unit.date_trans,
        index:          None,
        l_index:        None,
        d_index:        None,
        radius:         None,
        duration_idx:   None,
        l_duration_idx: None,
    };

    for radius in ascending {
        if out.index.is_some() && out.l_index.is_some() {
            break;
        }
        let Some(rung) = unit.output.at(radius) else {
            continue;
        };
        out.index = rung.sale.mean_outcome;
        out.duration_idx = rung.sale.mean_duration;
        out.l_index = rung.purchase.mean_outcome;
        out.l_duration_idx = rung.purchase.mean_duration;
        out.radius = Some(radius);
    }

    out.d_index = match (out.index, out.l_index) {
        (Some(post), Some(pre)) => Some(post - pre),
        _ => None,
    };
    out
}

pub fn coalesce(units: &[UnitOutcome<RadiusStats>], ladder: &[Km]) -> Vec<NearestControls> {
    units.iter().map(|unit| coalesce_unit(unit, ladder)).collect()
}

/// The wide, per-radius view of one unit's statistics: one
/// `(column, value)` pair per radius and field, widest radius first.
pub fn per_radius_columns(stats: &RadiusStats) -> Vec<(String, Option<f64>)> {
    let mut columns = Vec::with_capacity(stats.rungs.len() * PER_RADIUS_FIELDS.len());
    for rung in &stats.rungs {
        let values = [
            rung.purchase.mean_outcome,
            rung.purchase.mean_duration,
            rung.sale.mean_outcome,
            rung.sale.mean_duration,
        ];
        for (field, value) in PER_RADIUS_FIELDS.iter().zip(values) {
            columns.push((radius_column(field, rung.radius), value));
        }
    }
    columns
}
