//! Identity-mode output rows.

use crate::{
    dispatch::UnitOutcome,
    search::IdentityMatch,
    types::PropertyId,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const IDENTITY_HEADER: [&str; 6] = [
    "property_id",
    "date_trans",
    "purchase_controls_pid",
    "purchase_controls_date",
    "sale_controls_pid",
    "sale_controls_date",
];

/// One matched control of one treated unit. Exactly one side is filled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRow {
    pub property_id:            PropertyId,
    pub date_trans:             NaiveDate,
    pub purchase_controls_pid:  Option<PropertyId>,
    pub purchase_controls_date: Option<NaiveDate>,
    pub sale_controls_pid:      Option<PropertyId>,
    pub sale_controls_date:     Option<NaiveDate>,
}

impl IdentityRow {
    /// Values in `IDENTITY_HEADER` order, blank where missing.
    pub fn record(&self) -> Vec<String> {
        vec![
            self.property_id.clone(),
            self.date_trans.to_string(),
            self.purchase_controls_pid.clone().unwrap_or_default(),
            self.purchase_controls_date.map(|d| d.to_string()).unwrap_or_default(),
            self.sale_controls_pid.clone().unwrap_or_default(),
            self.sale_controls_date.map(|d| d.to_string()).unwrap_or_default(),
        ]
    }
}

/// Flatten one unit's matches: purchase-side rows first, then sale-side
/// rows. An unmatched unit contributes no rows.
pub fn identity_rows(unit: &UnitOutcome<IdentityMatch>) -> Vec<IdentityRow> {
    let purchase = unit.output.purchase.iter().map(|c| IdentityRow {
        property_id:            unit.property_id.clone(),
        date_trans:             unit.date_trans,
        purchase_controls_pid:  Some(c.property_id.clone()),
        purchase_controls_date: Some(c.date_trans),
        sale_controls_pid:      None,
        sale_controls_date:     None,
    });
    let sale = unit.output.sale.iter().map(|c| IdentityRow {
        property_id:            unit.property_id.clone(),
        date_trans:             unit.date_trans,
        purchase_controls_pid:  None,
        purchase_controls_date: None,
        sale_controls_pid:      Some(c.property_id.clone()),
        sale_controls_date:     Some(c.date_trans),
    });
    purchase.chain(sale).collect()
}
