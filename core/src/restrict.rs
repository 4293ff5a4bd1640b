//! The restriction pipeline.
//!
//! RULE: Every restriction is a pure subset operation. It takes a slice of
//! candidates and returns a new table; the input is never touched. Order of
//! application therefore never changes the final set.

use crate::{
    config::MatchConfig,
    error::{ControlError, ControlResult},
    record::Transaction,
    types::{Km, Year},
};

/// A control row paired with its distance to the treated unit being matched.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub row:      &'a Transaction,
    pub distance: Km,
}

/// Which of the treated unit's two transactions a pool is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Purchase,
    Sale,
}

/// The constraints one side of one treated unit imposes on its controls.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub year:      Year,
    /// Set only for the sale side when both years are restricted.
    pub l_year:    Option<Year>,
    pub duration:  f64,
    pub quarter:   Option<u32>,
    pub month:     Option<u32>,
}

impl Target {
    /// Derive the constraints for `side` of `treated` under `config`.
    /// A treated unit missing any field the side needs violates the input contract.
    pub fn for_side(treated: &Transaction, side: Side, config: &MatchConfig) -> ControlResult<Self> {
        let missing = |field: &str| ControlError::MissingField {
            field:       field.to_string(),
            property_id: treated.property_id.clone(),
        };

        match side {
            Side::Purchase => Ok(Self {
                year:     treated.l_year.ok_or_else(|| missing("L_year"))?,
                l_year:   None,
                duration: treated.require(&config.purchase_duration_field)?,
                quarter:  if config.restrict_quarter {
                    Some(treated.l_quarter.ok_or_else(|| missing("L_quarter"))?)
                } else {
                    None
                },
                month:    if config.restrict_month {
                    Some(treated.l_month.ok_or_else(|| missing("L_month"))?)
                } else {
                    None
                },
            }),
            Side::Sale => Ok(Self {
                year:     treated.year,
                l_year:   if config.restrict_both_years {
                    Some(treated.l_year.ok_or_else(|| missing("L_year"))?)
                } else {
                    None
                },
                duration: treated.require(&config.sale_duration_field)?,
                quarter:  config.restrict_quarter.then_some(treated.quarter),
                month:    config.restrict_month.then_some(treated.month),
            }),
        }
    }
}

pub fn by_year<'a>(data: &[Candidate<'a>], year: Year) -> Vec<Candidate<'a>> {
    data.iter().filter(|c| c.row.year == year).copied().collect()
}

/// Rows transacted in `year` whose prior transaction was in `l_year`.
pub fn by_years<'a>(data: &[Candidate<'a>], year: Year, l_year: Year) -> Vec<Candidate<'a>> {
    data.iter()
        .filter(|c| c.row.year == year && c.row.l_year == Some(l_year))
        .copied()
        .collect()
}

pub fn by_quarter<'a>(data: &[Candidate<'a>], quarter: u32) -> Vec<Candidate<'a>> {
    data.iter().filter(|c| c.row.quarter == quarter).copied().collect()
}

pub fn by_month<'a>(data: &[Candidate<'a>], month: u32) -> Vec<Candidate<'a>> {
    data.iter().filter(|c| c.row.month == month).copied().collect()
}

/// Rows whose duration is within `margin * duration` of `duration`.
pub fn by_duration<'a>(data: &[Candidate<'a>], duration: f64, margin: f64) -> Vec<Candidate<'a>> {
    data.iter()
        .filter(|c| within_margin(c.row.duration, duration, margin))
        .copied()
        .collect()
}

/// Rows strictly closer than `radius`.
pub fn by_location<'a>(data: &[Candidate<'a>], radius: Km) -> Vec<Candidate<'a>> {
    data.iter().filter(|c| c.distance < radius).copied().collect()
}

pub fn within_margin(control: f64, target: f64, margin: f64) -> bool {
    (control - target).abs() <= margin * target
}

/// Apply the year, duration and optional quarter/month restrictions of
/// `target`, in that order. Location is applied separately by the caller.
pub fn restrict<'a>(data: &[Candidate<'a>], target: &Target, margin: f64) -> Vec<Candidate<'a>> {
    let mut out = match target.l_year {
        Some(l_year) => by_years(data, target.year, l_year),
        None => by_year(data, target.year),
    };
    out = by_duration(&out, target.duration, margin);
    if let Some(quarter) = target.quarter {
        out = by_quarter(&out, quarter);
    }
    if let Some(month) = target.month {
        out = by_month(&out, month);
    }
    out
}
