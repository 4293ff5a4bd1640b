//! The match engine: per-treated-unit control search.
//!
//! RULE: Both search modes share the restriction pipeline and differ only in
//! how they walk the radius ladder.
//!   - Identity search ascends the ladder and stops at the first radius
//!     where both sides have at least one match.
//!   - Statistics search descends the ladder, evaluates every radius, and
//!     carries the location-restricted pool into the next narrower radius.

use crate::{
    config::MatchConfig,
    error::ControlResult,
    record::Transaction,
    restrict::{by_location, restrict, Candidate, Side, Target},
    types::{Km, PropertyId},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The contract both search modes fulfil, so the dispatcher can run either.
pub trait ControlSearch: Sync {
    type Output: Send;

    /// Stable name used in logs.
    fn name(&self) -> &'static str;

    /// Match one treated unit against its purchase-side and sale-side pools.
    fn search(
        &self,
        treated:        &Transaction,
        purchase_pool:  &[Transaction],
        sale_pool:      &[Transaction],
    ) -> ControlResult<Self::Output>;
}

/// A matched control transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ControlRef {
    pub property_id: PropertyId,
    pub date_trans:  NaiveDate,
}

impl From<&Candidate<'_>> for ControlRef {
    fn from(c: &Candidate<'_>) -> Self {
        Self {
            property_id: c.row.property_id.clone(),
            date_trans:  c.row.date_trans,
        }
    }
}

/// Identity-mode result for one treated unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentityMatch {
    /// The radius at which both sides first matched. `None` when no rung did.
    pub radius:   Option<Km>,
    pub purchase: Vec<ControlRef>,
    pub sale:     Vec<ControlRef>,
}

impl IdentityMatch {
    pub fn is_matched(&self) -> bool {
        self.radius.is_some()
    }
}

/// Mean outcome and mean duration of one side's matched subset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SideStats {
    pub count:         usize,
    pub mean_outcome:  Option<f64>,
    pub mean_duration: Option<f64>,
}

/// Statistics for both sides at one radius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RungStats {
    pub radius:   Km,
    pub purchase: SideStats,
    pub sale:     SideStats,
}

/// Statistics-mode result for one treated unit, widest radius first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RadiusStats {
    pub rungs: Vec<RungStats>,
}

impl RadiusStats {
    pub fn at(&self, radius: Km) -> Option<&RungStats> {
        self.rungs.iter().find(|r| r.radius == radius)
    }
}

/// Matched rows for both sides at one radius.
#[derive(Debug, Clone)]
pub struct RungMatches<'a> {
    pub radius:   Km,
    pub purchase: Vec<Candidate<'a>>,
    pub sale:     Vec<Candidate<'a>>,
}

/// Pair every pool row with its distance to `treated`, leaving out the
/// treated property itself.
pub fn candidates<'a>(treated: &Transaction, pool: &'a [Transaction]) -> Vec<Candidate<'a>> {
    let origin = treated.coordinates();
    pool.iter()
        .filter(|row| row.property_id != treated.property_id)
        .map(|row| Candidate {
            row,
            distance: origin.distance_to(&row.coordinates()),
        })
        .collect()
}

/// Identity search for one treated unit.
pub fn get_control_properties(
    treated:       &Transaction,
    purchase_pool: &[Transaction],
    sale_pool:     &[Transaction],
    config:        &MatchConfig,
) -> ControlResult<IdentityMatch> {
    let purchase_target = Target::for_side(treated, Side::Purchase, config)?;
    let sale_target = Target::for_side(treated, Side::Sale, config)?;

    // Year, duration and calendar restrictions do not depend on the radius.
    let purchase = restrict(&candidates(treated, purchase_pool), &purchase_target, config.duration_margin);
    let sale = restrict(&candidates(treated, sale_pool), &sale_target, config.duration_margin);

    let mut found = IdentityMatch::default();
    for radius in config.ladder_ascending() {
        let purchase_matches = by_location(&purchase, radius);
        let sale_matches = by_location(&sale, radius);

        if !purchase_matches.is_empty() && !sale_matches.is_empty() {
            found = IdentityMatch {
                radius:   Some(radius),
                purchase: purchase_matches.iter().map(ControlRef::from).collect(),
                sale:     sale_matches.iter().map(ControlRef::from).collect(),
            };
            break;
        }
    }

    log::trace!(
        "identity: {} radius={:?} purchase={} sale={}",
        treated.property_id,
        found.radius,
        found.purchase.len(),
        found.sale.len()
    );
    Ok(found)
}

/// Walk the ladder widest first and return the matched rows at every rung.
///
/// The location-restricted pools shrink monotonically: each rung filters
/// the previous rung's pool, never the full pool.
pub fn walk_ladder_descending<'a>(
    treated:       &Transaction,
    purchase_pool: &'a [Transaction],
    sale_pool:     &'a [Transaction],
    config:        &MatchConfig,
) -> ControlResult<Vec<RungMatches<'a>>> {
    let purchase_target = Target::for_side(treated, Side::Purchase, config)?;
    let sale_target = Target::for_side(treated, Side::Sale, config)?;

    let mut purchase_pool = candidates(treated, purchase_pool);
    let mut sale_pool = candidates(treated, sale_pool);

    let ladder = config.ladder_descending();
    let mut rungs = Vec::with_capacity(ladder.len());
    for radius in ladder {
        purchase_pool = by_location(&purchase_pool, radius);
        sale_pool = by_location(&sale_pool, radius);

        rungs.push(RungMatches {
            radius,
            purchase: restrict(&purchase_pool, &purchase_target, config.duration_margin),
            sale:     restrict(&sale_pool, &sale_target, config.duration_margin),
        });
    }
    Ok(rungs)
}

/// Statistics search for one treated unit.
pub fn get_controls(
    treated:       &Transaction,
    purchase_pool: &[Transaction],
    sale_pool:     &[Transaction],
    config:        &MatchConfig,
) -> ControlResult<RadiusStats> {
    let rungs = walk_ladder_descending(treated, purchase_pool, sale_pool, config)?
        .into_iter()
        .map(|rung| {
            Ok(RungStats {
                radius:   rung.radius,
                purchase: side_stats(&rung.purchase, &config.outcome_field)?,
                sale:     side_stats(&rung.sale, &config.outcome_field)?,
            })
        })
        .collect::<ControlResult<Vec<_>>>()?;

    Ok(RadiusStats { rungs })
}

/// Means over the rows with a non-missing outcome; missing when there are none.
pub fn side_stats(rows: &[Candidate<'_>], outcome_field: &str) -> ControlResult<SideStats> {
    let mut count = 0usize;
    let mut outcome_sum = 0.0;
    let mut duration_sum = 0.0;

    for c in rows {
        if let Some(outcome) = c.row.numeric(outcome_field)? {
            count += 1;
            outcome_sum += outcome;
            duration_sum += c.row.duration;
        }
    }

    if count == 0 {
        return Ok(SideStats::default());
    }
    let n = count as f64;
    Ok(SideStats {
        count,
        mean_outcome:  Some(outcome_sum / n),
        mean_duration: Some(duration_sum / n),
    })
}

/// Identity search bound to a config.
pub struct IdentitySearch<'c> {
    pub config: &'c MatchConfig,
}

impl ControlSearch for IdentitySearch<'_> {
    type Output = IdentityMatch;

    fn name(&self) -> &'static str { "identity" }

    fn search(
        &self,
        treated:       &Transaction,
        purchase_pool: &[Transaction],
        sale_pool:     &[Transaction],
    ) -> ControlResult<IdentityMatch> {
        get_control_properties(treated, purchase_pool, sale_pool, self.config)
    }
}

/// Statistics search bound to a config.
pub struct StatisticsSearch<'c> {
    pub config: &'c MatchConfig,
}

impl ControlSearch for StatisticsSearch<'_> {
    type Output = RadiusStats;

    fn name(&self) -> &'static str { "statistics" }

    fn search(
        &self,
        treated:       &Transaction,
        purchase_pool: &[Transaction],
        sale_pool:     &[Transaction],
    ) -> ControlResult<RadiusStats> {
        get_controls(treated, purchase_pool, sale_pool, self.config)
    }
}
