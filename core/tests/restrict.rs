//! Restriction pipeline tests.

mod common;

use common::{control, treated};
use leasecontrols_core::{
    config::MatchConfig,
    restrict::{by_duration, by_location, by_month, by_quarter, by_year, by_years, restrict, Candidate, Side, Target},
};

fn at(row: &leasecontrols_core::record::Transaction, distance: f64) -> Candidate<'_> {
    Candidate { row, distance }
}

#[test]
fn duration_margin_is_relative_and_inclusive() {
    let rows = [
        control("exact-edge-low", 2010, 81.0, 0.0),
        control("inside", 2010, 95.0, 0.0),
        control("exact-edge-high", 2010, 99.0, 0.0),
        control("outside", 2010, 99.5, 0.0),
    ];
    let data: Vec<_> = rows.iter().map(|r| at(r, 0.0)).collect();

    let kept: Vec<_> = by_duration(&data, 90.0, 0.1)
        .iter()
        .map(|c| c.row.property_id.clone())
        .collect();

    assert_eq!(kept, vec!["exact-edge-low", "inside", "exact-edge-high"]);
}

#[test]
fn location_is_strictly_less_than_radius() {
    let rows = [control("a", 2010, 90.0, 0.0), control("b", 2010, 90.0, 0.0)];
    let data = vec![at(&rows[0], 0.5), at(&rows[1], 0.4999)];

    let kept = by_location(&data, 0.5);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].row.property_id, "b");
}

#[test]
fn calendar_filters_are_exact() {
    let mut q1 = control("q1", 2010, 90.0, 0.0);
    q1.quarter = 1;
    q1.month = 2;
    let q2 = control("q2", 2010, 90.0, 0.0);
    let other_year = control("y", 2011, 90.0, 0.0);
    let rows = [q1, q2, other_year];
    let data: Vec<_> = rows.iter().map(|r| at(r, 0.0)).collect();

    assert_eq!(by_year(&data, 2010).len(), 2);
    assert_eq!(by_quarter(&data, 1).len(), 1);
    assert_eq!(by_month(&data, 2).len(), 1);
    assert_eq!(by_month(&data, 6).len(), 2);
}

#[test]
fn both_years_requires_prior_year_match() {
    let mut held = control("held", 2015, 86.0, 0.0);
    held.l_year = Some(2010);
    let mut other = control("other", 2015, 86.0, 0.0);
    other.l_year = Some(2008);
    let no_prior = control("none", 2015, 86.0, 0.0);
    let rows = [held, other, no_prior];
    let data: Vec<_> = rows.iter().map(|r| at(r, 0.0)).collect();

    let kept = by_years(&data, 2015, 2010);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].row.property_id, "held");
}

#[test]
fn restrictions_do_not_touch_their_input() {
    let rows = [control("a", 2010, 90.0, 0.0), control("b", 2011, 50.0, 0.0)];
    let data: Vec<_> = rows.iter().map(|r| at(r, 3.0)).collect();

    let _ = by_year(&data, 2010);
    let _ = by_location(&data, 1.0);
    assert_eq!(data.len(), 2);
}

#[test]
fn purchase_target_uses_prior_transaction() {
    let config = MatchConfig::default_test();
    let t = treated("T");
    let target = Target::for_side(&t, Side::Purchase, &config).unwrap();

    assert_eq!(target.year, 2010);
    assert_eq!(target.duration, 90.0);
    assert_eq!(target.quarter, None);
    assert_eq!(target.l_year, None);
}

#[test]
fn sale_target_uses_would_have_been_duration() {
    let config = MatchConfig { restrict_quarter: true, ..MatchConfig::default_test() };
    let t = treated("T");
    let target = Target::for_side(&t, Side::Sale, &config).unwrap();

    assert_eq!(target.year, 2015);
    assert_eq!(target.duration, 86.0);
    assert_eq!(target.quarter, Some(2));
    assert_eq!(target.month, None);
}

#[test]
fn missing_purchase_quarter_is_a_contract_violation() {
    let config = MatchConfig { restrict_quarter: true, ..MatchConfig::default_test() };
    let mut t = treated("T");
    t.l_quarter = None;

    assert!(Target::for_side(&t, Side::Purchase, &config).is_err());
}

#[test]
fn combined_restriction_applies_year_duration_and_quarter() {
    let config = MatchConfig { restrict_quarter: true, ..MatchConfig::default_test() };
    let t = treated("T");
    let target = Target::for_side(&t, Side::Purchase, &config).unwrap();

    let mut wrong_quarter = control("wrong-quarter", 2010, 90.0, 0.0);
    wrong_quarter.quarter = 3;
    let mut right = control("right", 2010, 91.0, 0.0);
    right.quarter = 1;
    let mut wrong_year = control("wrong-year", 2011, 90.0, 0.0);
    wrong_year.quarter = 1;
    let rows = [wrong_quarter, right, wrong_year];
    let data: Vec<_> = rows.iter().map(|r| at(r, 0.0)).collect();

    let kept = restrict(&data, &target, config.duration_margin);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].row.property_id, "right");
}
