//! Shared fixtures for integration tests.
#![allow(dead_code)]

use chrono::NaiveDate;
use leasecontrols_core::record::Transaction;
use std::collections::BTreeMap;

/// Kilometers per degree of latitude under the haversine Earth radius.
pub const KM_PER_DEG_LAT: f64 = 6371.0 * std::f64::consts::PI / 180.0;

pub const ORIGIN_LAT: f64 = 51.5;
pub const ORIGIN_LON: f64 = -0.12;

/// A treated unit at the origin: bought in 2010 with 90 years left, sold in
/// 2015 with 85 left (86 had it not been extended).
pub fn treated(id: &str) -> Transaction {
    Transaction {
        property_id:  id.into(),
        date_trans:   NaiveDate::from_ymd_opt(2015, 6, 15).unwrap(),
        year:         2015,
        quarter:      2,
        month:        6,
        l_year:       Some(2010),
        l_quarter:    Some(1),
        l_month:      Some(2),
        duration:     85.0,
        l_duration:   Some(90.0),
        whb_duration: Some(86.0),
        latitude:     ORIGIN_LAT,
        longitude:    ORIGIN_LON,
        postcode:     "SW1A 1AA".into(),
        outcode:      "SW1A".into(),
        area:         "A1".into(),
        log_price:    Some(12.0),
        extension:    1,
        extra:        BTreeMap::new(),
    }
}

/// A control transaction `km` north of the origin.
pub fn control(id: &str, year: i32, duration: f64, km: f64) -> Transaction {
    Transaction {
        property_id:  id.into(),
        date_trans:   NaiveDate::from_ymd_opt(year, 6, 1).unwrap(),
        year,
        quarter:      2,
        month:        6,
        l_year:       None,
        l_quarter:    None,
        l_month:      None,
        duration,
        l_duration:   None,
        whb_duration: Some(duration),
        latitude:     ORIGIN_LAT + km / KM_PER_DEG_LAT,
        longitude:    ORIGIN_LON,
        postcode:     "SW1A 2AA".into(),
        outcode:      "SW1A".into(),
        area:         "A1".into(),
        log_price:    Some(11.0),
        extension:    0,
        extra:        BTreeMap::new(),
    }
}

pub fn with_price(mut row: Transaction, log_price: f64) -> Transaction {
    row.log_price = Some(log_price);
    row
}

pub fn in_area(mut row: Transaction, area: &str) -> Transaction {
    row.area = area.into();
    row
}

pub fn ids(refs: &[leasecontrols_core::search::ControlRef]) -> Vec<String> {
    refs.iter().map(|c| c.property_id.clone()).collect()
}

/// Initialise logging once; repeated calls are harmless.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
