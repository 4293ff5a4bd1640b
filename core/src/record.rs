//! Transaction records, the rows every stage of the pipeline works on.
//!
//! RULE: Records are read once per run and never mutated afterwards.
//! Every stage takes records by reference and builds new tables.

use crate::{
    error::{ControlError, ControlResult},
    geo::Coordinates,
    types::{Area, PropertyId, Year},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One transaction event for one property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub property_id:  PropertyId,
    pub date_trans:   NaiveDate,
    pub year:         Year,
    pub quarter:      u32,
    pub month:        u32,
    /// Year of the prior (purchase) transaction of the same property.
    #[serde(rename = "L_year")]
    pub l_year:       Option<Year>,
    #[serde(rename = "L_quarter")]
    pub l_quarter:    Option<u32>,
    #[serde(rename = "L_month")]
    pub l_month:      Option<u32>,
    /// Remaining lease term at sale, in years.
    pub duration:     f64,
    /// Remaining lease term at purchase, in years.
    #[serde(rename = "L_duration")]
    pub l_duration:   Option<f64>,
    /// Lease term the property would have shown at sale absent an extension.
    pub whb_duration: Option<f64>,
    pub latitude:     f64,
    pub longitude:    f64,
    pub postcode:     String,
    pub outcode:      String,
    pub area:         Area,
    pub log_price:    Option<f64>,
    /// 1 for a treated unit, 0 for an eligible control.
    pub extension:    u8,
    /// Any other numeric column, e.g. alternative outcome variables.
    #[serde(default)]
    pub extra:        BTreeMap<String, f64>,
}

impl Transaction {
    pub fn is_treated(&self) -> bool {
        self.extension == 1
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates::from_degrees(self.latitude, self.longitude)
    }

    /// Look up a numeric field by its column name.
    ///
    /// Returns `Ok(None)` when the column exists but the value is missing,
    /// and `UnknownField` when no such column exists on this record.
    pub fn numeric(&self, field: &str) -> ControlResult<Option<f64>> {
        let value = match field {
            "duration"     => Some(self.duration),
            "L_duration"   => self.l_duration,
            "whb_duration" => self.whb_duration,
            "log_price"    => self.log_price,
            "latitude"     => Some(self.latitude),
            "longitude"    => Some(self.longitude),
            "year"         => Some(f64::from(self.year)),
            "L_year"       => self.l_year.map(f64::from),
            "quarter"      => Some(f64::from(self.quarter)),
            "month"        => Some(f64::from(self.month)),
            other => match self.extra.get(other) {
                Some(v) => Some(*v),
                None => return Err(ControlError::UnknownField { field: other.to_string() }),
            },
        };
        Ok(value.filter(|v| !v.is_nan()))
    }

    /// Like `numeric`, but a missing value is an input-contract violation.
    pub fn require(&self, field: &str) -> ControlResult<f64> {
        self.numeric(field)?.ok_or_else(|| ControlError::MissingField {
            field:       field.to_string(),
            property_id: self.property_id.clone(),
        })
    }

    /// Build a record from `(column, raw value)` pairs as found in a
    /// tabular extract. Unrecognised numeric columns land in `extra`, with
    /// missing cells kept as NaN so the column stays known; unrecognised
    /// text columns are ignored.
    pub fn from_columns<'a, I>(columns: I) -> ControlResult<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let fields: BTreeMap<&str, &str> = columns
            .into_iter()
            .map(|(k, v)| (k.trim(), v.trim()))
            .collect();

        let property_id = text(&fields, "property_id", "")?;
        let pid = property_id.as_str();

        let mut extra = BTreeMap::new();
        for (name, raw) in &fields {
            if KNOWN_COLUMNS.contains(name) {
                continue;
            }
            match parse_f64(name, raw) {
                Ok(v) => {
                    extra.insert(name.to_string(), v.unwrap_or(f64::NAN));
                }
                Err(_) => continue,
            }
        }

        Ok(Self {
            date_trans:   parse_date(&text(&fields, "date_trans", pid)?)?,
            year:         required_int(&fields, "year", pid)?,
            quarter:      required_int(&fields, "quarter", pid)?,
            month:        required_int(&fields, "month", pid)?,
            l_year:       optional_int(&fields, "L_year")?,
            l_quarter:    optional_int(&fields, "L_quarter")?,
            l_month:      optional_int(&fields, "L_month")?,
            duration:     required_f64(&fields, "duration", pid)?,
            l_duration:   optional_f64(&fields, "L_duration")?,
            whb_duration: optional_f64(&fields, "whb_duration")?,
            latitude:     required_f64(&fields, "latitude", pid)?,
            longitude:    required_f64(&fields, "longitude", pid)?,
            postcode:     text(&fields, "postcode", pid)?,
            outcode:      text(&fields, "outcode", pid)?,
            area:         text(&fields, "area", pid)?,
            log_price:    optional_f64(&fields, "log_price")?,
            extension:    required_int(&fields, "extension", pid)?,
            extra,
            property_id,
        })
    }
}

const KNOWN_COLUMNS: &[&str] = &[
    "property_id", "date_trans", "year", "quarter", "month", "L_year", "L_quarter",
    "L_month", "duration", "L_duration", "whb_duration", "latitude", "longitude",
    "postcode", "outcode", "area", "log_price", "extension",
];

fn is_missing(raw: &str) -> bool {
    matches!(raw, "" | "nan" | "NaN" | "NA" | "<NA>" | "None" | "null")
}

fn text(fields: &BTreeMap<&str, &str>, name: &str, pid: &str) -> ControlResult<String> {
    fields
        .get(name)
        .map(|v| v.to_string())
        .ok_or_else(|| ControlError::MissingField {
            field:       name.to_string(),
            property_id: pid.to_string(),
        })
}

fn parse_f64(name: &str, raw: &str) -> ControlResult<Option<f64>> {
    if is_missing(raw) {
        return Ok(None);
    }
    raw.parse::<f64>().map(Some).map_err(|_| ControlError::NonNumeric {
        field: name.to_string(),
        value: raw.to_string(),
    })
}

fn optional_f64(fields: &BTreeMap<&str, &str>, name: &str) -> ControlResult<Option<f64>> {
    match fields.get(name) {
        Some(raw) => parse_f64(name, raw),
        None => Ok(None),
    }
}

fn required_f64(fields: &BTreeMap<&str, &str>, name: &str, pid: &str) -> ControlResult<f64> {
    optional_f64(fields, name)?.ok_or_else(|| ControlError::MissingField {
        field:       name.to_string(),
        property_id: pid.to_string(),
    })
}

/// Integer columns are often written as floats ("2015.0") by upstream tools.
fn optional_int<T: TryFrom<i64>>(fields: &BTreeMap<&str, &str>, name: &str) -> ControlResult<Option<T>> {
    let Some(v) = optional_f64(fields, name)? else {
        return Ok(None);
    };
    let non_integral = || ControlError::NonNumeric {
        field: name.to_string(),
        value: v.to_string(),
    };
    if v.fract() != 0.0 || !v.is_finite() {
        return Err(non_integral());
    }
    T::try_from(v as i64).map(Some).map_err(|_| non_integral())
}

fn required_int<T: TryFrom<i64>>(fields: &BTreeMap<&str, &str>, name: &str, pid: &str) -> ControlResult<T> {
    optional_int(fields, name)?.ok_or_else(|| ControlError::MissingField {
        field:       name.to_string(),
        property_id: pid.to_string(),
    })
}

/// Accepts `YYYY-MM-DD`, optionally followed by a time component.
fn parse_date(raw: &str) -> ControlResult<NaiveDate> {
    let date_part = raw.split([' ', 'T']).next().unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|_| ControlError::InvalidDate {
        value: raw.to_string(),
    })
}
