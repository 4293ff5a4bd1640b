//! Shared primitive types used across the entire matching pipeline.

/// A property identifier. Unique per property, not per transaction.
pub type PropertyId = String;

/// A calendar year of a transaction.
pub type Year = i32;

/// A search radius or a great-circle distance, in kilometers.
pub type Km = f64;

/// Coarse geographic bucket used as a partition key.
pub type Area = String;

/// The canonical run identifier used by the store.
pub type RunId = String;
