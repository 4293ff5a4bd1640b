//! Matched-control search for lease-extension transactions.
//!
//! For every treated transaction, find nearby control transactions with a
//! similar lease duration that transacted in the same period, then report
//! either their identities or descriptive statistics over them.

pub mod coalesce;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod geo;
pub mod output;
pub mod partition;
pub mod prepare;
pub mod record;
pub mod restrict;
pub mod search;
pub mod store;
pub mod types;
