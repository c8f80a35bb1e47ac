//! HeatCheck sales call analytics.
//!
//! Freeform call analysis text goes through [`extract`] to become an
//! [`ExtractedCall`], and batches of extracted calls are folded by
//! [`aggregate`] into per-member and per-client metrics. Everything else in the
//! crate (Postgres access, CSV import/export, markdown reports) feeds or
//! consumes those two steps.

pub mod aggregate;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod extract;
pub mod filter;
pub mod ingest;
pub mod models;
pub mod normalize;
pub mod projection;
pub mod report;
pub mod timeframe;

pub use aggregate::{aggregate, aggregate_analyzed, ConversionClassifier, TeamReport};
pub use error::{Error, Result};
pub use extract::{extract, Extractor};
pub use models::{ExtractedCall, Objection, RawCall};
