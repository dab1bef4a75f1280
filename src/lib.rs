//! GCP Price Sync Library
//!
//! Turns a raw GCP billing catalog into idempotent Morpheus pricing
//! primitives: normalized price records, price sets grouped by category and
//! by machine family/region, and service-plan attachments.
//!
//! ## Pipeline
//!
//! Data moves through the stages in a fixed order, each stage reading only
//! the previous stage's output:
//!
//! 1. [`catalog`] - fetch services and region-filtered SKUs (live REST or
//!    snapshot fixture, swappable behind [`catalog::CatalogSource`])
//! 2. [`normalizer`] - collapse each raw SKU to a single-decimal unit price
//!    and a stable category; unpriced SKUs drop out here
//! 3. [`classifier`] - ordered keyword/regex rules produce a bucket, a
//!    price type and an optional machine family per SKU
//! 4. [`codes`] - deterministic identifiers; identical inputs yield
//!    byte-identical codes across runs
//! 5. [`aggregator`] - price sets along the category and family/region axes
//! 6. [`sync`] - create-or-skip reconciliation against the target system
//!
//! Everything is strictly sequential: one request at a time, one writer per
//! run. Idempotent codes make an interrupted run safely re-runnable.
//!
//! ## Key Types
//!
//! - [`models::SkuCatalog`] - the on-disk catalog snapshot
//! - [`models::PriceRecord`] / [`models::PriceSet`] - target-system entities
//! - [`sync::Synchronizer`] - the reconciliation engine
//! - [`error::ApiError`] - the client/sync error taxonomy

pub mod aggregator;
pub mod catalog;
pub mod classifier;
pub mod client;
pub mod codes;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod normalizer;
pub mod plans;
pub mod pricing;
pub mod report;
pub mod snapshot;
pub mod sync;

pub use error::ApiError;
pub use models::*;
