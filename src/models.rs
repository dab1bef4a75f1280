//! Core Data Models
//!
//! Defines the data structures used across the price sync pipeline, in the
//! order the data flows through them:
//!
//! 1. **Raw catalog**: [`RawSku`], [`Service`], [`SkuCatalog`] - the provider's
//!    native billing schema, immutable once fetched
//! 2. **Normalization**: [`NormalizedSku`] - the uniform internal record every
//!    downstream stage reads
//! 3. **Classification**: [`Classification`], [`Bucket`], [`PriceType`] -
//!    derived per SKU, never persisted on its own
//! 4. **Target entities**: [`PriceRecord`], [`PriceSet`], [`ServicePlan`] -
//!    the only entities with cross-run identity, keyed by deterministic `code`
//!
//! Raw SKUs are discarded after normalization; normalized records and
//! classifications are recomputed from the catalog snapshot on every run.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A single SKU in the provider's native billing schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSku {
    #[serde(default, rename = "skuId")]
    pub sku_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: SkuCategory,
    #[serde(default, rename = "pricingInfo")]
    pub pricing_info: Vec<PricingInfo>,
    #[serde(default, rename = "geoTaxonomy")]
    pub geo_taxonomy: GeoTaxonomy,
    #[serde(default, rename = "serviceRegions")]
    pub service_regions: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkuCategory {
    #[serde(default, rename = "resourceFamily")]
    pub resource_family: String,
    #[serde(default, rename = "resourceGroup")]
    pub resource_group: String,
    #[serde(default, rename = "usageType")]
    pub usage_type: String,
    #[serde(default, rename = "serviceDisplayName")]
    pub service_display_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PricingInfo {
    #[serde(default, rename = "pricingExpression")]
    pub pricing_expression: PricingExpression,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PricingExpression {
    #[serde(default, rename = "usageUnit")]
    pub usage_unit: Option<String>,
    #[serde(default, rename = "tieredRates")]
    pub tiered_rates: Vec<TieredRate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TieredRate {
    #[serde(default, rename = "unitPrice")]
    pub unit_price: Option<UnitPrice>,
}

/// Unit price split into whole currency units and fractional nano-units.
/// The catalog API serializes `units` as a JSON string (proto int64), but
/// older snapshots carry plain numbers, so both are accepted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnitPrice {
    #[serde(default, deserialize_with = "de_i64_or_string")]
    pub units: i64,
    #[serde(default)]
    pub nanos: i64,
    #[serde(default, rename = "currencyCode")]
    pub currency_code: Option<String>,
}

fn de_i64_or_string<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IntOrString {
        Int(i64),
        Str(String),
    }

    match IntOrString::deserialize(deserializer)? {
        IntOrString::Int(n) => Ok(n),
        IntOrString::Str(s) => s.trim().parse::<i64>().map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeoTaxonomy {
    #[serde(default, rename = "type")]
    pub taxonomy_type: String,
    #[serde(default)]
    pub regions: Vec<String>,
}

/// A billing-catalog service entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Service {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "serviceId")]
    pub service_id: String,
    #[serde(default, rename = "displayName")]
    pub display_name: String,
}

impl Service {
    /// The service identifier, falling back to the trailing segment of the
    /// resource name (`services/6F81-5844-456A`) when `serviceId` is absent.
    pub fn id(&self) -> &str {
        if !self.service_id.is_empty() {
            return &self.service_id;
        }
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

/// On-disk catalog snapshot: every fetched service with its SKUs, plus the
/// fetch metadata. `metadata.region` is the region all SKUs were filtered
/// against and the region stamped on every normalized record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkuCatalog {
    pub services: BTreeMap<String, ServiceEntry>,
    pub metadata: CatalogMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceEntry {
    pub service_info: Service,
    pub skus: Vec<RawSku>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogMetadata {
    pub region: String,
    pub total_services: usize,
    pub total_skus: usize,
    #[serde(default)]
    pub downloaded_at: String,
}

impl SkuCatalog {
    pub fn total_skus(&self) -> usize {
        self.services.values().map(|s| s.skus.len()).sum()
    }
}

/// The uniform internal record produced by the normalizer. Downstream stages
/// only ever read this shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedSku {
    pub id: String,
    pub description: String,
    pub service_name: String,
    pub service_id: String,
    pub category: SkuCategory,
    pub pricing_unit: String,
    /// Unit price in USD, `units + nanos / 1e9` from the first tiered rate.
    pub unit_price: f64,
    pub region: String,
}

/// Broad category bucket a SKU falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Compute,
    Storage,
    Network,
    Database,
    AiMl,
    Other,
}

impl Bucket {
    pub const ALL: [Bucket; 6] = [
        Bucket::Compute,
        Bucket::Storage,
        Bucket::Network,
        Bucket::Database,
        Bucket::AiMl,
        Bucket::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Compute => "compute",
            Bucket::Storage => "storage",
            Bucket::Network => "network",
            Bucket::Database => "database",
            Bucket::AiMl => "ai_ml",
            Bucket::Other => "other",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Price type tag carried by a price record. The classifier only ever emits
/// `Cores`, `Memory`, `Storage` and `Software`; the remaining variants cover
/// payloads assembled elsewhere and go through the same validation as
/// everything else before a create call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PriceType {
    Compute,
    Cores,
    Memory,
    Storage,
    Software,
    DataTransfer,
    Quantity,
}

impl PriceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceType::Compute => "compute",
            PriceType::Cores => "cores",
            PriceType::Memory => "memory",
            PriceType::Storage => "storage",
            PriceType::Software => "software",
            PriceType::DataTransfer => "dataTransfer",
            PriceType::Quantity => "quantity",
        }
    }
}

impl fmt::Display for PriceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification outcome for one normalized SKU. Total: every SKU gets
/// exactly one of these, never an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub bucket: Bucket,
    pub price_type: PriceType,
    pub machine_family: Option<String>,
}

/// A price record destined for the target system, keyed by its
/// deterministic `code`. Created once per distinct code; later runs detect
/// the existing code and skip creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceRecord {
    pub code: String,
    pub name: String,
    pub price_type: PriceType,
    pub price_unit: String,
    pub cost: f64,
    pub currency: String,
    pub incur_charges: bool,
    pub active: bool,
    // Grouping tags used by the aggregator, not sent to the target system.
    pub bucket: Bucket,
    pub machine_family: Option<String>,
    pub region: String,
    pub sku_id: String,
    pub service_name: String,
    pub description: String,
}

impl PriceRecord {
    /// The create payload the target system expects.
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "price": {
                "name": self.name,
                "code": self.code,
                "priceType": self.price_type.as_str(),
                "priceUnit": self.price_unit,
                "price": self.cost,
                "cost": self.cost,
                "incurCharges": self.incur_charges,
                "currency": self.currency,
                "active": self.active,
            }
        })
    }
}

/// The grouping axis a price set was built along.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceSetKind {
    /// One set per non-empty bucket, plus the comprehensive union.
    Category { category: String },
    /// One set per (machine family, region) pair.
    Component { machine_family: String, region: String },
}

/// A named grouping of price references, keyed by deterministic `code`.
///
/// Category sets reference members by price code (they are built before any
/// target-system identifiers exist); component sets reference members by the
/// target-system id resolved through the injected lookup. Membership is a
/// set on both axes: a price is referenced at most once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSet {
    pub code: String,
    pub name: String,
    pub kind: PriceSetKind,
    pub price_unit: String,
    pub region_code: Option<String>,
    #[serde(default)]
    pub price_codes: BTreeSet<String>,
    #[serde(default)]
    pub price_ids: BTreeSet<i64>,
    #[serde(default)]
    pub component_types: BTreeSet<PriceType>,
    /// Required component types absent from a family/region group. Empty for
    /// complete sets and for category sets.
    #[serde(default)]
    pub missing_components: Vec<PriceType>,
}

impl PriceSet {
    pub fn is_complete(&self) -> bool {
        self.missing_components.is_empty()
    }

    pub fn member_count(&self) -> usize {
        self.price_codes.len() + self.price_ids.len()
    }
}

/// A target-system service plan, as returned by its API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServicePlan {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "provisionType")]
    pub provision_type: ProvisionType,
    #[serde(default)]
    pub config: PlanConfig,
    #[serde(default, rename = "priceSets")]
    pub price_sets: Vec<PriceSetRef>,
    #[serde(default)]
    pub zone: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvisionType {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanConfig {
    #[serde(default, rename = "zoneRegion")]
    pub zone_region: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default, rename = "availabilityZone")]
    pub availability_zone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceSetRef {
    #[serde(default)]
    pub id: i64,
}

/// Per-stage outcome counters. Every run reports these; no record is
/// dropped without a logged reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub created: usize,
    pub skipped: usize,
    pub errored: usize,
}

impl SyncOutcome {
    pub fn total(&self) -> usize {
        self.created + self.skipped + self.errored
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} skipped, {} errored",
            self.created, self.skipped, self.errored
        )
    }
}
