//! SKU classification.
//!
//! Two-level, first-match-wins classification of a normalized SKU:
//!
//! 1. a broad category [`Bucket`], decided by an ordered rule table - the
//!    structured `resourceFamily` field outranks service-name keywords,
//!    which outrank free-text description keywords (the least reliable
//!    signal); anything unmatched lands in `other`
//! 2. a [`PriceType`] tag with an optional machine family, decided by a
//!    second keyword pass - storage signals win over core signals, core
//!    signals over memory signals, and the remainder is `software`
//!
//! Rule order matters: the keyword sets overlap, and the precedence here is
//! the tie-break. The whole pass is pure and total - every SKU gets exactly
//! one outcome, never an error.

use crate::models::{Bucket, Classification, NormalizedSku, PriceType};
use once_cell::sync::Lazy;
use regex::Regex;

/// One row of the bucket rule table. Rows are evaluated in declaration
/// order, service keywords across all rows before description keywords.
pub struct BucketRule {
    pub bucket: Bucket,
    pub resource_families: &'static [&'static str],
    pub service_keywords: &'static [&'static str],
    pub description_keywords: &'static [&'static str],
}

/// Ordered bucket rules. `storage` before `compute` before `network` is
/// deliberate: "storage" appears in compute service names and "network" in
/// database descriptions often enough that reordering changes outcomes.
pub const BUCKET_RULES: &[BucketRule] = &[
    BucketRule {
        bucket: Bucket::Storage,
        resource_families: &["storage"],
        service_keywords: &["storage", "cloud storage", "filestore", "memorystore"],
        description_keywords: &["storage", "gb", "tb"],
    },
    BucketRule {
        bucket: Bucket::Compute,
        resource_families: &["compute"],
        service_keywords: &["compute", "vm", "instance", "gke", "kubernetes", "run", "functions"],
        description_keywords: &["cpu", "ram", "memory", "core"],
    },
    BucketRule {
        bucket: Bucket::Network,
        resource_families: &["network"],
        service_keywords: &["network", "vpc", "load balancer", "cdn", "gateway"],
        description_keywords: &["network", "bandwidth", "transfer"],
    },
    BucketRule {
        bucket: Bucket::Database,
        resource_families: &["database"],
        service_keywords: &["sql", "database", "firestore", "bigtable", "spanner", "alloydb"],
        description_keywords: &["database", "sql", "query"],
    },
    BucketRule {
        bucket: Bucket::AiMl,
        resource_families: &["ai/ml", "ai", "ml"],
        service_keywords: &["ai", "ml", "vertex", "notebooks", "composer", "dataflow"],
        description_keywords: &["ai", "ml", "machine learning", "tensorflow"],
    },
];

/// Description keywords that force `priceType = storage` regardless of the
/// resource family spelling.
const STORAGE_TYPE_KEYWORDS: &[&str] = &[
    "persistent disk",
    "pd-",
    "hyperdisk",
    "local ssd",
    "ssd",
    "hdd",
    "filestore",
];

const CORE_KEYWORDS: &[&str] = &["vcpu", "core", "cpu"];
const MEMORY_KEYWORDS: &[&str] = &["ram", "memory"];

// Family token like `e2`, `n2d`, `c3`: anchored at the start of the
// description, terminated by a dash or word boundary ("n2-standard",
// "N2 Instance Core"). The in-string fallback requires the dash so that
// arbitrary mid-sentence tokens do not read as families.
static FAMILY_AT_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-z]\d+[a-z]?)(?:-|\b)").expect("valid family regex"));
static FAMILY_ANYWHERE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([a-z]\d+[a-z]?)-").expect("valid family regex"));

/// Classify one normalized SKU. Pure and total.
pub fn classify(sku: &NormalizedSku) -> Classification {
    let bucket = classify_bucket(sku);
    let (price_type, machine_family) = classify_price_type(sku);
    Classification {
        bucket,
        price_type,
        machine_family,
    }
}

/// First level: the broad category bucket.
pub fn classify_bucket(sku: &NormalizedSku) -> Bucket {
    let resource_family = sku.category.resource_family.to_lowercase();
    let service_name = sku.service_name.to_lowercase();
    let description = sku.description.to_lowercase();

    // Structured field equality beats any text heuristic.
    for rule in BUCKET_RULES {
        if rule.resource_families.contains(&resource_family.as_str()) {
            return rule.bucket;
        }
    }

    for rule in BUCKET_RULES {
        if rule.service_keywords.iter().any(|k| service_name.contains(k)) {
            return rule.bucket;
        }
    }

    for rule in BUCKET_RULES {
        if rule.description_keywords.iter().any(|k| description.contains(k)) {
            return rule.bucket;
        }
    }

    Bucket::Other
}

/// Second level: the price type tag and, for cores/memory, the machine
/// family extracted from the description.
pub fn classify_price_type(sku: &NormalizedSku) -> (PriceType, Option<String>) {
    let description = sku.description.to_lowercase();
    let resource_family = sku.category.resource_family.to_lowercase();
    let resource_group = sku.category.resource_group.to_lowercase();

    if resource_family == "storage" || STORAGE_TYPE_KEYWORDS.iter().any(|k| description.contains(k)) {
        return (PriceType::Storage, None);
    }

    if resource_family == "compute"
        || resource_group == "cpu"
        || CORE_KEYWORDS.iter().any(|k| description.contains(k))
    {
        return (PriceType::Cores, extract_machine_family(&description));
    }

    if resource_group == "ram" || MEMORY_KEYWORDS.iter().any(|k| description.contains(k)) {
        return (PriceType::Memory, extract_machine_family(&description));
    }

    (PriceType::Software, None)
}

/// Machine family token from a lower-cased description, anchored at the
/// start first, anywhere in the string as fallback.
pub fn extract_machine_family(text: &str) -> Option<String> {
    let text = text.to_lowercase();
    if let Some(caps) = FAMILY_AT_START.captures(&text) {
        return Some(caps[1].to_string());
    }
    FAMILY_ANYWHERE
        .captures(&text)
        .map(|caps| caps[1].to_string())
}
