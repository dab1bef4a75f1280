//! Deterministic code construction for prices, price sets and service plans.
//!
//! Codes are pure functions of their inputs: no randomness, no timestamps,
//! no counters. Re-running the pipeline against an unchanged catalog
//! reproduces byte-identical codes, which is what makes the synchronizer's
//! skip-if-exists check correct across runs.

use crate::models::PriceType;

const PROVIDER_TAG: &str = "gcp";
const SEPARATOR: char = '.';

/// Region with dashes flattened to underscores, as used inside codes
/// (`asia-southeast2` -> `asia_southeast2`).
pub fn region_key(region: &str) -> String {
    region.replace('-', "_")
}

/// Code for a single price record:
/// `{prefix}.gcp.{priceType}[.{family}].{region_key}.{skuId}`, lower-cased.
pub fn price_code(
    prefix: &str,
    price_type: PriceType,
    machine_family: Option<&str>,
    region: &str,
    sku_id: &str,
) -> String {
    let mut parts: Vec<String> = vec![
        prefix.to_string(),
        PROVIDER_TAG.to_string(),
        price_type.as_str().to_string(),
    ];
    if let Some(family) = machine_family {
        parts.push(family.to_string());
    }
    parts.push(region_key(region));
    parts.push(sku_id.to_string());

    parts
        .join(&SEPARATOR.to_string())
        .to_lowercase()
}

/// Code for a component price set grouped by machine family and region:
/// `{prefix}.gcp-{family}-{region_key}`, lower-cased.
pub fn component_set_code(prefix: &str, machine_family: &str, region: &str) -> String {
    format!(
        "{}{}{}-{}-{}",
        prefix,
        SEPARATOR,
        PROVIDER_TAG,
        machine_family,
        region_key(region)
    )
    .to_lowercase()
}

/// Code for a category price set: `{prefix}.gcp-{category}-prices`,
/// lower-cased. The comprehensive union set uses `comprehensive` as its
/// category.
pub fn category_set_code(prefix: &str, category: &str) -> String {
    format!("{}{}{}-{}-prices", prefix, SEPARATOR, PROVIDER_TAG, category).to_lowercase()
}

/// Code for a derived service plan: `gcp-{instance_type}`, lower-cased.
pub fn plan_code(instance_type: &str) -> String {
    format!("{}-{}", PROVIDER_TAG, instance_type).to_lowercase()
}
