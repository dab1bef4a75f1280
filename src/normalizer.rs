//! Catalog normalization.
//!
//! Converts raw provider SKUs into the uniform [`NormalizedSku`] shape the
//! rest of the pipeline reads. A SKU with no pricing-info block, no tiered
//! rates, or a zero unit price normalizes to `None` and is excluded from all
//! downstream processing - an expected filter, not an error.
//!
//! Only the first tiered rate of the first pricing-info block is consumed;
//! multi-tier pricing beyond the first breakpoint is deliberately collapsed
//! for this system's scope.

use crate::models::{NormalizedSku, RawSku};

const NANOS_PER_UNIT: f64 = 1_000_000_000.0;
const DEFAULT_PRICING_UNIT: &str = "hour";

/// Normalize one raw SKU, stamping the catalog-level region. A sync run
/// operates against one target region at a time, so the region comes from
/// the catalog metadata, never from the SKU itself.
pub fn normalize(
    sku: &RawSku,
    service_name: &str,
    service_id: &str,
    region: &str,
) -> Option<NormalizedSku> {
    let pricing = sku.pricing_info.first()?;
    let rate = pricing.pricing_expression.tiered_rates.first()?;
    let unit_price = rate.unit_price.as_ref()?;

    let cost = unit_price.units as f64 + unit_price.nanos as f64 / NANOS_PER_UNIT;
    if cost <= 0.0 {
        return None;
    }

    let pricing_unit = pricing
        .pricing_expression
        .usage_unit
        .clone()
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| DEFAULT_PRICING_UNIT.to_string());

    Some(NormalizedSku {
        id: sku.sku_id.clone(),
        description: sku.description.clone(),
        service_name: service_name.to_string(),
        service_id: service_id.to_string(),
        category: sku.category.clone(),
        pricing_unit,
        unit_price: cost,
        region: region.to_string(),
    })
}
