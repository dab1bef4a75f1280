//! Price record assembly.
//!
//! Runs every catalog SKU through normalize -> classify -> code and emits
//! the [`PriceRecord`]s the synchronizer will reconcile against the target
//! system. Unpriced SKUs drop out here with a debug log; everything else
//! maps to exactly one record with a deterministic code.

use crate::classifier::classify;
use crate::codes::price_code;
use crate::models::{Bucket, PriceRecord, SkuCatalog};
use crate::normalizer::normalize;
use std::collections::BTreeMap;
use tracing::{debug, info};

const CURRENCY: &str = "USD";

pub fn build_price_records(catalog: &SkuCatalog, prefix: &str) -> Vec<PriceRecord> {
    let region = &catalog.metadata.region;
    let mut records = Vec::new();
    let mut excluded = 0usize;

    for entry in catalog.services.values() {
        let service_name = entry.service_info.display_name.clone();
        let service_id = entry.service_info.id().to_string();

        for raw in &entry.skus {
            let Some(sku) = normalize(raw, &service_name, &service_id, region) else {
                debug!(sku_id = %raw.sku_id, "Skipping SKU without a usable unit price");
                excluded += 1;
                continue;
            };

            let classification = classify(&sku);
            let code = price_code(
                prefix,
                classification.price_type,
                classification.machine_family.as_deref(),
                region,
                &sku.id,
            );

            records.push(PriceRecord {
                code,
                name: format!("{prefix} - {}", sku.description),
                price_type: classification.price_type,
                price_unit: sku.pricing_unit,
                cost: sku.unit_price,
                currency: CURRENCY.to_string(),
                incur_charges: true,
                active: true,
                bucket: classification.bucket,
                machine_family: classification.machine_family,
                region: region.clone(),
                sku_id: sku.id,
                service_name: sku.service_name,
                description: sku.description,
            });
        }
    }

    info!(
        records = records.len(),
        excluded,
        region = %region,
        "Built price records from catalog"
    );
    records
}

/// Record counts per bucket, for run summaries.
pub fn bucket_counts(records: &[PriceRecord]) -> BTreeMap<Bucket, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        *counts.entry(record.bucket).or_insert(0) += 1;
    }
    counts
}
