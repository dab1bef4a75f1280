//! Price set aggregation.
//!
//! Groups classified price records into price sets along two axes:
//!
//! - **category** - one set per non-empty bucket plus a comprehensive union,
//!   membership by price code
//! - **component** - one set per (machine family, region) built from
//!   `cores`/`memory` records, with every `storage` price of the same region
//!   unioned in (storage is not family-specific); membership by the
//!   target-system id resolved through the injected lookup
//!
//! A family/region group missing one of the required component types is
//! logged and still emitted - the caller may create the partial set and
//! attach the rest later.

use crate::codes::{category_set_code, component_set_code};
use crate::models::{Bucket, PriceRecord, PriceSet, PriceSetKind, PriceType};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, warn};

const COMPREHENSIVE: &str = "comprehensive";

/// The component types a complete family/region set carries.
pub const REQUIRED_COMPONENTS: [PriceType; 3] =
    [PriceType::Cores, PriceType::Memory, PriceType::Storage];

pub fn build_category_price_sets(records: &[PriceRecord], prefix: &str) -> Vec<PriceSet> {
    let mut by_bucket: BTreeMap<Bucket, BTreeSet<String>> = BTreeMap::new();
    let mut all_codes: BTreeSet<String> = BTreeSet::new();

    for record in records {
        by_bucket
            .entry(record.bucket)
            .or_default()
            .insert(record.code.clone());
        all_codes.insert(record.code.clone());
    }

    let mut sets: Vec<PriceSet> = Bucket::ALL
        .iter()
        .filter_map(|bucket| {
            let codes = by_bucket.get(bucket)?;
            Some(category_set(prefix, bucket.as_str(), codes.clone()))
        })
        .collect();

    if !all_codes.is_empty() {
        sets.push(category_set(prefix, COMPREHENSIVE, all_codes));
    }
    sets
}

fn category_set(prefix: &str, category: &str, codes: BTreeSet<String>) -> PriceSet {
    PriceSet {
        code: category_set_code(prefix, category),
        name: format!("{}-{}-PRICES", prefix, category.to_uppercase()),
        kind: PriceSetKind::Category {
            category: category.to_string(),
        },
        price_unit: "month".to_string(),
        region_code: None,
        price_codes: codes,
        price_ids: BTreeSet::new(),
        component_types: BTreeSet::new(),
        missing_components: Vec::new(),
    }
}

/// Component sets per (machine family, region). Only records whose code is
/// present in `price_ids` participate: the aggregator organizes identifiers
/// the synchronizer already created, it never invents them.
pub fn build_component_price_sets(
    records: &[PriceRecord],
    price_ids: &HashMap<String, i64>,
    prefix: &str,
) -> Vec<PriceSet> {
    let mut storage_by_region: BTreeMap<String, BTreeSet<i64>> = BTreeMap::new();
    let mut groups: BTreeMap<(String, String), PriceSet> = BTreeMap::new();

    for record in records {
        let Some(&price_id) = price_ids.get(&record.code) else {
            debug!(code = %record.code, "No target-system id for price yet; not grouped");
            continue;
        };

        match record.price_type {
            PriceType::Storage => {
                storage_by_region
                    .entry(record.region.clone())
                    .or_default()
                    .insert(price_id);
            }
            PriceType::Cores | PriceType::Memory => {
                // Software-tagged and family-less records never form groups.
                let Some(family) = record.machine_family.clone() else {
                    continue;
                };
                let key = (family.clone(), record.region.clone());
                let set = groups.entry(key).or_insert_with(|| PriceSet {
                    code: component_set_code(prefix, &family, &record.region),
                    name: format!(
                        "{} - GCP - {} ({})",
                        prefix,
                        family.to_uppercase(),
                        record.region
                    ),
                    kind: PriceSetKind::Component {
                        machine_family: family.clone(),
                        region: record.region.clone(),
                    },
                    price_unit: "hour".to_string(),
                    region_code: Some(record.region.clone()),
                    price_codes: BTreeSet::new(),
                    price_ids: BTreeSet::new(),
                    component_types: BTreeSet::new(),
                    missing_components: Vec::new(),
                });
                set.price_ids.insert(price_id);
                set.component_types.insert(record.price_type);
            }
            _ => {}
        }
    }

    for ((_, region), set) in groups.iter_mut() {
        if let Some(storage_ids) = storage_by_region.get(region) {
            set.price_ids.extend(storage_ids.iter().copied());
            set.component_types.insert(PriceType::Storage);
        }

        let missing: Vec<PriceType> = REQUIRED_COMPONENTS
            .iter()
            .filter(|t| !set.component_types.contains(*t))
            .copied()
            .collect();
        if !missing.is_empty() {
            warn!(
                set = %set.name,
                missing = ?missing.iter().map(|t| t.as_str()).collect::<Vec<_>>(),
                "Price set is missing required component types; emitting partial set"
            );
            set.missing_components = missing;
        }
    }

    groups.into_values().collect()
}
