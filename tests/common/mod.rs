#![allow(dead_code)]

use gcp_price_sync::models::{
    CatalogMetadata, PricingExpression, PricingInfo, RawSku, Service, ServiceEntry, SkuCategory,
    SkuCatalog, TieredRate, UnitPrice,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const REGION: &str = "asia-southeast2";
pub const PREFIX: &str = "ioh-cp";

pub fn priced_sku(
    sku_id: &str,
    description: &str,
    resource_family: &str,
    resource_group: &str,
    units: i64,
    nanos: i64,
) -> RawSku {
    RawSku {
        sku_id: sku_id.to_string(),
        description: description.to_string(),
        category: SkuCategory {
            resource_family: resource_family.to_string(),
            resource_group: resource_group.to_string(),
            usage_type: "OnDemand".to_string(),
            service_display_name: "Compute Engine".to_string(),
        },
        pricing_info: vec![PricingInfo {
            pricing_expression: PricingExpression {
                usage_unit: Some("h".to_string()),
                tiered_rates: vec![TieredRate {
                    unit_price: Some(UnitPrice {
                        units,
                        nanos,
                        currency_code: Some("USD".to_string()),
                    }),
                }],
            },
        }],
        ..Default::default()
    }
}

/// A small but representative catalog: three e2 core SKUs, one e2 memory
/// SKU, two storage SKUs and one free SKU the normalizer excludes.
pub fn fixture_catalog() -> SkuCatalog {
    let skus = vec![
        priced_sku("AAAA-0001", "E2 Instance Core running in Jakarta", "Compute", "CPU", 0, 21_811_590),
        priced_sku("AAAA-0002", "Spot Preemptible E2 Instance Core running in Jakarta", "Compute", "CPU", 0, 8_724_636),
        priced_sku("AAAA-0003", "E2 Custom Instance Core running in Jakarta", "Compute", "CPU", 0, 22_000_000),
        priced_sku("BBBB-0001", "E2 Instance Ram running in Jakarta", "", "RAM", 0, 2_923_531),
        priced_sku("CCCC-0001", "SSD backed PD Capacity in Jakarta", "Storage", "SSD", 0, 187_000_000),
        priced_sku("CCCC-0002", "Storage PD Capacity in Jakarta", "Storage", "PDStandard", 0, 52_800_000),
        priced_sku("DDDD-0001", "Free tier usage", "", "", 0, 0),
    ];

    let total = skus.len();
    let mut services = BTreeMap::new();
    services.insert(
        "6F81-5844-456A".to_string(),
        ServiceEntry {
            service_info: Service {
                name: "services/6F81-5844-456A".to_string(),
                service_id: "6F81-5844-456A".to_string(),
                display_name: "Compute Engine".to_string(),
            },
            skus,
        },
    );

    SkuCatalog {
        services,
        metadata: CatalogMetadata {
            region: REGION.to_string(),
            total_services: 1,
            total_skus: total,
            downloaded_at: "2025-03-01 00:00:00 UTC".to_string(),
        },
    }
}

pub fn write_catalog(dir: &Path, catalog: &SkuCatalog) -> PathBuf {
    let path = dir.join("gcp_skus.json");
    let content = serde_json::to_string_pretty(catalog).expect("catalog serializes");
    std::fs::write(&path, content).expect("catalog fixture written");
    path
}
