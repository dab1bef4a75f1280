//! Billing catalog sources.
//!
//! The pipeline needs a service listing and per-service SKUs, but where they
//! come from depends on the environment: the live REST catalog in a real
//! run, a snapshot file in tests and offline runs. [`CatalogSource`] is that
//! capability; implementations are swapped by configuration, not by
//! duplicated code paths.

use crate::client::ApiClient;
use crate::error::ApiError;
use crate::models::{CatalogMetadata, RawSku, Service, ServiceEntry, SkuCatalog};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

const GLOBAL_TAXONOMY: &str = "GLOBAL";

#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_services(&self) -> Result<Vec<Service>, ApiError>;

    /// SKUs for one service, already filtered to the given region
    /// (region-scoped or GLOBAL entries only).
    async fn fetch_skus(&self, service_id: &str, region: &str) -> Result<Vec<RawSku>, ApiError>;
}

/// Whether a SKU applies to the configured region: global SKUs always do,
/// regional ones only when the region is listed.
pub fn region_matches(sku: &RawSku, region: &str) -> bool {
    sku.geo_taxonomy.taxonomy_type == GLOBAL_TAXONOMY
        || sku.geo_taxonomy.regions.iter().any(|r| r == region)
}

/// Live REST catalog, optionally authenticated with a bearer token
/// (unauthenticated public catalog access works for the service listing).
pub struct RestCatalogSource {
    client: ApiClient,
    currency: String,
    service_page_size: usize,
    sku_page_size: usize,
}

impl RestCatalogSource {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            currency: "USD".to_string(),
            service_page_size: 200,
            sku_page_size: 1000,
        }
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }
}

#[async_trait]
impl CatalogSource for RestCatalogSource {
    async fn fetch_services(&self) -> Result<Vec<Service>, ApiError> {
        let items = self
            .client
            .paginate("v1/services", self.service_page_size)
            .collect_items("services")
            .await?;

        let services = items
            .into_iter()
            .filter_map(|v| match serde_json::from_value::<Service>(v) {
                Ok(service) => Some(service),
                Err(e) => {
                    warn!(error = %e, "Dropping unparseable service entry");
                    None
                }
            })
            .collect::<Vec<_>>();
        info!(total = services.len(), "Fetched billing services");
        Ok(services)
    }

    async fn fetch_skus(&self, service_id: &str, region: &str) -> Result<Vec<RawSku>, ApiError> {
        let path = format!("v1/services/{service_id}/skus");
        let items = self
            .client
            .paginate(&path, self.sku_page_size)
            .param("currencyCode", self.currency.clone())
            .collect_items("skus")
            .await?;

        let total_fetched = items.len();
        let skus = items
            .into_iter()
            .filter_map(|v| match serde_json::from_value::<RawSku>(v) {
                Ok(sku) => Some(sku),
                Err(e) => {
                    warn!(service_id, error = %e, "Dropping unparseable SKU entry");
                    None
                }
            })
            .filter(|sku| region_matches(sku, region))
            .collect::<Vec<_>>();
        info!(
            service_id,
            region,
            fetched = total_fetched,
            kept = skus.len(),
            "Fetched SKUs with region filter"
        );
        Ok(skus)
    }
}

/// Catalog served from a snapshot file. Used by tests and by offline runs
/// against a previously downloaded catalog.
pub struct FixtureCatalogSource {
    catalog: SkuCatalog,
}

impl FixtureCatalogSource {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let catalog = crate::snapshot::load_catalog(path)?;
        Ok(Self { catalog })
    }

    pub fn from_catalog(catalog: SkuCatalog) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl CatalogSource for FixtureCatalogSource {
    async fn fetch_services(&self) -> Result<Vec<Service>, ApiError> {
        Ok(self
            .catalog
            .services
            .values()
            .map(|entry| entry.service_info.clone())
            .collect())
    }

    async fn fetch_skus(&self, service_id: &str, region: &str) -> Result<Vec<RawSku>, ApiError> {
        let entry = self
            .catalog
            .services
            .values()
            .find(|entry| entry.service_info.id() == service_id)
            .ok_or_else(|| ApiError::NotFound(format!("service {service_id}")))?;

        Ok(entry
            .skus
            .iter()
            .filter(|sku| region_matches(sku, region))
            .cloned()
            .collect())
    }
}

/// Services whose display name contains one of the configured target names.
/// Logs the targets that matched nothing.
pub fn select_services(services: &[Service], target_names: &[String]) -> Vec<Service> {
    let mut selected: Vec<Service> = Vec::new();
    for wanted in target_names {
        match services
            .iter()
            .find(|s| s.display_name.contains(wanted.as_str()))
        {
            Some(service) => {
                info!(wanted = %wanted, service = %service.display_name, id = service.id(), "Matched service");
                selected.push(service.clone());
            }
            None => warn!(wanted = %wanted, "No billing service matched this name"),
        }
    }
    selected
}

/// Fetch the full regional catalog for the configured services and assemble
/// the snapshot document handed to the downstream stages.
pub async fn download_catalog(
    source: &dyn CatalogSource,
    region: &str,
    target_names: &[String],
    downloaded_at: String,
) -> Result<SkuCatalog, ApiError> {
    let services = source.fetch_services().await?;
    let selected = select_services(&services, target_names);

    let mut entries: BTreeMap<String, ServiceEntry> = BTreeMap::new();
    for service in selected {
        let skus = source.fetch_skus(service.id(), region).await?;
        info!(service = %service.display_name, skus = skus.len(), "Collected service SKUs");
        entries.insert(
            service.id().to_string(),
            ServiceEntry {
                service_info: service,
                skus,
            },
        );
    }

    let total_services = entries.len();
    let total_skus = entries.values().map(|e| e.skus.len()).sum();
    Ok(SkuCatalog {
        services: entries,
        metadata: CatalogMetadata {
            region: region.to_string(),
            total_services,
            total_skus,
            downloaded_at,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GeoTaxonomy;

    fn sku_in(taxonomy_type: &str, regions: &[&str]) -> RawSku {
        RawSku {
            geo_taxonomy: GeoTaxonomy {
                taxonomy_type: taxonomy_type.to_string(),
                regions: regions.iter().map(|r| r.to_string()).collect(),
            },
            ..Default::default()
        }
    }

    #[test]
    fn global_skus_match_every_region() {
        assert!(region_matches(&sku_in("GLOBAL", &[]), "asia-southeast2"));
    }

    #[test]
    fn regional_skus_match_only_their_region() {
        let sku = sku_in("REGIONAL", &["asia-southeast2", "asia-southeast1"]);
        assert!(region_matches(&sku, "asia-southeast2"));
        assert!(!region_matches(&sku, "us-central1"));
    }

    #[test]
    fn skus_without_taxonomy_are_excluded() {
        assert!(!region_matches(&RawSku::default(), "asia-southeast2"));
    }

    #[test]
    fn select_services_matches_by_display_name_containment() {
        let services = vec![
            Service {
                name: "services/AAAA".to_string(),
                service_id: "AAAA".to_string(),
                display_name: "Compute Engine".to_string(),
            },
            Service {
                name: "services/BBBB".to_string(),
                service_id: "BBBB".to_string(),
                display_name: "Kubernetes Engine".to_string(),
            },
        ];
        let selected = select_services(&services, &["Compute Engine".to_string()]);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id(), "AAAA");

        let none = select_services(&services, &["BigQuery".to_string()]);
        assert!(none.is_empty());
    }
}
