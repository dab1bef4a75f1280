//! Service plan discovery and derivation.
//!
//! The target system's plan listing mixes GCP machine-type plans with
//! plans from every other cloud plus assorted manual entries. The filters
//! here pick out the real GCP plans, extract the (machine family, region)
//! pair the mapping step needs, and derive instance-type plan drafts from
//! Compute Engine SKU descriptions for the optional plan-creation mode.

use crate::codes::plan_code;
use crate::models::{ServicePlan, SkuCatalog};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::debug;

// GCP machine-type plan names: e2-, n2d-, c3- plus the legacy f1/g1 types.
static INCLUDE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"^[a-z]\d+[a-z]?-").expect("valid include pattern"),
        Regex::new(r"^(f1|g1)-").expect("valid include pattern"),
    ]
});

// Obvious non-GCP and noise entries excluded before pattern matching.
const EXCLUDE_FRAGMENTS: &[&str] = &[
    "azure",
    "rds db.",
    "aks ",
    "eks ",
    "gke controller",
    "hyper-v",
    "default",
    "discovered",
    "terraform",
    "workflow",
    "controller",
    "stack",
    "external",
    "manual",
    "kubernetes",
    "dtus",
    "ioh vm",
    " cpu,",
    " memory,",
    " storage",
];

static PLAN_FAMILY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:google-)?([a-z]\d+[a-z]?)-").expect("valid family pattern"));

// Instance types in SKU descriptions, most specific first:
// e2-standard-2, then e2-standard, then e2-2.
static INSTANCE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(\w+\d+[a-z]?-\w+-\d+)").expect("valid instance pattern"),
        Regex::new(r"(\w+\d+[a-z]?-\w+)").expect("valid instance pattern"),
        Regex::new(r"(\w+\d+[a-z]?-\d+)").expect("valid instance pattern"),
    ]
});

static INSTANCE_FAMILY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\w+\d+[a-z]?)").expect("valid family pattern"));

const MAX_PLANS_PER_FAMILY: usize = 10;

/// Keep only plans that look like real GCP machine-type plans.
pub fn filter_gcp_plans(plans: &[ServicePlan]) -> Vec<ServicePlan> {
    plans
        .iter()
        .filter(|plan| {
            let name = plan.name.to_lowercase();
            if EXCLUDE_FRAGMENTS.iter().any(|frag| name.contains(frag)) {
                return false;
            }
            if INCLUDE_PATTERNS.iter().any(|p| p.is_match(&name)) {
                return true;
            }
            // Fall back on explicit metadata when the name is inconclusive.
            if plan.provision_type.code.to_lowercase() == "google" {
                return true;
            }
            plan.zone
                .get("cloud")
                .and_then(|c| c.get("type"))
                .and_then(Value::as_str)
                == Some("gcp")
        })
        .cloned()
        .collect()
}

/// Region a plan is provisioned in, from its config: explicit region fields
/// first, then the availability zone with the zone letter dropped
/// (`asia-southeast2-a` -> `asia-southeast2`).
pub fn plan_region(plan: &ServicePlan) -> Option<String> {
    if let Some(region) = plan
        .config
        .zone_region
        .as_ref()
        .or(plan.config.region.as_ref())
        .filter(|r| !r.is_empty())
    {
        return Some(region.clone());
    }

    let zone = plan.config.availability_zone.as_ref()?;
    let parts: Vec<&str> = zone.split('-').collect();
    if parts.len() >= 2 {
        Some(parts[..2].join("-"))
    } else {
        None
    }
}

/// Machine family from a plan name (`google-e2-standard-4` or
/// `n2d-highmem-8` -> `e2` / `n2d`).
pub fn plan_family(name: &str) -> Option<String> {
    PLAN_FAMILY
        .captures(&name.to_lowercase())
        .map(|caps| caps[1].to_string())
}

/// Plan names grouped by machine family, for the discovery summary.
/// Unparseable names land under `unknown`.
pub fn group_by_family(plans: &[ServicePlan]) -> BTreeMap<String, Vec<String>> {
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for plan in plans {
        let family = plan_family(&plan.name).unwrap_or_else(|| "unknown".to_string());
        groups.entry(family).or_default().push(plan.name.clone());
    }
    for names in groups.values_mut() {
        names.sort();
    }
    groups
}

/// A service plan to be created from a Compute Engine instance type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanDraft {
    pub name: String,
    pub code: String,
    pub instance_type: String,
    pub family: String,
    pub region: String,
}

impl PlanDraft {
    pub fn to_payload(&self) -> Value {
        json!({
            "servicePlan": {
                "name": self.name,
                "code": self.code,
                "description": format!("Google Cloud Platform {} instance", self.instance_type.to_uppercase()),
                "editable": true,
                "provisionType": {"code": "google"},
                "priceSets": [],
                "config": {
                    "instanceType": self.instance_type,
                    "family": self.family,
                    "region": self.region,
                },
            }
        })
    }
}

/// Derive plan drafts from Compute Engine SKU descriptions: the first
/// instance-type token found per description, at most
/// `MAX_PLANS_PER_FAMILY` distinct types per family.
pub fn derive_plan_drafts(catalog: &SkuCatalog, region: &str) -> Vec<PlanDraft> {
    let mut families: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for entry in catalog.services.values() {
        if entry.service_info.display_name != "Compute Engine" {
            continue;
        }
        for sku in &entry.skus {
            let description = sku.description.to_lowercase();
            let Some(instance_type) = INSTANCE_PATTERNS
                .iter()
                .find_map(|p| p.captures(&description).map(|caps| caps[1].to_string()))
            else {
                debug!(sku_id = %sku.sku_id, "No instance type in description");
                continue;
            };
            let Some(family) = INSTANCE_FAMILY
                .captures(&instance_type)
                .map(|caps| caps[1].to_string())
            else {
                continue;
            };

            let types = families.entry(family).or_default();
            if !types.contains(&instance_type) {
                types.push(instance_type);
            }
        }
    }

    let mut drafts = Vec::new();
    for (family, types) in families {
        for instance_type in types.into_iter().take(MAX_PLANS_PER_FAMILY) {
            drafts.push(PlanDraft {
                name: format!("GCP {}", instance_type.to_uppercase()),
                code: plan_code(&instance_type),
                instance_type,
                family: family.clone(),
                region: region.to_string(),
            });
        }
    }
    drafts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PlanConfig, ProvisionType};

    fn plan(name: &str) -> ServicePlan {
        ServicePlan {
            id: 1,
            name: name.to_string(),
            code: name.to_lowercase().replace(' ', "-"),
            ..Default::default()
        }
    }

    #[test]
    fn machine_type_names_are_included() {
        let plans = vec![plan("e2-standard-4"), plan("n2d-highmem-8"), plan("f1-micro")];
        assert_eq!(filter_gcp_plans(&plans).len(), 3);
    }

    #[test]
    fn noise_and_other_clouds_are_excluded() {
        let plans = vec![
            plan("Azure D2s v3"),
            plan("Terraform Plan"),
            plan("AKS something"),
            plan("Discovered Plan"),
        ];
        assert!(filter_gcp_plans(&plans).is_empty());
    }

    #[test]
    fn provision_type_rescues_unmatched_names() {
        let mut p = plan("Custom GCP Plan");
        p.provision_type = ProvisionType {
            name: "Google Cloud".to_string(),
            code: "google".to_string(),
        };
        assert_eq!(filter_gcp_plans(&[p]).len(), 1);
    }

    #[test]
    fn region_prefers_config_fields_over_zone() {
        let mut p = plan("e2-standard-4");
        p.config = PlanConfig {
            zone_region: Some("asia-southeast2".to_string()),
            region: None,
            availability_zone: Some("us-central1-a".to_string()),
        };
        assert_eq!(plan_region(&p).as_deref(), Some("asia-southeast2"));

        p.config.zone_region = None;
        assert_eq!(plan_region(&p).as_deref(), Some("us-central1"));

        p.config.availability_zone = None;
        assert_eq!(plan_region(&p), None);
    }

    #[test]
    fn family_parses_with_and_without_provider_prefix() {
        assert_eq!(plan_family("google-e2-standard-4").as_deref(), Some("e2"));
        assert_eq!(plan_family("N2D-highmem-8").as_deref(), Some("n2d"));
        assert_eq!(plan_family("custom plan"), None);
    }

    #[test]
    fn drafts_come_from_compute_engine_descriptions() {
        use crate::models::{CatalogMetadata, RawSku, Service, ServiceEntry};
        use std::collections::BTreeMap as Map;

        let mut services = Map::new();
        services.insert(
            "SVC-1".to_string(),
            ServiceEntry {
                service_info: Service {
                    name: "services/SVC-1".to_string(),
                    service_id: "SVC-1".to_string(),
                    display_name: "Compute Engine".to_string(),
                },
                skus: vec![
                    RawSku {
                        sku_id: "AAAA-1111".to_string(),
                        description: "E2-Standard-2 instance in Jakarta".to_string(),
                        ..Default::default()
                    },
                    RawSku {
                        sku_id: "BBBB-2222".to_string(),
                        description: "Network egress".to_string(),
                        ..Default::default()
                    },
                ],
            },
        );
        let catalog = SkuCatalog {
            services,
            metadata: CatalogMetadata {
                region: "asia-southeast2".to_string(),
                total_services: 1,
                total_skus: 2,
                downloaded_at: String::new(),
            },
        };

        let drafts = derive_plan_drafts(&catalog, "asia-southeast2");
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].code, "gcp-e2-standard-2");
        assert_eq!(drafts[0].family, "e2");
        assert_eq!(drafts[0].name, "GCP E2-STANDARD-2");
    }
}
