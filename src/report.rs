//! Run reports.
//!
//! Human-readable terminal summaries for each pipeline stage, a JSON mode
//! for scripting, and the CSV review tables used for manual plan/SKU
//! mapping. Every run ends with counts - created, skipped, errored - so
//! nothing disappears silently.

use crate::models::{Bucket, PriceRecord, ServicePlan, SkuCatalog, SyncOutcome};
use crate::normalizer::normalize;
use crate::sync::CoverageReport;
use anyhow::{Context, Result};
use colored::Colorize;
use std::collections::BTreeMap;
use std::path::Path;

pub struct ReportManager {
    json_output: bool,
}

impl ReportManager {
    pub fn new(json_output: bool) -> Self {
        Self { json_output }
    }

    pub fn catalog_summary(&self, catalog: &SkuCatalog, counts: &BTreeMap<Bucket, usize>) {
        if self.json_output {
            let buckets: BTreeMap<&str, usize> =
                counts.iter().map(|(b, n)| (b.as_str(), *n)).collect();
            self.print_json(&serde_json::json!({
                "region": catalog.metadata.region,
                "services": catalog.metadata.total_services,
                "skus": catalog.metadata.total_skus,
                "buckets": buckets,
            }));
            return;
        }

        println!("\n{}", "=== SKU Catalog ===".bold());
        println!("Region:   {}", catalog.metadata.region.cyan());
        println!("Services: {}", catalog.metadata.total_services);
        println!("SKUs:     {}", catalog.metadata.total_skus);
        for (bucket, count) in counts {
            println!("  {:<10} {}", format!("{bucket}:"), count);
        }
    }

    pub fn stage_summary(&self, stage: &str, outcome: &SyncOutcome) {
        if self.json_output {
            self.print_json(&serde_json::json!({
                "stage": stage,
                "created": outcome.created,
                "skipped": outcome.skipped,
                "errored": outcome.errored,
            }));
            return;
        }

        let errored = if outcome.errored > 0 {
            outcome.errored.to_string().red().to_string()
        } else {
            outcome.errored.to_string()
        };
        println!(
            "{} {} created, {} skipped, {} errored",
            format!("[{stage}]").bold(),
            outcome.created.to_string().green(),
            outcome.skipped,
            errored
        );
    }

    pub fn dry_run_summary(&self, prices: usize, category_sets: usize, component_groups: usize) {
        if self.json_output {
            self.print_json(&serde_json::json!({
                "dryRun": true,
                "prices": prices,
                "categorySets": category_sets,
                "componentGroups": component_groups,
            }));
            return;
        }

        println!("\n{}", "=== Dry Run ===".bold());
        println!("Would create up to {} prices", prices.to_string().green());
        println!("Would build {category_sets} category price sets");
        println!("Would build {component_groups} component price sets (per family/region)");
    }

    pub fn coverage(&self, report: &CoverageReport) {
        if self.json_output {
            self.print_json(report);
            return;
        }

        println!("\n{}", "=== Validation ===".bold());
        println!("Prices on target:      {}", report.prices);
        println!("Price sets on target:  {}", report.price_sets);
        println!("Service plans:         {}", report.plans);
        println!("Catalog price records: {}", report.expected_prices);
        let pct = format!("{:.1}%", report.coverage_pct);
        let pct = if report.coverage_pct >= 100.0 {
            pct.green()
        } else {
            pct.yellow()
        };
        println!("Coverage:              {pct}");
    }

    pub fn plans_summary(&self, groups: &BTreeMap<String, Vec<String>>) {
        if self.json_output {
            self.print_json(&groups);
            return;
        }

        let total: usize = groups.values().map(Vec::len).sum();
        println!("\nFound {} GCP service plans (grouped by family):", total);
        for (family, names) in groups {
            println!("  {} family: {} plans", family.to_uppercase().cyan(), names.len());
            for name in names.iter().take(3) {
                println!("   - {name}");
            }
            if names.len() > 3 {
                println!("   - ... and {} more {} plans", names.len() - 3, family);
            }
        }
    }

    fn print_json<T: serde::Serialize>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(s) => println!("{s}"),
            Err(e) => eprintln!("Failed to serialize report: {e}"),
        }
    }
}

/// `service_plans_table.csv`: key fields of the discovered plans.
pub fn write_plans_table(plans: &[ServicePlan], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writer.write_record(["id", "name", "code", "provision_type", "description"])?;
    for plan in plans {
        writer.write_record([
            plan.id.to_string(),
            plan.name.clone(),
            plan.code.clone(),
            plan.provision_type.name.clone(),
            plan.description.clone(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// `gcp_services_table.csv`: the billing service listing.
pub fn write_services_table(catalog: &SkuCatalog, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writer.write_record(["display_name", "service_id", "skus"])?;
    for entry in catalog.services.values() {
        writer.write_record([
            entry.service_info.display_name.clone(),
            entry.service_info.id().to_string(),
            entry.skus.len().to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// `gcp_skus_table.csv`: flattened key fields of every catalog SKU,
/// including the ones the normalizer would exclude (a human reviewing the
/// table wants to see those too).
pub fn write_skus_table(catalog: &SkuCatalog, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writer.write_record([
        "sku_id",
        "service",
        "description",
        "resource_family",
        "resource_group",
        "usage_type",
        "pricing_unit",
        "unit_price",
    ])?;

    let region = &catalog.metadata.region;
    for entry in catalog.services.values() {
        let service_name = &entry.service_info.display_name;
        for sku in &entry.skus {
            let normalized = normalize(sku, service_name, entry.service_info.id(), region);
            let (unit, price) = normalized
                .map(|n| (n.pricing_unit, format!("{:.9}", n.unit_price)))
                .unwrap_or_else(|| (String::new(), String::new()));
            writer.write_record([
                sku.sku_id.clone(),
                service_name.clone(),
                sku.description.clone(),
                sku.category.resource_family.clone(),
                sku.category.resource_group.clone(),
                sku.category.usage_type.clone(),
                unit,
                price,
            ])?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Report-only helper: records that would form component groups, counted
/// without inventing target-system ids.
pub fn component_group_count(records: &[PriceRecord]) -> usize {
    use crate::models::PriceType;
    use std::collections::BTreeSet;

    let mut groups: BTreeSet<(String, String)> = BTreeSet::new();
    for record in records {
        if matches!(record.price_type, PriceType::Cores | PriceType::Memory) {
            if let Some(family) = &record.machine_family {
                groups.insert((family.clone(), record.region.clone()));
            }
        }
    }
    groups.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PriceType, ProvisionType};

    #[test]
    fn plans_table_writes_one_row_per_plan() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plans.csv");
        let plans = vec![ServicePlan {
            id: 7,
            name: "e2-standard-4".to_string(),
            code: "e2-standard-4".to_string(),
            description: "4 vCPU".to_string(),
            provision_type: ProvisionType {
                name: "Google Cloud".to_string(),
                code: "google".to_string(),
            },
            ..Default::default()
        }];

        write_plans_table(&plans, &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("id,name,code,provision_type,description"));
        assert!(content.contains("7,e2-standard-4,e2-standard-4,Google Cloud,4 vCPU"));
    }

    #[test]
    fn component_group_count_ignores_family_less_records() {
        let record = |price_type: PriceType, family: Option<&str>| PriceRecord {
            code: "c".to_string(),
            name: "n".to_string(),
            price_type,
            price_unit: "hour".to_string(),
            cost: 0.1,
            currency: "USD".to_string(),
            incur_charges: true,
            active: true,
            bucket: Bucket::Compute,
            machine_family: family.map(String::from),
            region: "asia-southeast2".to_string(),
            sku_id: "s".to_string(),
            service_name: "svc".to_string(),
            description: "d".to_string(),
        };

        let records = vec![
            record(PriceType::Cores, Some("e2")),
            record(PriceType::Memory, Some("e2")),
            record(PriceType::Cores, Some("n2")),
            record(PriceType::Software, None),
            record(PriceType::Cores, None),
        ];
        assert_eq!(component_group_count(&records), 2);
    }
}
