//! Target-system synchronization.
//!
//! Reconciles locally built price records, price sets and service plans
//! against the target system. Everything is keyed by deterministic code:
//! a record whose code already exists is skipped, so an interrupted run is
//! safely re-runnable and a full re-run against an unchanged catalog is a
//! no-op. Per-record failures are isolated - one malformed or rejected
//! record is logged and counted, the batch continues. Only authentication
//! failures abort a batch, since nothing after them can succeed.

use crate::client::ApiClient;
use crate::codes::component_set_code;
use crate::error::ApiError;
use crate::models::{PriceRecord, PriceSet, PriceSetKind, ServicePlan, SyncOutcome};
use crate::plans::{plan_family, plan_region, PlanDraft};
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Price type codes the target system accepts. Anything else is rejected
/// locally before a create call goes out.
pub const VALID_PRICE_TYPES: &[&str] = &[
    "fixed",
    "compute",
    "memory",
    "cores",
    "storage",
    "datastore",
    "platform",
    "software",
    "load_balancer",
    "load_balancer_virtual_server",
];

const REQUIRED_PRICE_FIELDS: &[&str] =
    &["name", "code", "priceType", "priceUnit", "price", "cost", "currency"];
const NUMERIC_PRICE_FIELDS: &[&str] = &["price", "cost"];
const BOOLEAN_PRICE_FIELDS: &[&str] = &["incurCharges", "active"];

// Courtesy pause between consecutive create calls.
const CREATE_DELAY: Duration = Duration::from_millis(20);

enum CreateResult {
    Created,
    Skipped,
    Rejected(String),
}

pub struct Synchronizer<'a> {
    client: &'a ApiClient,
    prefix: String,
}

impl<'a> Synchronizer<'a> {
    pub fn new(client: &'a ApiClient, prefix: impl Into<String>) -> Self {
        Self {
            client,
            prefix: prefix.into(),
        }
    }

    /// Create every price record whose code is not yet present. Existing
    /// codes are skipped, invalid or rejected payloads are counted and the
    /// batch continues.
    pub async fn sync_prices(&self, records: &[PriceRecord]) -> Result<SyncOutcome, ApiError> {
        let mut outcome = SyncOutcome::default();

        for record in records {
            match self.sync_price(record).await {
                Ok(CreateResult::Created) => outcome.created += 1,
                Ok(CreateResult::Skipped) => outcome.skipped += 1,
                Ok(CreateResult::Rejected(reason)) => {
                    error!(code = %record.code, reason = %reason, "Price create rejected");
                    outcome.errored += 1;
                }
                Err(e) if e.is_conflict() => {
                    debug!(code = %record.code, "Concurrent create detected; treating as existing");
                    outcome.skipped += 1;
                }
                Err(e @ ApiError::Auth(_)) => return Err(e),
                Err(e) => {
                    error!(code = %record.code, error = %e, "Price create failed");
                    outcome.errored += 1;
                }
            }
        }

        info!(outcome = %outcome, "Price sync finished");
        Ok(outcome)
    }

    async fn sync_price(&self, record: &PriceRecord) -> Result<CreateResult, ApiError> {
        if self.price_exists(&record.code).await? {
            debug!(code = %record.code, "Price already exists; skipping");
            return Ok(CreateResult::Skipped);
        }

        let payload = record.to_payload();
        if let Err(ApiError::Validation(reason)) = validate_price_payload(&payload) {
            return Ok(CreateResult::Rejected(reason));
        }

        let response = self.client.post("api/prices", &payload).await?;
        tokio::time::sleep(CREATE_DELAY).await;

        if response_succeeded(&response, "price") {
            info!(code = %record.code, name = %record.name, "Created price");
            Ok(CreateResult::Created)
        } else {
            Ok(CreateResult::Rejected(response.to_string()))
        }
    }

    async fn price_exists(&self, code: &str) -> Result<bool, ApiError> {
        let response = self
            .client
            .get("api/prices", &[("code", code.to_string())])
            .await?;
        Ok(items_of(&response, "prices")
            .iter()
            .any(|p| p.get("code").and_then(Value::as_str) == Some(code)))
    }

    /// Code -> target-system id for every price under this run's prefix.
    /// This is the `priceIdLookup` the aggregator's component grouping
    /// consumes.
    pub async fn fetch_price_ids(&self) -> Result<HashMap<String, i64>, ApiError> {
        let response = self
            .client
            .get(
                "api/prices",
                &[
                    ("max", "5000".to_string()),
                    ("phrase", self.prefix.clone()),
                ],
            )
            .await?;

        let mut ids = HashMap::new();
        for price in items_of(&response, "prices") {
            if let (Some(code), Some(id)) = (
                price.get("code").and_then(Value::as_str),
                price.get("id").and_then(Value::as_i64),
            ) {
                ids.insert(code.to_string(), id);
            }
        }
        debug!(known_prices = ids.len(), "Fetched price id lookup");
        Ok(ids)
    }

    /// Create or update price sets. Membership is append-only on the remote
    /// entity: an existing set is updated only when the desired members add
    /// something new, otherwise it is skipped.
    pub async fn sync_price_sets(
        &self,
        sets: &[PriceSet],
        price_ids: &HashMap<String, i64>,
    ) -> Result<SyncOutcome, ApiError> {
        let mut outcome = SyncOutcome::default();

        for set in sets {
            let desired = resolve_members(set, price_ids);
            if desired.is_empty() {
                warn!(set = %set.name, "No resolvable price references; skipping set");
                outcome.skipped += 1;
                continue;
            }

            match self.sync_price_set(set, &desired).await {
                Ok(CreateResult::Created) => outcome.created += 1,
                Ok(CreateResult::Skipped) => outcome.skipped += 1,
                Ok(CreateResult::Rejected(reason)) => {
                    error!(code = %set.code, reason = %reason, "Price set rejected");
                    outcome.errored += 1;
                }
                Err(e) if e.is_conflict() => {
                    debug!(code = %set.code, "Concurrent create detected; treating as existing");
                    outcome.skipped += 1;
                }
                Err(e @ ApiError::Auth(_)) => return Err(e),
                Err(e) => {
                    error!(code = %set.code, error = %e, "Price set sync failed");
                    outcome.errored += 1;
                }
            }
        }

        info!(outcome = %outcome, "Price set sync finished");
        Ok(outcome)
    }

    async fn sync_price_set(
        &self,
        set: &PriceSet,
        desired: &BTreeSet<i64>,
    ) -> Result<CreateResult, ApiError> {
        let (response, members) = match self.find_price_set(&set.code).await? {
            Some((id, current)) => {
                if desired.is_subset(&current) {
                    debug!(code = %set.code, "Price set already has every reference; skipping");
                    return Ok(CreateResult::Skipped);
                }
                // Preserve references someone else attached.
                let merged: BTreeSet<i64> = current.union(desired).copied().collect();
                let payload = price_set_payload(set, &merged);
                let response = self
                    .client
                    .put(&format!("api/price-sets/{id}"), &payload)
                    .await?;
                (response, merged)
            }
            None => {
                let payload = price_set_payload(set, desired);
                let response = self.client.post("api/price-sets", &payload).await?;
                (response, desired.clone())
            }
        };
        tokio::time::sleep(CREATE_DELAY).await;

        if response_succeeded(&response, "priceSet") {
            info!(code = %set.code, members = members.len(), "Synced price set");
            Ok(CreateResult::Created)
        } else {
            Ok(CreateResult::Rejected(response.to_string()))
        }
    }

    async fn find_price_set(&self, code: &str) -> Result<Option<(i64, BTreeSet<i64>)>, ApiError> {
        let response = self
            .client
            .get("api/price-sets", &[("code", code.to_string())])
            .await?;

        for set in items_of(&response, "priceSets") {
            if set.get("code").and_then(Value::as_str) != Some(code) {
                continue;
            }
            let Some(id) = set.get("id").and_then(Value::as_i64) else {
                continue;
            };
            let members = set
                .get("prices")
                .and_then(Value::as_array)
                .map(|prices| {
                    prices
                        .iter()
                        .filter_map(|p| p.get("id").and_then(Value::as_i64))
                        .collect()
                })
                .unwrap_or_default();
            return Ok(Some((id, members)));
        }
        Ok(None)
    }

    /// Code -> id for every price set under this run's prefix.
    pub async fn fetch_price_set_ids(&self) -> Result<HashMap<String, i64>, ApiError> {
        let response = self
            .client
            .get(
                "api/price-sets",
                &[
                    ("max", "1000".to_string()),
                    ("phrase", self.prefix.clone()),
                ],
            )
            .await?;

        let mut ids = HashMap::new();
        for set in items_of(&response, "priceSets") {
            if let (Some(code), Some(id)) = (
                set.get("code").and_then(Value::as_str),
                set.get("id").and_then(Value::as_i64),
            ) {
                ids.insert(code.to_string(), id);
            }
        }
        Ok(ids)
    }

    /// Fetch the target system's service plans scoped to the GCP provision
    /// type.
    pub async fn fetch_service_plans(&self) -> Result<Vec<ServicePlan>, ApiError> {
        let response = self
            .client
            .get(
                "api/service-plans",
                &[
                    ("provisionTypeCode", "google".to_string()),
                    ("max", "1000".to_string()),
                ],
            )
            .await?;

        Ok(items_of(&response, "servicePlans")
            .iter()
            .filter_map(|v| serde_json::from_value(v.clone()).ok())
            .collect())
    }

    /// Attach each plan's matching component price set, append-only: the
    /// plan's current references are preserved and the new one unioned in.
    pub async fn attach_price_sets_to_plans(
        &self,
        plans: &[ServicePlan],
        price_set_ids: &HashMap<String, i64>,
    ) -> Result<SyncOutcome, ApiError> {
        let mut outcome = SyncOutcome::default();

        for plan in plans {
            let Some(region) = plan_region(plan) else {
                debug!(plan = %plan.name, "No region on plan; skipping");
                outcome.skipped += 1;
                continue;
            };
            let Some(family) = plan_family(&plan.name) else {
                debug!(plan = %plan.name, "No machine family in plan name; skipping");
                outcome.skipped += 1;
                continue;
            };

            let expected_code = component_set_code(&self.prefix, &family, &region);
            let Some(&set_id) = price_set_ids.get(&expected_code) else {
                debug!(plan = %plan.name, code = %expected_code, "No matching price set; skipping");
                outcome.skipped += 1;
                continue;
            };

            let current: BTreeSet<i64> = plan.price_sets.iter().map(|r| r.id).collect();
            if current.contains(&set_id) {
                debug!(plan = %plan.name, "Price set already attached; skipping");
                outcome.skipped += 1;
                continue;
            }

            let mut final_ids = current;
            final_ids.insert(set_id);
            let payload = json!({
                "servicePlan": {
                    "priceSets": final_ids.iter().map(|id| json!({"id": id})).collect::<Vec<_>>(),
                }
            });

            match self
                .client
                .put(&format!("api/service-plans/{}", plan.id), &payload)
                .await
            {
                Ok(response) if response_succeeded(&response, "servicePlan") => {
                    info!(plan = %plan.name, set = %expected_code, "Attached price set to plan");
                    outcome.created += 1;
                }
                Ok(response) => {
                    error!(plan = %plan.name, response = %response, "Plan update rejected");
                    outcome.errored += 1;
                }
                Err(e @ ApiError::Auth(_)) => return Err(e),
                Err(e) => {
                    error!(plan = %plan.name, error = %e, "Plan update failed");
                    outcome.errored += 1;
                }
            }
        }

        info!(outcome = %outcome, "Plan mapping finished");
        Ok(outcome)
    }

    /// Create derived service plans, skipping codes that already exist.
    pub async fn sync_service_plans(&self, drafts: &[PlanDraft]) -> Result<SyncOutcome, ApiError> {
        let mut outcome = SyncOutcome::default();

        for draft in drafts {
            let existing = self
                .client
                .get("api/service-plans", &[("code", draft.code.clone())])
                .await?;
            if items_of(&existing, "servicePlans")
                .iter()
                .any(|p| p.get("code").and_then(Value::as_str) == Some(draft.code.as_str()))
            {
                debug!(code = %draft.code, "Service plan already exists; skipping");
                outcome.skipped += 1;
                continue;
            }

            match self.client.post("api/service-plans", &draft.to_payload()).await {
                Ok(response) if response_succeeded(&response, "servicePlan") => {
                    info!(code = %draft.code, "Created service plan");
                    outcome.created += 1;
                }
                Ok(response) => {
                    error!(code = %draft.code, response = %response, "Service plan rejected");
                    outcome.errored += 1;
                }
                Err(e) if e.is_conflict() => {
                    outcome.skipped += 1;
                }
                Err(e @ ApiError::Auth(_)) => return Err(e),
                Err(e) => {
                    error!(code = %draft.code, error = %e, "Service plan create failed");
                    outcome.errored += 1;
                }
            }
            tokio::time::sleep(CREATE_DELAY).await;
        }

        info!(outcome = %outcome, "Service plan sync finished");
        Ok(outcome)
    }

    /// Compare target-system contents against the catalog-derived records
    /// and report coverage.
    pub async fn validate_coverage(&self, expected_prices: usize) -> Result<CoverageReport, ApiError> {
        let prices = self.fetch_price_ids().await?.len();
        let price_sets = self.fetch_price_set_ids().await?.len();
        let plans = self.fetch_service_plans().await?.len();

        let coverage_pct = if expected_prices > 0 {
            prices as f64 / expected_prices as f64 * 100.0
        } else {
            0.0
        };

        Ok(CoverageReport {
            prices,
            price_sets,
            plans,
            expected_prices,
            coverage_pct,
        })
    }
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct CoverageReport {
    pub prices: usize,
    pub price_sets: usize,
    pub plans: usize,
    pub expected_prices: usize,
    pub coverage_pct: f64,
}

/// Resolve a set's members to target-system ids: component sets already
/// carry ids, category sets carry codes resolved through the lookup here.
fn resolve_members(set: &PriceSet, price_ids: &HashMap<String, i64>) -> BTreeSet<i64> {
    let mut members: BTreeSet<i64> = set.price_ids.iter().copied().collect();
    for code in &set.price_codes {
        match price_ids.get(code) {
            Some(&id) => {
                members.insert(id);
            }
            None => debug!(code = %code, "Price code not present on target; reference dropped"),
        }
    }
    members
}

fn price_set_payload(set: &PriceSet, members: &BTreeSet<i64>) -> Value {
    let set_type = match set.kind {
        PriceSetKind::Component { .. } => "component",
        PriceSetKind::Category { .. } => "fixed",
    };
    json!({
        "priceSet": {
            "name": set.name,
            "code": set.code,
            "type": set_type,
            "priceUnit": set.price_unit,
            "regionCode": set.region_code,
            "prices": members.iter().map(|id| json!({"id": id})).collect::<Vec<_>>(),
        }
    })
}

/// Validate a price create payload before it goes out: required fields
/// present and non-null, numeric fields numeric, booleans boolean, price
/// type within the closed set the target accepts.
pub fn validate_price_payload(payload: &Value) -> Result<(), ApiError> {
    let Some(price) = payload.get("price").and_then(Value::as_object) else {
        return Err(ApiError::Validation("missing 'price' object".to_string()));
    };

    for field in REQUIRED_PRICE_FIELDS {
        match price.get(*field) {
            None | Some(Value::Null) => {
                return Err(ApiError::Validation(format!(
                    "missing required field '{field}'"
                )));
            }
            _ => {}
        }
    }

    for field in NUMERIC_PRICE_FIELDS {
        let value = &price[*field];
        let numeric = value.is_number()
            || value
                .as_str()
                .map(|s| s.parse::<f64>().is_ok())
                .unwrap_or(false);
        if !numeric {
            return Err(ApiError::Validation(format!(
                "field '{field}' must be numeric, got: {value}"
            )));
        }
    }

    for field in BOOLEAN_PRICE_FIELDS {
        if let Some(value) = price.get(*field) {
            if !value.is_null() && !value.is_boolean() {
                return Err(ApiError::Validation(format!(
                    "field '{field}' must be boolean, got: {value}"
                )));
            }
        }
    }

    let price_type = price.get("priceType").and_then(Value::as_str).unwrap_or("");
    if !VALID_PRICE_TYPES.contains(&price_type) {
        return Err(ApiError::Validation(format!(
            "invalid priceType '{price_type}'; valid types: {}",
            VALID_PRICE_TYPES.join(", ")
        )));
    }

    Ok(())
}

fn response_succeeded(response: &Value, entity_key: &str) -> bool {
    response
        .get("success")
        .and_then(Value::as_bool)
        .unwrap_or(false)
        || response.get(entity_key).is_some()
}

fn items_of<'v>(response: &'v Value, key: &str) -> &'v [Value] {
    response
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}
