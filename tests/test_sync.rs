//! Synchronizer behavior against a mock target system: idempotent
//! create-or-skip, conflict handling, per-record error isolation and
//! append-only plan mapping.

use gcp_price_sync::client::{ApiClient, RetryPolicy};
use gcp_price_sync::models::{
    Bucket, PlanConfig, PriceRecord, PriceSet, PriceSetKind, PriceSetRef, PriceType, ServicePlan,
};
use gcp_price_sync::sync::Synchronizer;
use httpmock::prelude::*;
use serde_json::json;
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

mod common;

fn client(base_url: &str) -> ApiClient {
    ApiClient::builder(base_url)
        .bearer_token("test-token")
        .timeout(Duration::from_secs(5))
        .retry(RetryPolicy {
            max_attempts: 2,
            page_delay: Duration::from_millis(1),
        })
        .build()
        .expect("client builds")
}

fn record(code: &str, price_type: PriceType) -> PriceRecord {
    PriceRecord {
        code: code.to_string(),
        name: format!("ioh-cp - {code}"),
        price_type,
        price_unit: "h".to_string(),
        cost: 0.0218,
        currency: "USD".to_string(),
        incur_charges: true,
        active: true,
        bucket: Bucket::Compute,
        machine_family: Some("e2".to_string()),
        region: common::REGION.to_string(),
        sku_id: "AAAA-0001".to_string(),
        service_name: "Compute Engine".to_string(),
        description: code.to_string(),
    }
}

fn component_set(code: &str, ids: &[i64]) -> PriceSet {
    PriceSet {
        code: code.to_string(),
        name: format!("ioh-cp - GCP - E2 ({})", common::REGION),
        kind: PriceSetKind::Component {
            machine_family: "e2".to_string(),
            region: common::REGION.to_string(),
        },
        price_unit: "hour".to_string(),
        region_code: Some(common::REGION.to_string()),
        price_codes: BTreeSet::new(),
        price_ids: ids.iter().copied().collect(),
        component_types: BTreeSet::new(),
        missing_components: Vec::new(),
    }
}

#[tokio::test]
async fn missing_price_is_created() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/prices");
            then.status(200).json_body(json!({"prices": []}));
        })
        .await;
    let create = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/prices");
            then.status(200).json_body(json!({"success": true, "price": {"id": 11}}));
        })
        .await;

    let client = client(&server.base_url());
    let synchronizer = Synchronizer::new(&client, common::PREFIX);

    let outcome = synchronizer
        .sync_prices(&[record("ioh-cp.gcp.cores.e2.asia_southeast2.aaaa-0001", PriceType::Cores)])
        .await
        .expect("sync runs");

    assert_eq!(outcome.created, 1);
    assert_eq!(outcome.skipped, 0);
    assert_eq!(outcome.errored, 0);
    create.assert_hits_async(1).await;
}

#[tokio::test]
async fn rerun_against_synced_target_skips_everything() {
    let codes = [
        "ioh-cp.gcp.cores.e2.asia_southeast2.aaaa-0001",
        "ioh-cp.gcp.memory.e2.asia_southeast2.bbbb-0001",
        "ioh-cp.gcp.storage.asia_southeast2.cccc-0001",
    ];

    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/prices");
            then.status(200).json_body(json!({
                "prices": codes.iter().enumerate()
                    .map(|(i, c)| json!({"id": i + 1, "code": c}))
                    .collect::<Vec<_>>(),
            }));
        })
        .await;
    let create = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/prices");
            then.status(200).json_body(json!({"success": true}));
        })
        .await;

    let client = client(&server.base_url());
    let synchronizer = Synchronizer::new(&client, common::PREFIX);

    let records: Vec<PriceRecord> = codes
        .iter()
        .map(|c| record(c, PriceType::Cores))
        .collect();
    let outcome = synchronizer.sync_prices(&records).await.expect("sync runs");

    // The idempotence law: zero creates, a skip per record.
    assert_eq!(outcome.created, 0);
    assert_eq!(outcome.skipped, records.len());
    assert_eq!(outcome.errored, 0);
    create.assert_hits_async(0).await;
}

#[tokio::test]
async fn create_conflict_counts_as_skip() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/prices");
            then.status(200).json_body(json!({"prices": []}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/prices");
            then.status(409).body("duplicate code");
        })
        .await;

    let client = client(&server.base_url());
    let synchronizer = Synchronizer::new(&client, common::PREFIX);

    let outcome = synchronizer
        .sync_prices(&[record("ioh-cp.gcp.cores.e2.asia_southeast2.aaaa-0001", PriceType::Cores)])
        .await
        .expect("sync runs");

    assert_eq!(outcome.created, 0);
    assert_eq!(outcome.skipped, 1);
    assert_eq!(outcome.errored, 0);
}

#[tokio::test]
async fn invalid_price_type_is_isolated_not_fatal() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/prices");
            then.status(200).json_body(json!({"prices": []}));
        })
        .await;
    let create = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/prices");
            then.status(200).json_body(json!({"success": true}));
        })
        .await;

    let client = client(&server.base_url());
    let synchronizer = Synchronizer::new(&client, common::PREFIX);

    // `quantity` is outside the closed set the target accepts: the record
    // is rejected locally, the batch continues with the next record.
    let records = vec![
        record("ioh-cp.gcp.quantity.asia_southeast2.ffff-0001", PriceType::Quantity),
        record("ioh-cp.gcp.cores.e2.asia_southeast2.aaaa-0001", PriceType::Cores),
    ];
    let outcome = synchronizer.sync_prices(&records).await.expect("sync runs");

    assert_eq!(outcome.errored, 1);
    assert_eq!(outcome.created, 1);
    create.assert_hits_async(1).await;
}

#[tokio::test]
async fn new_price_set_is_created() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/price-sets");
            then.status(200).json_body(json!({"priceSets": []}));
        })
        .await;
    let create = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/price-sets");
            then.status(200).json_body(json!({"success": true, "priceSet": {"id": 9}}));
        })
        .await;

    let client = client(&server.base_url());
    let synchronizer = Synchronizer::new(&client, common::PREFIX);

    let set = component_set("ioh-cp.gcp-e2-asia_southeast2", &[1, 2, 3]);
    let outcome = synchronizer
        .sync_price_sets(&[set], &HashMap::new())
        .await
        .expect("sync runs");

    assert_eq!(outcome.created, 1);
    create.assert_hits_async(1).await;
}

#[tokio::test]
async fn existing_price_set_is_updated_with_union() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/price-sets");
            then.status(200).json_body(json!({
                "priceSets": [{
                    "id": 9,
                    "code": "ioh-cp.gcp-e2-asia_southeast2",
                    "prices": [{"id": 1}],
                }],
            }));
        })
        .await;
    let update = server
        .mock_async(|when, then| {
            when.method(PUT).path("/api/price-sets/9");
            then.status(200).json_body(json!({"success": true}));
        })
        .await;

    let client = client(&server.base_url());
    let synchronizer = Synchronizer::new(&client, common::PREFIX);

    let set = component_set("ioh-cp.gcp-e2-asia_southeast2", &[2]);
    let outcome = synchronizer
        .sync_price_sets(&[set], &HashMap::new())
        .await
        .expect("sync runs");

    assert_eq!(outcome.created, 1);
    update.assert_hits_async(1).await;
}

#[tokio::test]
async fn price_set_with_no_new_members_is_skipped() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/price-sets");
            then.status(200).json_body(json!({
                "priceSets": [{
                    "id": 9,
                    "code": "ioh-cp.gcp-e2-asia_southeast2",
                    "prices": [{"id": 1}, {"id": 2}],
                }],
            }));
        })
        .await;

    let client = client(&server.base_url());
    let synchronizer = Synchronizer::new(&client, common::PREFIX);

    let set = component_set("ioh-cp.gcp-e2-asia_southeast2", &[1]);
    let outcome = synchronizer
        .sync_price_sets(&[set], &HashMap::new())
        .await
        .expect("sync runs");

    assert_eq!(outcome.created, 0);
    assert_eq!(outcome.skipped, 1);
}

#[tokio::test]
async fn unresolvable_price_set_is_skipped_with_warning() {
    let server = MockServer::start_async().await;
    let client = client(&server.base_url());
    let synchronizer = Synchronizer::new(&client, common::PREFIX);

    // No ids, and a code the lookup cannot resolve: nothing to send.
    let mut set = component_set("ioh-cp.gcp-e2-asia_southeast2", &[]);
    set.price_codes.insert("never-created".to_string());

    let outcome = synchronizer
        .sync_price_sets(&[set], &HashMap::new())
        .await
        .expect("sync runs");
    assert_eq!(outcome.skipped, 1);
    assert_eq!(outcome.created, 0);
}

fn gcp_plan(id: i64, name: &str, attached: &[i64]) -> ServicePlan {
    ServicePlan {
        id,
        name: name.to_string(),
        code: name.to_string(),
        config: PlanConfig {
            zone_region: Some(common::REGION.to_string()),
            region: None,
            availability_zone: None,
        },
        price_sets: attached.iter().map(|&id| PriceSetRef { id }).collect(),
        ..Default::default()
    }
}

#[tokio::test]
async fn plan_mapping_attaches_matching_set_append_only() {
    let server = MockServer::start_async().await;
    let update = server
        .mock_async(|when, then| {
            when.method(PUT).path("/api/service-plans/42");
            then.status(200).json_body(json!({"success": true}));
        })
        .await;

    let client = client(&server.base_url());
    let synchronizer = Synchronizer::new(&client, common::PREFIX);

    let mut set_ids = HashMap::new();
    set_ids.insert("ioh-cp.gcp-e2-asia_southeast2".to_string(), 77);

    let plans = vec![gcp_plan(42, "e2-standard-4", &[5])];
    let outcome = synchronizer
        .attach_price_sets_to_plans(&plans, &set_ids)
        .await
        .expect("mapping runs");

    assert_eq!(outcome.created, 1);
    update.assert_hits_async(1).await;
}

#[tokio::test]
async fn plan_with_set_already_attached_is_skipped() {
    let server = MockServer::start_async().await;
    let client = client(&server.base_url());
    let synchronizer = Synchronizer::new(&client, common::PREFIX);

    let mut set_ids = HashMap::new();
    set_ids.insert("ioh-cp.gcp-e2-asia_southeast2".to_string(), 77);

    let plans = vec![gcp_plan(42, "e2-standard-4", &[77])];
    let outcome = synchronizer
        .attach_price_sets_to_plans(&plans, &set_ids)
        .await
        .expect("mapping runs");

    assert_eq!(outcome.created, 0);
    assert_eq!(outcome.skipped, 1);
}

#[tokio::test]
async fn plan_without_family_or_region_is_skipped() {
    let server = MockServer::start_async().await;
    let client = client(&server.base_url());
    let synchronizer = Synchronizer::new(&client, common::PREFIX);

    let mut no_region = gcp_plan(1, "e2-standard-4", &[]);
    no_region.config = PlanConfig::default();
    let no_family = gcp_plan(2, "custom plan", &[]);

    let outcome = synchronizer
        .attach_price_sets_to_plans(&[no_region, no_family], &HashMap::new())
        .await
        .expect("mapping runs");
    assert_eq!(outcome.skipped, 2);
    assert_eq!(outcome.errored, 0);
}
