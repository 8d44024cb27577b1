//! Sheet and campaign fetcher tests against a mock export host.

mod common;

use std::sync::Arc;

use common::*;
use serde_json::json;
use syncline_core::{ManualClock, TenantId};
use syncline_sync::{
    InMemoryStore, RecordKind, RemoteFetcher, SyncConfig, SyncError, SyncOrchestrator, SyncStore,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SHEET: &str = "\u{feff}Name,Email,Phone,Company,Practice_Areas,Notes\n\
                     Jane Doe,Jane@Doe.Law,555-0100,Doe LLP,\"Tax, Estate\",\n\
                     ,,,,,\n\
                     Ann Lee,ann@lee.law,,,,met at expo\n\
                     No Mail,,555-0199,,,\n";

#[tokio::test]
async fn test_sheet_export_is_chunked_into_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(export_path()))
        .and(query_param("format", "csv"))
        .and(query_param("gid", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SHEET))
        .expect(1)
        .mount(&server)
        .await;

    let mut pages = sheet_fetcher(config(&server, 2))
        .open(None, &sheet_connection(TenantId::new()), None)
        .await
        .unwrap();
    let pages_out = drain(&mut pages).await;

    assert!(pages.failures().is_empty());
    let sizes: Vec<usize> = pages_out.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![2, 1]);

    let jane = &pages_out[0][0];
    assert_eq!(jane.kind, RecordKind::Lead);
    assert_eq!(jane.external_id, "row-2");
    assert_eq!(jane.str_field("full_name").as_deref(), Some("Jane Doe"));
    assert_eq!(jane.str_field("email").as_deref(), Some("Jane@Doe.Law"));
    assert_eq!(jane.string_list("practice_areas"), vec!["Tax", "Estate"]);
    assert_eq!(jane.str_field("message"), None);
    assert_eq!(pages_out[0][1].external_id, "row-4");
    assert_eq!(pages_out[1][0].external_id, "row-5");
}

#[tokio::test]
async fn test_sheet_alias_columns() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(export_path()))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "full_name,email_address,law_firm,zip\nJane Doe,jane@doe.law,Doe LLP,10001\n",
        ))
        .mount(&server)
        .await;

    let mut pages = sheet_fetcher(config(&server, 50))
        .open(None, &sheet_connection(TenantId::new()), None)
        .await
        .unwrap();
    let records = drain(&mut pages).await.concat();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].str_field("full_name").as_deref(), Some("Jane Doe"));
    assert_eq!(records[0].str_field("email").as_deref(), Some("jane@doe.law"));
    assert_eq!(records[0].str_field("firm").as_deref(), Some("Doe LLP"));
    assert_eq!(records[0].str_field("zip_code").as_deref(), Some("10001"));
}

#[tokio::test]
async fn test_private_sheet_records_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(export_path()))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<!DOCTYPE html><html>Sign in</html>"),
        )
        .mount(&server)
        .await;

    let mut pages = sheet_fetcher(config(&server, 50))
        .open(None, &sheet_connection(TenantId::new()), None)
        .await
        .unwrap();
    assert!(drain(&mut pages).await.concat().is_empty());

    let failures = pages.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind, RecordKind::Lead);
    assert_eq!(failures[0].page_ref, SHEET_ID);
    assert!(failures[0].reason.contains("HTML"));
}

#[tokio::test]
async fn test_bad_sheet_reference_is_configuration_error() {
    let server = MockServer::start().await;
    let mut connection = sheet_connection(TenantId::new());
    connection.external_account_ref = "not a sheet link".to_string();

    let err = sheet_fetcher(config(&server, 50))
        .open(None, &connection, None)
        .await
        .err()
        .unwrap();
    assert!(matches!(err, SyncError::Configuration { .. }));
}

#[tokio::test]
async fn test_sheet_run_skips_rows_without_valid_email() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(export_path()))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "name,email,phone\n\
             Jane Doe,jane@doe.law,555-0100\n\
             Bad Mail,not-an-email,\n\
             No Mail,,555-0199\n",
        ))
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryStore::new());
    let tenant = TenantId::new();
    store.save_connection(&sheet_connection(tenant)).await.unwrap();

    let orchestrator = SyncOrchestrator::new(
        store.clone(),
        Arc::new(sheet_fetcher(config(&server, 50))),
        SyncConfig::default(),
    )
    .unwrap()
    .with_clock(Arc::new(ManualClock::new(now())));

    let outcome = orchestrator.run_for_tenant(tenant).await;
    assert!(outcome.is_completed(), "{outcome:?}");
    let result = outcome.result();
    assert_eq!(result.records_fetched, 3);
    assert_eq!(result.records_created, 1);
    assert_eq!(result.records_skipped, 2);
    let refs: Vec<&str> = result.errors.iter().map(|e| e.record_ref.as_str()).collect();
    assert_eq!(refs, vec!["lead:row-3", "lead:row-4"]);

    let again = orchestrator.run_for_tenant(tenant).await;
    assert_eq!(again.result().records_created, 0);
    assert_eq!(store.entity_count(tenant).await, 1);
}

#[tokio::test]
async fn test_campaign_leads_are_normalized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/api/campaigns/{CAMPAIGN_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "campaign_id": CAMPAIGN_ID,
            "leads": [
                campaign_lead("L1", "one@firm.com", "+1555001"),
                campaign_lead("L2", "two@firm.com", "+1555002"),
                "garbage"
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut pages = campaign_fetcher(config(&server, 1))
        .open(None, &campaign_connection(TenantId::new()), None)
        .await
        .unwrap();
    let pages_out = drain(&mut pages).await;

    assert_eq!(pages_out.len(), 2);
    let first = &pages_out[0][0];
    assert_eq!(first.external_id, "L1");
    assert_eq!(first.str_field("email").as_deref(), Some("one@firm.com"));
    assert_eq!(first.str_field("full_name").as_deref(), Some("L1 Legal"));
    assert_eq!(first.str_field("city").as_deref(), Some("Denver"));
    assert_eq!(
        first.string_list("practice_areas"),
        vec!["Local Services", "Estate"]
    );
}

#[tokio::test]
async fn test_campaign_without_leads_records_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/api/campaigns/{CAMPAIGN_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "running"})))
        .mount(&server)
        .await;

    let mut pages = campaign_fetcher(config(&server, 10))
        .open(None, &campaign_connection(TenantId::new()), None)
        .await
        .unwrap();
    assert!(drain(&mut pages).await.concat().is_empty());
    assert_eq!(pages.failures().len(), 1);
    assert_eq!(pages.failures()[0].page_ref, CAMPAIGN_ID);
}

#[tokio::test]
async fn test_campaign_failure_is_reported_for_required_kind() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/api/campaigns/{CAMPAIGN_ID}")))
        .respond_with(ResponseTemplate::new(502).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryStore::new());
    let tenant = TenantId::new();
    store.save_connection(&campaign_connection(tenant)).await.unwrap();

    let orchestrator = SyncOrchestrator::new(
        store.clone(),
        Arc::new(campaign_fetcher(config(&server, 10))),
        SyncConfig::default(),
    )
    .unwrap()
    .with_clock(Arc::new(ManualClock::new(now())));

    let outcome = orchestrator.run_for_tenant(tenant).await;
    assert!(outcome.is_completed(), "{outcome:?}");
    let errors = &outcome.result().errors;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].record_ref, "lead");
    assert!(errors[0].reason.contains("HTTP 502"));
}

#[tokio::test]
async fn test_campaign_merges_into_sheet_lead_without_clobbering() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(export_path()))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "name,email,phone\nJane Doe,one@firm.com,555-0100\n",
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/api/campaigns/{CAMPAIGN_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "leads": [campaign_lead("L1", "One@Firm.com", "+1555001")]
        })))
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryStore::new());
    let tenant = TenantId::new();
    store.save_connection(&sheet_connection(tenant)).await.unwrap();
    store.save_connection(&campaign_connection(tenant)).await.unwrap();
    let clock = Arc::new(ManualClock::new(now()));

    let sheets = SyncOrchestrator::new(
        store.clone(),
        Arc::new(sheet_fetcher(config(&server, 50))),
        SyncConfig::default(),
    )
    .unwrap()
    .with_clock(clock.clone());
    let campaigns = SyncOrchestrator::new(
        store.clone(),
        Arc::new(campaign_fetcher(config(&server, 50))),
        SyncConfig::default(),
    )
    .unwrap()
    .with_clock(clock);

    assert_eq!(sheets.run_for_tenant(tenant).await.result().records_created, 1);
    let outcome = campaigns.run_for_tenant(tenant).await;
    assert_eq!(outcome.result().records_created, 0);
    assert_eq!(outcome.result().records_updated, 1);

    let entities = store.entities(tenant).await;
    assert_eq!(entities.len(), 1);
    let lead = entities[0].as_lead().unwrap();
    assert_eq!(lead.email, "one@firm.com");
    assert_eq!(lead.full_name, "Jane Doe");
    assert_eq!(lead.phone.as_deref(), Some("555-0100"));
    assert_eq!(lead.firm.as_deref(), Some("L1 Legal"));
    assert_eq!(lead.city.as_deref(), Some("Denver"));
    assert_eq!(lead.source, "google_sheets");
}
