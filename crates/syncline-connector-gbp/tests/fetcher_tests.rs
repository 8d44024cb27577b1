//! GBP fetcher tests against a mock Business Profile API.

mod common;

use std::sync::Arc;

use chrono::Duration;
use common::*;
use serde_json::json;
use syncline_core::{ManualClock, Provider};
use syncline_sync::{
    InMemoryStore, NaturalKey, OAuthCredential, RecordKind, RemoteFetcher, ReqwestTransport,
    SyncConfig, SyncError, SyncOrchestrator, SyncStore,
};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_metric(server: &MockServer, metric: &str, values: &[i64]) {
    Mock::given(method("POST"))
        .and(path(format!("{LOCATION_PATH}/reportInsights")))
        .and(body_string_contains(metric))
        .respond_with(ResponseTemplate::new(200).set_body_json(report_response(metric, values)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_fetches_metrics_then_follows_review_pages() {
    let server = MockServer::start().await;
    mount_metric(&server, "PROFILE_VIEWS", &[10, 20, 30]).await;
    mount_metric(&server, "PHONE_CALLS", &[1, 2]).await;

    Mock::given(method("GET"))
        .and(path(format!("{LOCATION_PATH}/reviews")))
        .and(query_param("pageToken", "p2"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reviews_page(
            vec![review("r3", "THREE", "2024-01-01T00:00:00Z")],
            None,
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{LOCATION_PATH}/reviews")))
        .and(query_param("pageSize", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reviews_page(
            vec![
                review("r1", "FIVE", "2024-06-20T00:00:00Z"),
                review("r2", "FOUR", "2024-06-21T00:00:00Z"),
            ],
            Some("p2"),
        )))
        .with_priority(10)
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config(&server);
    config.metrics = vec!["PROFILE_VIEWS".into(), "PHONE_CALLS".into()];
    let fetcher = fetcher(config);

    let mut pages = fetcher
        .open(Some("tok-1"), &connection(LOCATION), None)
        .await
        .unwrap();
    let records = drain(&mut pages).await;

    assert!(pages.failures().is_empty());
    let metrics: Vec<_> = records.iter().filter(|r| r.kind == RecordKind::Metric).collect();
    let reviews: Vec<_> = records.iter().filter(|r| r.kind == RecordKind::Review).collect();
    assert_eq!(metrics.len(), 2);
    assert_eq!(metrics[0].external_id, "PROFILE_VIEWS");
    assert_eq!(metrics[0].i64_field("total"), Some(60));
    assert_eq!(metrics[0].str_field("window_end").as_deref(), Some("2024-06-30"));
    assert_eq!(metrics[1].i64_field("total"), Some(3));

    let ids: Vec<&str> = reviews.iter().map(|r| r.external_id.as_str()).collect();
    assert_eq!(ids, vec!["r1", "r2", "r3"]);
    assert_eq!(reviews[2].i64_field("star_rating"), Some(3));
}

#[tokio::test]
async fn test_failed_metric_is_recorded_and_fetch_continues() {
    let server = MockServer::start().await;
    mount_metric(&server, "PROFILE_VIEWS", &[5]).await;
    Mock::given(method("POST"))
        .and(path(format!("{LOCATION_PATH}/reportInsights")))
        .and(body_string_contains("PHONE_CALLS"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {"code": 403, "status": "PERMISSION_DENIED"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{LOCATION_PATH}/reviews")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let mut config = config(&server);
    config.metrics = vec!["PROFILE_VIEWS".into(), "PHONE_CALLS".into()];

    let mut pages = fetcher(config)
        .open(Some("tok"), &connection(LOCATION), None)
        .await
        .unwrap();
    let records = drain(&mut pages).await;

    assert_eq!(records.len(), 1);
    let failures = pages.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind, RecordKind::Metric);
    assert_eq!(failures[0].page_ref, "PHONE_CALLS");
    assert!(failures[0].reason.contains("403"));
}

#[tokio::test]
async fn test_review_paging_stops_at_page_limit() {
    let server = MockServer::start().await;
    mount_metric(&server, "PROFILE_VIEWS", &[1]).await;
    Mock::given(method("GET"))
        .and(path(format!("{LOCATION_PATH}/reviews")))
        .respond_with(ResponseTemplate::new(200).set_body_json(reviews_page(
            vec![review("loop", "FIVE", "2024-06-01T00:00:00Z")],
            Some("again"),
        )))
        .expect(2)
        .mount(&server)
        .await;

    let mut config = config(&server);
    config.metrics = vec!["PROFILE_VIEWS".into()];
    config.max_review_pages = 2;

    let mut pages = fetcher(config)
        .open(Some("tok"), &connection(LOCATION), None)
        .await
        .unwrap();
    let records = drain(&mut pages).await;
    assert_eq!(records.len(), 3);
}

#[tokio::test]
async fn test_open_rejects_bad_location_and_missing_token() {
    let server = MockServer::start().await;
    let fetcher = fetcher(config(&server));

    let err = fetcher
        .open(Some("tok"), &connection("locations/222"), None)
        .await
        .err()
        .unwrap();
    assert!(matches!(err, SyncError::Configuration { .. }));

    let err = fetcher
        .open(None, &connection(LOCATION), None)
        .await
        .err()
        .unwrap();
    assert!(matches!(err, SyncError::Configuration { .. }));
}

#[tokio::test]
async fn test_sync_refreshes_google_token_and_scores_blob() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("client_id=client-1"))
        .and(body_string_contains("refresh_token=rt-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{LOCATION_PATH}/reportInsights")))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(report_response("PROFILE_VIEWS", &[300, 300])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{LOCATION_PATH}/reviews")))
        .respond_with(ResponseTemplate::new(200).set_body_json(reviews_page(
            vec![
                review("r1", "FIVE", "2024-06-20T00:00:00Z"),
                review("r2", "FOUR", "2023-01-01T00:00:00Z"),
            ],
            None,
        )))
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryStore::new());
    let connection = connection(LOCATION);
    let tenant = connection.tenant_id;
    store.save_connection(&connection).await.unwrap();
    store
        .save_credential(
            tenant,
            Provider::GoogleGbp,
            &OAuthCredential {
                connection_id: connection.id,
                access_token: "stale".into(),
                refresh_token: Some("rt-1".into()),
                expires_at: Some(now() - Duration::minutes(1)),
                last_refreshed_at: None,
            },
        )
        .await
        .unwrap();

    let mut config = config(&server);
    config.metrics = vec!["PROFILE_VIEWS".into()];
    let transport = Arc::new(ReqwestTransport::default());
    let refresher = Arc::new(config.refresher(transport.clone()));

    let outcome = SyncOrchestrator::new(store.clone(), Arc::new(fetcher(config)), SyncConfig::default())
        .unwrap()
        .with_clock(Arc::new(ManualClock::new(now())))
        .with_refresher(refresher)
        .run_for_tenant(tenant)
        .await;

    assert!(outcome.is_completed(), "{outcome:?}");
    assert_eq!(outcome.result().records_fetched, 3);
    assert_eq!(outcome.result().records_created, 1);
    assert_eq!(outcome.result().records_updated, 2);

    let blob = store
        .find_entity(tenant, &NaturalKey::metrics(Provider::GoogleGbp))
        .await
        .unwrap()
        .unwrap();
    let blob = blob.as_metrics().unwrap();
    assert_eq!(blob.metric_total("PROFILE_VIEWS"), 600);
    assert_eq!(blob.review_summary.total, 2);
    assert_eq!(blob.review_summary.new_in_window, 1);
    assert_eq!(blob.score, Some(80));

    let credential = store
        .load_credential(tenant, Provider::GoogleGbp)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(credential.access_token, "fresh");
}
