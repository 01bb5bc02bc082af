mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{any, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cnsi_gateway::cnsi::discovery::Discovery;
use cnsi_gateway::cnsi::CnsiRegistry;
use cnsi_gateway::errors::AppError;
use cnsi_gateway::models::cnsi::CnsiType;
use cnsi_gateway::store::memory::MemoryStore;

use common::{cnsi, http_clients, mint_token, oauth_clients, Harness, USER};

fn registry() -> (Arc<MemoryStore>, CnsiRegistry) {
    let store = Arc::new(MemoryStore::new());
    let registry = CnsiRegistry::new(store.clone(), Discovery::new(Arc::new(http_clients())));
    (store, registry)
}

async fn hcf_cluster() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "vcap",
            "auth_endpoint": "https://login.acme.example",
            "token_endpoint": "https://uaa.acme.example",
            "log_endpoint": "wss://doppler.acme.example:443",
        })))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_register_hcf_records_discovered_endpoints() {
    let cluster = hcf_cluster().await;
    let (store, registry) = registry();

    let record = registry
        .register("Acme", &cluster.uri(), true, CnsiType::Hcf)
        .await
        .unwrap();

    assert_eq!(record.name, "Acme");
    assert_eq!(record.cnsi_type, CnsiType::Hcf);
    assert_eq!(record.api_endpoint, cluster.uri());
    assert_eq!(record.authorization_endpoint, "https://login.acme.example");
    assert_eq!(record.token_endpoint, "https://uaa.acme.example");
    assert_eq!(record.doppler_logging_endpoint, "wss://doppler.acme.example:443");
    assert!(record.skip_ssl_validation);
    assert_eq!(store.cnsi_count(), 1);

    let listed = registry.list().await.unwrap();
    assert_eq!(listed, vec![record.clone()]);
    assert_eq!(registry.get(record.guid).await.unwrap(), Some(record));
}

#[tokio::test]
async fn test_register_hce_has_no_endpoints() {
    let cluster = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"api_version": "v2"})))
        .expect(1)
        .mount(&cluster)
        .await;
    let (_, registry) = registry();

    let record = registry
        .register("pipelines", &cluster.uri(), false, CnsiType::Hce)
        .await
        .unwrap();
    assert_eq!(record.cnsi_type, CnsiType::Hce);
    assert!(record.authorization_endpoint.is_empty());
    assert!(record.token_endpoint.is_empty());
    assert!(record.doppler_logging_endpoint.is_empty());
}

#[tokio::test]
async fn test_register_rejects_blank_input_without_probing() {
    let cluster = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&cluster)
        .await;
    let (store, registry) = registry();

    let err = registry
        .register("", &cluster.uri(), false, CnsiType::Hcf)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = registry
        .register("Acme", "   ", false, CnsiType::Hcf)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = registry
        .register("Acme", "%zzzzz", false, CnsiType::Hcf)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    assert_eq!(store.cnsi_count(), 0);
}

#[tokio::test]
async fn test_register_discovery_failure_stores_nothing() {
    let cluster = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/info"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&cluster)
        .await;
    let (store, registry) = registry();

    let err = registry
        .register("Acme", &cluster.uri(), false, CnsiType::Hcf)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Discovery { .. }));
    assert_eq!(store.cnsi_count(), 0);
}

#[tokio::test]
async fn test_register_store_failure_is_persistence_error() {
    let cluster = hcf_cluster().await;
    let (store, registry) = registry();
    store.set_fail_writes(true);

    let err = registry
        .register("Acme", &cluster.uri(), false, CnsiType::Hcf)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Persistence(_)));
    assert_eq!(store.cnsi_count(), 0);
}

#[tokio::test]
async fn test_list_is_ordered_by_name() {
    let cluster = hcf_cluster().await;
    let (_, registry) = registry();
    assert!(registry.list().await.unwrap().is_empty());

    for name in ["zeta", "alpha", "mid"] {
        registry
            .register(name, &cluster.uri(), false, CnsiType::Hcf)
            .await
            .unwrap();
    }

    let names: Vec<String> = registry
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["alpha", "mid", "zeta"]);
}

#[tokio::test]
async fn test_list_storage_fault_is_persistence_error() {
    let (store, registry) = registry();
    store.set_fail_reads(true);
    assert!(matches!(
        registry.list().await,
        Err(AppError::Persistence(_))
    ));
}

#[tokio::test]
async fn test_unregister_unknown_is_not_found() {
    let (_, registry) = registry();
    assert!(matches!(
        registry.unregister(Uuid::new_v4()).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_unregister_removes_tokens() {
    let harness = Harness::new(oauth_clients(None));
    let record = cnsi("https://api.acme.example", "https://uaa.acme.example", CnsiType::Hcf);
    harness.add_cnsi(&record).await;
    let access = mint_token("uaa-user", (Utc::now() + Duration::hours(1)).timestamp());
    harness
        .add_token(record.guid, &access, "refresh-1", Utc::now() + Duration::hours(1))
        .await;
    assert_eq!(harness.store.token_count(), 1);

    let registry = CnsiRegistry::new(
        harness.store.clone(),
        Discovery::new(Arc::new(http_clients())),
    );
    registry.unregister(record.guid).await.unwrap();

    assert!(registry.get(record.guid).await.unwrap().is_none());
    assert_eq!(harness.store.token_count(), 0);
    assert!(harness.tokens.lookup(record.guid, USER).await.unwrap().is_none());
}
