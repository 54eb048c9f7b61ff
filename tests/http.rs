use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{json, Value};

use tagwatch::core::config::TagwatchConfig;
use tagwatch::dto::check::{CheckAcceptedDto, CheckStatus, DesiredStateDto, TimelineDto};
use tagwatch::dto::error::ErrorDto;
use tagwatch::http;
use tagwatch::resolver::registry::ResolverRegistry;
use tagwatch::state::TagwatchState;
use tagwatch::store::memory::MemoryStore;

use crate::common::{eventually, Scripted, ScriptedResolver};

mod common;

const CATALOG: &str = r#"
components:
  - name: ledger
    source: harbor
    image:
      repository: harbor.local/payments/ledger
  - name: gateway
    source: harbor
    image:
      repository: harbor.local/payments/gateway
"#;

struct Server {
    base_url: String,
    _catalog_dir: tempfile::TempDir,
}

async fn spawn_server() -> Server {
    let catalog_dir = tempfile::tempdir().unwrap();
    let catalog_path = catalog_dir.path().join("catalog.yaml");
    std::fs::write(&catalog_path, CATALOG).unwrap();

    let config: TagwatchConfig = serde_json::from_value(json!({
        "namespace": "payments",
        "catalog_path": catalog_path,
        "teams": { "risk": catalog_path },
    })).unwrap();

    let registry = ResolverRegistry::new();
    registry.register(Arc::new(ScriptedResolver::new("harbor")
        .answer("ledger", Scripted::Version("3.1.4"))
        .answer("gateway", Scripted::Version("0.7.0"))));

    let state = TagwatchState::with_store(config, registry, Arc::new(MemoryStore::new()));
    state.start().await.unwrap();

    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).unwrap();
    let address = listener.local_addr().unwrap();
    let server = axum::Server::from_tcp(listener).unwrap()
        .serve(http::router(state).into_make_service());
    tokio::spawn(server);

    Server {
        base_url: format!("http://{address}"),
        _catalog_dir: catalog_dir,
    }
}

#[tokio::test]
async fn check_publishes_desired_state() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();

    let res = client.post(format!("{}/check", server.base_url)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::ACCEPTED);
    let accepted: CheckAcceptedDto = res.json().await.unwrap();
    assert_eq!(accepted.status, CheckStatus::Accepted);
    assert_eq!(accepted.enqueued, 2);

    let url = format!("{}/desired/payments/ledger", server.base_url);
    assert!(eventually(Duration::from_secs(2), || {
        let (client, url) = (client.clone(), url.clone());
        async move { client.get(&url).send().await.map(|res| res.status().is_success()).unwrap_or(false) }
    }).await);

    let record: DesiredStateDto = client.get(&url).send().await.unwrap().json().await.unwrap();
    assert_eq!(record.version, "3.1.4");
    assert_eq!(record.repository, "harbor.local/payments/ledger");
}

#[tokio::test]
async fn check_of_unknown_component_is_ignored() {
    let server = spawn_server().await;

    let res = reqwest::Client::new().post(format!("{}/check/unknown", server.base_url)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::ACCEPTED);
    let accepted: CheckAcceptedDto = res.json().await.unwrap();
    assert_eq!(accepted.status, CheckStatus::Ignored);
    assert_eq!(accepted.enqueued, 0);
}

#[tokio::test]
async fn missing_record_is_not_found() {
    let server = spawn_server().await;

    let res = reqwest::get(format!("{}/desired/payments/nope", server.base_url)).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let err: ErrorDto = res.json().await.unwrap();
    assert_eq!(err.code, "NOT_FOUND");
}

#[tokio::test]
async fn fleet_change_fills_timeline() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();

    let res = client.post(format!("{}/fleet/changed", server.base_url))
        .json(&json!({ "name": "gateway" }))
        .send().await.unwrap();
    assert_eq!(res.status(), StatusCode::ACCEPTED);

    let url = format!("{}/timeline/risk/gateway", server.base_url);
    assert!(eventually(Duration::from_secs(2), || {
        let (client, url) = (client.clone(), url.clone());
        async move { client.get(&url).send().await.map(|res| res.status().is_success()).unwrap_or(false) }
    }).await);

    let timeline: TimelineDto = client.get(&url).send().await.unwrap().json().await.unwrap();
    assert_eq!(timeline.entries.len(), 1);
    assert_eq!(timeline.entries[0].image, "harbor.local/payments/gateway:0.7.0");

    let record: Value = client.get(format!("{}/desired/risk/gateway", server.base_url)).send().await.unwrap().json().await.unwrap();
    assert_eq!(record["version"], "0.7.0");
}

#[tokio::test]
async fn fleet_change_requires_name() {
    let server = spawn_server().await;

    let res = reqwest::Client::new().post(format!("{}/fleet/changed", server.base_url))
        .json(&json!({ "name": " " }))
        .send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let err: ErrorDto = res.json().await.unwrap();
    assert_eq!(err.code, "BAD_REQUEST");
}
