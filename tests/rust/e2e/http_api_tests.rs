//! End-to-end tests driving the HTTP API through the assembled router,
//! with the store and providers scripted behind the federation layer.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::util::ServiceExt;

use geofed::config::ServerConfig;
use geofed::federation::{CacheWriteQueue, FederationService, SqlObjectSource, SubApiSource};
use geofed::object_catalog::ObjectCatalog;
use geofed::providers::{FetchCache, InstanceBundle, LiveProvider, ProviderError};
use geofed::server::{build_router, AppState};
use geofed::sql_compiler::{CompilerOptions, QueryParam};
use geofed::store::{RowSet, SqlStore, SqlValue, StoreError, VecRowSet};

fn catalog() -> Arc<ObjectCatalog> {
    let yaml = r#"
classes:
  - name: Station
    kind: spatial_entity
    table: STATIONS
    key_column: STATION_ID
    primary_key: Id
    properties:
      - name: Id
        type: string
        column: STATION_ID
      - name: Name
        type: string
        column: NAME
      - name: Elevation
        type: int
        column: ELEVATION
  - name: SurveySheet
    kind: detail_view
    primary_key: Id
    cache_table: cb_survey_sheets
    cache_key_column: record_id
    sources: [survey_api]
    properties:
      - name: Id
        type: string
        mimic_column: record_id
      - name: Name
        type: string
        mimic_column: name
"#;
    Arc::new(ObjectCatalog::from_yaml_str(yaml).expect("catalog should build"))
}

struct ScriptedStore {
    responses: Mutex<VecDeque<Vec<Vec<SqlValue>>>>,
}

impl ScriptedStore {
    fn new(responses: Vec<Vec<Vec<SqlValue>>>) -> Arc<Self> {
        Arc::new(ScriptedStore {
            responses: Mutex::new(responses.into()),
        })
    }
}

#[async_trait]
impl SqlStore for ScriptedStore {
    async fn query(
        &self,
        _sql: &str,
        _params: &[QueryParam],
    ) -> Result<Box<dyn RowSet>, StoreError> {
        match self.responses.lock().unwrap().pop_front() {
            Some(rows) => Ok(Box::new(VecRowSet::new(rows))),
            None => Err(StoreError::Execution("no scripted response".to_string())),
        }
    }

    async fn execute(&self, _sql: &str, _params: &[QueryParam]) -> Result<u64, StoreError> {
        Ok(0)
    }
}

/// Provider that is permanently unreachable.
struct DownProvider;

#[async_trait]
impl LiveProvider for DownProvider {
    fn source_tag(&self) -> &str {
        "survey_api"
    }

    async fn fetch_by_id(
        &self,
        _class_name: &str,
        _id: &str,
        _fetch_cache: &FetchCache,
    ) -> Result<Option<InstanceBundle>, ProviderError> {
        Err(ProviderError::Transport {
            url: "http://survey.internal:9443/records".to_string(),
            message: "connection refused".to_string(),
        })
    }

    async fn search_polygon(
        &self,
        _wkt: &str,
        _srid: &str,
        _formats: &[String],
        _fetch_cache: &FetchCache,
    ) -> Result<Vec<InstanceBundle>, ProviderError> {
        Err(ProviderError::Transport {
            url: "http://survey.internal:9443/search".to_string(),
            message: "connection refused".to_string(),
        })
    }
}

fn build_app(store: Arc<ScriptedStore>) -> Router {
    let catalog = catalog();
    let federation = FederationService::new(catalog.clone())
        .register(Arc::new(SqlObjectSource::new(
            catalog.clone(),
            store,
            CompilerOptions::default(),
        )))
        .register(Arc::new(SubApiSource::new(
            Arc::new(DownProvider),
            catalog.clone(),
        )));
    let app_state = Arc::new(AppState {
        catalog,
        federation: Arc::new(federation),
        cache_writer: None,
        compiler_options: CompilerOptions::default(),
        config: ServerConfig::default(),
    });
    build_router(app_state)
}

fn post_json(uri: &str, payload: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("request should build")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request should build")
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should collect");
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

#[tokio::test]
async fn test_query_endpoint_returns_instances() {
    // Select list resolves to STATION_ID, NAME, ELEVATION
    let store = ScriptedStore::new(vec![vec![vec![
        SqlValue::Text("st1".to_string()),
        SqlValue::Text("Summit post".to_string()),
        SqlValue::Int(421),
    ]]]);
    let app = build_app(store);

    let payload = serde_json::json!({ "className": "Station" });
    let response = app
        .oneshot(post_json("/query", &payload))
        .await
        .expect("request should complete");

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("X-Request-Id"));
    let body = body_json(response).await;
    assert_eq!(body["className"], "Station");
    assert!(!body["requestId"].as_str().expect("requestId").is_empty());
    let instance = &body["instances"][0];
    assert_eq!(instance["className"], "Station");
    assert_eq!(instance["id"], "st1");
    assert_eq!(instance["properties"]["Name"], "Summit post");
    assert_eq!(instance["properties"]["Elevation"], 421);
}

#[tokio::test]
async fn test_unknown_class_is_a_bad_request() {
    let app = build_app(ScriptedStore::new(Vec::new()));

    let payload = serde_json::json!({ "className": "Asteroid" });
    let response = app
        .oneshot(post_json("/query", &payload))
        .await
        .expect("request should complete");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["kind"], "bad_request");
    assert!(body["error"].as_str().expect("error").contains("Asteroid"));
}

#[tokio::test]
async fn test_provider_outage_maps_to_bad_gateway_with_generic_body() {
    let app = build_app(ScriptedStore::new(Vec::new()));

    let payload = serde_json::json!({
        "className": "SurveySheet",
        "criteria": { "type": "idSet", "ids": ["r1"] },
    });
    let response = app
        .oneshot(post_json("/query", &payload))
        .await
        .expect("request should complete");

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert_eq!(body["kind"], "upstream");
    // Upstream detail stays in the log, not in the body
    let message = body["error"].as_str().expect("error");
    assert_eq!(message, "Upstream dependency failure");
    assert!(!message.contains("survey.internal"));
}

#[tokio::test]
async fn test_health_without_queue_omits_counters() {
    let app = build_app(ScriptedStore::new(Vec::new()));

    let response = app
        .oneshot(get("/health"))
        .await
        .expect("request should complete");

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["service"], "geofed");
    assert_eq!(body["status"], "healthy");
    assert!(body.get("cacheQueue").is_none());
}

#[tokio::test]
async fn test_health_reports_queue_counters() {
    let store = ScriptedStore::new(Vec::new());
    let queue = CacheWriteQueue::start(store.clone(), 8, 1);
    let catalog = catalog();
    let federation = FederationService::new(catalog.clone()).register(Arc::new(
        SqlObjectSource::new(catalog.clone(), store, CompilerOptions::default()),
    ));
    let app_state = Arc::new(AppState {
        catalog,
        federation: Arc::new(federation),
        cache_writer: Some(queue.writer()),
        compiler_options: CompilerOptions::default(),
        config: ServerConfig::default(),
    });
    let app = build_router(app_state);

    let response = app
        .oneshot(get("/health"))
        .await
        .expect("request should complete");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["cacheQueue"]["enqueued"], 0);
    assert_eq!(body["cacheQueue"]["dropped"], 0);

    // The router was consumed by the request; only the queue's own
    // writer handle is left, so the drain completes.
    let stats = queue.shutdown().await;
    assert_eq!(stats.enqueued, 0);
}

#[tokio::test]
async fn test_catalog_listing_summarizes_classes() {
    let app = build_app(ScriptedStore::new(Vec::new()));

    let response = app
        .oneshot(get("/catalog"))
        .await
        .expect("request should complete");

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let classes = body.as_array().expect("class list");
    assert_eq!(classes.len(), 2);
    let sheet = classes
        .iter()
        .find(|c| c["name"] == "SurveySheet")
        .expect("SurveySheet summary");
    assert_eq!(sheet["cached"], true);
    assert_eq!(sheet["queriableLive"], false);
    assert_eq!(sheet["sources"][0], "survey_api");
}

#[tokio::test]
async fn test_catalog_detail_and_unknown_class() {
    let app = build_app(ScriptedStore::new(Vec::new()));
    let response = app
        .oneshot(get("/catalog/Station"))
        .await
        .expect("request should complete");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["name"], "Station");

    let app = build_app(ScriptedStore::new(Vec::new()));
    let response = app
        .oneshot(get("/catalog/Nowhere"))
        .await
        .expect("request should complete");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["kind"], "not_found");
}

#[tokio::test]
async fn test_sql_endpoint_compiles_without_executing() {
    // Empty script: any store call would fail the test
    let app = build_app(ScriptedStore::new(Vec::new()));

    let payload = serde_json::json!({
        "className": "Station",
        "criteria": { "type": "idSet", "ids": ["st1", "st2"] },
    });
    let response = app
        .oneshot(post_json("/query/sql", &payload))
        .await
        .expect("request should complete");

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let sql = body["sql"].as_str().expect("sql text");
    println!("Compiled SQL:\n{}", sql);
    assert!(sql.starts_with("SELECT TOP 1000 "));
    assert!(sql.contains("FROM STATIONS tab0"));
    assert!(sql.contains("tab0.STATION_ID = @p0 OR tab0.STATION_ID = @p1"));
    let parameters = body["parameters"].as_array().expect("parameters");
    assert_eq!(parameters.len(), 2);
    assert_eq!(parameters[0]["name"], "@p0");
    assert_eq!(parameters[0]["value"], "st1");
}
