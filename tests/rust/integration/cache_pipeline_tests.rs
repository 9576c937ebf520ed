//! Integration tests for the mimic cache loop: a live fetch seeds the
//! cache through the background write queue, and later reads are
//! answered from the mimic tables without touching the provider.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use geofed::federation::{CacheWriteQueue, FederationService, InstanceCache, SubApiSource};
use geofed::object_catalog::ObjectCatalog;
use geofed::providers::{FetchCache, InstanceBundle, LiveProvider, ProviderError};
use geofed::query_model::{AbstractQuery, ObjectInstance, PropertyValue};
use geofed::sql_compiler::{CompilerOptions, QueryParam};
use geofed::store::{RowSet, SqlStore, SqlValue, StoreError, VecRowSet};

fn catalog() -> Arc<ObjectCatalog> {
    let yaml = r#"
classes:
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
  - name: MapFrame
    kind: detail_view
    primary_key: Id
    cache_table: cb_map_frames
    cache_key_column: frame_id
    sources: [survey_api]
    properties:
      - name: Id
        type: string
        mimic_column: frame_id
"#;
    Arc::new(ObjectCatalog::from_yaml_str(yaml).expect("catalog should build"))
}

/// Plays scripted row sets for reads and records every write statement.
struct ScriptedStore {
    responses: Mutex<VecDeque<Vec<Vec<SqlValue>>>>,
    executed: Mutex<Vec<String>>,
    fail_writes: bool,
}

impl ScriptedStore {
    fn new(responses: Vec<Vec<Vec<SqlValue>>>) -> Arc<Self> {
        Arc::new(ScriptedStore {
            responses: Mutex::new(responses.into()),
            executed: Mutex::new(Vec::new()),
            fail_writes: false,
        })
    }

    fn failing_writes(responses: Vec<Vec<Vec<SqlValue>>>) -> Arc<Self> {
        Arc::new(ScriptedStore {
            responses: Mutex::new(responses.into()),
            executed: Mutex::new(Vec::new()),
            fail_writes: true,
        })
    }

    fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
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

    async fn execute(&self, sql: &str, _params: &[QueryParam]) -> Result<u64, StoreError> {
        self.executed.lock().unwrap().push(sql.to_string());
        if self.fail_writes {
            return Err(StoreError::Execution("write rejected".to_string()));
        }
        Ok(1)
    }
}

struct StubProvider {
    bundles: Mutex<VecDeque<InstanceBundle>>,
    calls: AtomicUsize,
}

impl StubProvider {
    fn new(bundles: Vec<InstanceBundle>) -> Arc<Self> {
        Arc::new(StubProvider {
            bundles: Mutex::new(bundles.into()),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LiveProvider for StubProvider {
    fn source_tag(&self) -> &str {
        "survey_api"
    }

    async fn fetch_by_id(
        &self,
        _class_name: &str,
        _id: &str,
        _fetch_cache: &FetchCache,
    ) -> Result<Option<InstanceBundle>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.bundles.lock().unwrap().pop_front() {
            Some(bundle) => Ok(Some(bundle)),
            None => Err(ProviderError::Transport {
                url: "http://survey.test/records".to_string(),
                message: "no scripted bundle left".to_string(),
            }),
        }
    }

    async fn search_polygon(
        &self,
        _wkt: &str,
        _srid: &str,
        _formats: &[String],
        _fetch_cache: &FetchCache,
    ) -> Result<Vec<InstanceBundle>, ProviderError> {
        Ok(Vec::new())
    }
}

fn sheet_instance(id: &str, name: &str) -> ObjectInstance {
    let mut instance = ObjectInstance::with_id("SurveySheet", id);
    instance.set_property("Name", PropertyValue::Str(name.to_string()));
    instance.set_source_tag("survey_api");
    instance.set_complete(true);
    instance
}

fn wire_service(
    store: Arc<ScriptedStore>,
    provider: Arc<StubProvider>,
    queue: &CacheWriteQueue,
) -> FederationService {
    let cache = Arc::new(InstanceCache::new(
        catalog(),
        store,
        CompilerOptions::default(),
    ));
    let source = SubApiSource::new(provider, catalog()).with_cache(cache, queue.writer());
    FederationService::new(catalog()).register(Arc::new(source))
}

#[tokio::test]
async fn test_live_fetch_seeds_cache_and_later_read_short_circuits() {
    let store = ScriptedStore::new(vec![
        // First lookup misses the cache
        vec![],
        // Second lookup finds the complete mimic row
        vec![vec![
            SqlValue::Text("r1".to_string()),
            SqlValue::Text("Cached name".to_string()),
            SqlValue::Text("survey_api".to_string()),
            SqlValue::Bool(true),
        ]],
    ]);
    let provider = StubProvider::new(vec![InstanceBundle {
        primary: sheet_instance("r1", "Live name"),
        satellites: Vec::new(),
    }]);
    let queue = CacheWriteQueue::start(store.clone(), 8, 1);
    let service = wire_service(store.clone(), provider.clone(), &queue);

    let query = AbstractQuery::by_ids("SurveySheet", vec!["r1".to_string()]);
    let first = service.execute(&query).await.expect("live fetch should succeed");
    assert_eq!(
        first.instances[0].property("Name"),
        Some(&PropertyValue::Str("Live name".to_string()))
    );

    let second = service.execute(&query).await.expect("cache should answer");
    assert_eq!(
        second.instances[0].property("Name"),
        Some(&PropertyValue::Str("Cached name".to_string()))
    );
    assert_eq!(provider.calls(), 1);

    // The source holds a writer handle; the queue drains once it is gone
    drop(service);
    let stats = queue.shutdown().await;
    assert_eq!(stats.enqueued, 1);
    assert_eq!(stats.applied, 1);
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.dropped, 0);

    let executed = store.executed();
    assert_eq!(executed.len(), 2);
    assert!(executed[0].starts_with("DELETE FROM cb_survey_sheets"));
    assert!(executed[1].starts_with("INSERT INTO cb_survey_sheets"));
    assert!(executed[1].contains("record_id, source_tag, is_complete, name"));
}

#[tokio::test]
async fn test_bundle_satellites_ride_in_the_same_batch() {
    let store = ScriptedStore::new(vec![vec![]]);
    let provider = StubProvider::new(vec![InstanceBundle {
        primary: sheet_instance("r1", "Live name"),
        satellites: vec![{
            let mut frame = ObjectInstance::with_id("MapFrame", "f9");
            frame.set_source_tag("survey_api");
            frame.set_complete(true);
            frame
        }],
    }]);
    let queue = CacheWriteQueue::start(store.clone(), 8, 1);
    let service = wire_service(store.clone(), provider, &queue);

    service
        .execute(&AbstractQuery::by_ids("SurveySheet", vec!["r1".to_string()]))
        .await
        .expect("live fetch should succeed");

    drop(service);
    let stats = queue.shutdown().await;
    assert_eq!(stats.enqueued, 1);
    assert_eq!(stats.applied, 1);

    let executed = store.executed();
    assert_eq!(executed.len(), 4);
    assert!(executed[0].starts_with("DELETE FROM cb_survey_sheets"));
    assert!(executed[1].starts_with("INSERT INTO cb_survey_sheets"));
    assert!(executed[2].starts_with("DELETE FROM cb_map_frames"));
    assert!(executed[3].starts_with("INSERT INTO cb_map_frames"));
}

#[tokio::test]
async fn test_failed_cache_write_leaves_the_result_intact() {
    let store = ScriptedStore::failing_writes(vec![vec![]]);
    let provider = StubProvider::new(vec![InstanceBundle {
        primary: sheet_instance("r1", "Live name"),
        satellites: Vec::new(),
    }]);
    let queue = CacheWriteQueue::start(store.clone(), 8, 1);
    let service = wire_service(store.clone(), provider, &queue);

    let outcome = service
        .execute(&AbstractQuery::by_ids("SurveySheet", vec!["r1".to_string()]))
        .await
        .expect("cache trouble must not fail the query");
    assert_eq!(
        outcome.instances[0].property("Name"),
        Some(&PropertyValue::Str("Live name".to_string()))
    );

    drop(service);
    let stats = queue.shutdown().await;
    assert_eq!(stats.enqueued, 1);
    assert_eq!(stats.applied, 0);
    assert_eq!(stats.failed, 1);
}
