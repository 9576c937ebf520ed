//! Integration tests for the federation service wired the way the
//! server wires it: a relational source over a scripted store plus
//! live provider sources, exercised end to end through `execute`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use geofed::federation::{FederationService, SqlObjectSource, SubApiSource};
use geofed::object_catalog::ObjectCatalog;
use geofed::providers::{FetchCache, InstanceBundle, LiveProvider, ProviderError};
use geofed::query_model::{
    AbstractQuery, ObjectInstance, PropertyValue, RelationalOperator, WhereNode,
};
use geofed::sql_compiler::{CompilerOptions, QueryParam};
use geofed::store::{RowSet, SqlStore, SqlValue, StoreError, VecRowSet};

fn catalog() -> Arc<ObjectCatalog> {
    let yaml = r#"
classes:
  - name: Feature
    table: FEATURES
    key_column: FEATURE_ID
    primary_key: Id
    properties:
      - name: Id
        type: string
        column: FEATURE_ID
      - name: Name
        type: string
        column: NAME
  - name: Station
    kind: spatial_entity
    bases: [Feature]
    table: STATIONS
    key_column: FEATURE_REF
    properties:
      - name: Elevation
        type: int
        column: ELEVATION
  - name: SurveySheet
    kind: detail_view
    primary_key: Id
    cache_table: cb_survey_sheets
    cache_key_column: record_id
    sources: [survey_api, mapping_api]
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

enum ProviderReply {
    Bundle(InstanceBundle),
    Outage,
}

struct StubProvider {
    tag: &'static str,
    replies: Mutex<VecDeque<ProviderReply>>,
    calls: AtomicUsize,
}

impl StubProvider {
    fn new(tag: &'static str, replies: Vec<ProviderReply>) -> Arc<Self> {
        Arc::new(StubProvider {
            tag,
            replies: Mutex::new(replies.into()),
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
        self.tag
    }

    async fn fetch_by_id(
        &self,
        _class_name: &str,
        _id: &str,
        _fetch_cache: &FetchCache,
    ) -> Result<Option<InstanceBundle>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.replies.lock().unwrap().pop_front() {
            Some(ProviderReply::Bundle(bundle)) => Ok(Some(bundle)),
            Some(ProviderReply::Outage) | None => Err(ProviderError::Transport {
                url: format!("http://{}.test/records", self.tag),
                message: "connection refused".to_string(),
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

fn sheet_bundle(tag: &str, id: &str, name: &str) -> ProviderReply {
    let mut primary = ObjectInstance::with_id("SurveySheet", id);
    primary.set_property("Name", PropertyValue::Str(name.to_string()));
    primary.set_source_tag(tag);
    primary.set_complete(true);
    ProviderReply::Bundle(InstanceBundle {
        primary,
        satellites: Vec::new(),
    })
}

fn survey_source(provider: Arc<StubProvider>) -> Arc<SubApiSource> {
    Arc::new(SubApiSource::new(provider, catalog()))
}

#[tokio::test]
async fn test_store_class_query_produces_typed_instances() {
    // Select list resolves to ELEVATION, NAME and the appended key
    let store = ScriptedStore::new(vec![vec![
        vec![
            SqlValue::Int(421),
            SqlValue::Text("Summit post".to_string()),
            SqlValue::Text("st1".to_string()),
        ],
        vec![
            SqlValue::Int(9),
            SqlValue::Text("Harbour mark".to_string()),
            SqlValue::Text("st2".to_string()),
        ],
    ]]);
    let service = FederationService::new(catalog()).register(Arc::new(SqlObjectSource::new(
        catalog(),
        store,
        CompilerOptions::default(),
    )));

    let mut query = AbstractQuery::new("Station");
    query.properties = Some(vec!["Elevation".to_string(), "Name".to_string()]);
    let outcome = service.execute(&query).await.expect("query should succeed");

    assert_eq!(outcome.instances.len(), 2);
    let first = &outcome.instances[0];
    assert_eq!(first.id.as_deref(), Some("st1"));
    assert_eq!(first.property("Elevation"), Some(&PropertyValue::Int(421)));
    assert_eq!(
        first.property("Name"),
        Some(&PropertyValue::Str("Summit post".to_string()))
    );
    assert_eq!(outcome.instances[1].id.as_deref(), Some("st2"));
}

#[tokio::test]
async fn test_store_outage_surfaces_environmental_error() {
    let store = ScriptedStore::new(Vec::new());
    let service = FederationService::new(catalog()).register(Arc::new(SqlObjectSource::new(
        catalog(),
        store,
        CompilerOptions::default(),
    )));

    let error = service
        .execute(&AbstractQuery::new("Station"))
        .await
        .expect_err("store failure should propagate");
    assert!(error.is_environmental());
}

#[tokio::test]
async fn test_multi_source_class_blends_in_registration_order() {
    let survey = StubProvider::new("survey_api", vec![sheet_bundle("survey_api", "r1", "Survey copy")]);
    let mapping = StubProvider::new(
        "mapping_api",
        vec![sheet_bundle("mapping_api", "r1", "Mapping copy")],
    );
    let service = FederationService::new(catalog())
        .register(survey_source(survey.clone()))
        .register(survey_source(mapping.clone()));

    let outcome = service
        .execute(&AbstractQuery::by_ids("SurveySheet", vec!["r1".to_string()]))
        .await
        .expect("both sources should answer");

    assert_eq!(outcome.instances.len(), 2);
    assert_eq!(
        outcome.instances[0].property("Name"),
        Some(&PropertyValue::Str("Survey copy".to_string()))
    );
    assert_eq!(
        outcome.instances[1].property("Name"),
        Some(&PropertyValue::Str("Mapping copy".to_string()))
    );
    assert_eq!(survey.calls(), 1);
    assert_eq!(mapping.calls(), 1);
}

#[tokio::test]
async fn test_environmental_failure_keeps_the_surviving_source() {
    let survey = StubProvider::new("survey_api", vec![ProviderReply::Outage]);
    let mapping = StubProvider::new(
        "mapping_api",
        vec![sheet_bundle("mapping_api", "r1", "Mapping copy")],
    );
    let service = FederationService::new(catalog())
        .register(survey_source(survey))
        .register(survey_source(mapping));

    let outcome = service
        .execute(&AbstractQuery::by_ids("SurveySheet", vec!["r1".to_string()]))
        .await
        .expect("surviving source should carry the result");

    assert_eq!(outcome.instances.len(), 1);
    assert_eq!(
        outcome.instances[0].property("Name"),
        Some(&PropertyValue::Str("Mapping copy".to_string()))
    );
}

#[tokio::test]
async fn test_all_sources_down_propagates_the_first_failure() {
    let survey = StubProvider::new("survey_api", vec![ProviderReply::Outage]);
    let mapping = StubProvider::new("mapping_api", vec![ProviderReply::Outage]);
    let service = FederationService::new(catalog())
        .register(survey_source(survey))
        .register(survey_source(mapping));

    let error = service
        .execute(&AbstractQuery::by_ids("SurveySheet", vec!["r1".to_string()]))
        .await
        .expect_err("no source left to answer");
    assert!(error.is_environmental());
}

#[tokio::test]
async fn test_user_friendly_rejection_aborts_the_blend() {
    let survey = StubProvider::new("survey_api", vec![sheet_bundle("survey_api", "r1", "Survey copy")]);
    let mapping = StubProvider::new(
        "mapping_api",
        vec![sheet_bundle("mapping_api", "r1", "Mapping copy")],
    );
    let service = FederationService::new(catalog())
        .register(survey_source(survey))
        .register(survey_source(mapping));

    // Providers answer id lookups and polygon searches, nothing else
    let mut query = AbstractQuery::new("SurveySheet");
    query.criteria = Some(WhereNode::Comparison {
        property: "Name".to_string(),
        operator: RelationalOperator::Like,
        value: PropertyValue::Str("%sheet%".to_string()),
    });

    let error = service
        .execute(&query)
        .await
        .expect_err("criteria shape should be rejected");
    assert!(error.is_user_friendly());
    assert!(error.to_string().contains("id lookups and polygon searches"));
}

#[tokio::test]
async fn test_unregistered_tag_leaves_no_source_to_consult() {
    // Catalog routes SurveySheet to providers, none are registered
    let store = ScriptedStore::new(Vec::new());
    let service = FederationService::new(catalog()).register(Arc::new(SqlObjectSource::new(
        catalog(),
        store,
        CompilerOptions::default(),
    )));

    let error = service
        .execute(&AbstractQuery::by_ids("SurveySheet", vec!["r1".to_string()]))
        .await
        .expect_err("no matching source is registered");
    assert!(!error.is_user_friendly());
}
