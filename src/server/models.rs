use serde::Serialize;

use crate::federation::WriteQueueStats;
use crate::object_catalog::{ClassSchema, EntityKind};
use crate::query_model::ObjectInstance;
use crate::sql_compiler::QueryParam;

/// Successful query response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub request_id: String,
    pub class_name: String,
    /// Present when the caller asked for an instance count
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_count: Option<i64>,
    pub instances: Vec<ObjectInstance>,
}

/// Compile-only response: the statement the store would receive
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileResponse {
    pub class_name: String,
    pub sql: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count_sql: Option<String>,
    pub parameters: Vec<QueryParam>,
}

/// Error body shared by every endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// One catalog class in the listing
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSummary {
    pub name: String,
    pub kind: EntityKind,
    /// Whether a mimic table backs the class
    pub cached: bool,
    /// Whether the class can be compiled against live tables
    pub queriable_live: bool,
    pub sources: Vec<String>,
}

impl ClassSummary {
    pub fn from_schema(schema: &ClassSchema) -> Self {
        ClassSummary {
            name: schema.name.clone(),
            kind: schema.kind,
            cached: schema.cache_binding().is_some(),
            queriable_live: schema.live_binding().is_some(),
            sources: schema.sources.clone(),
        }
    }
}

/// Health report with the cache write queue counters when the queue
/// is running
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub service: &'static str,
    pub status: &'static str,
    pub version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_queue: Option<WriteQueueStats>,
}
