use std::{sync::Arc, time::Instant};

use axum::{
    extract::{Path, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use log::{debug, info, warn};
use uuid::Uuid;

use crate::federation::{ErrorKind, FederationError};
use crate::object_catalog::CatalogError;
use crate::query_model::AbstractQuery;
use crate::sql_compiler::{BindingMode, QueryCompiler};

use super::{
    models::{ClassSummary, CompileResponse, ErrorBody, HealthResponse, QueryResponse},
    AppState,
};

/// Health endpoint, reporting the cache write queue counters when the
/// queue is running
pub async fn health_check(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        service: "geofed",
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        cache_queue: app_state.cache_writer.as_ref().map(|w| w.stats()),
    })
}

/// Execute one abstract query through the federation layer
pub async fn query_handler(
    State(app_state): State<Arc<AppState>>,
    Json(query): Json<AbstractQuery>,
) -> Response {
    let start_time = Instant::now();
    let request_id = Uuid::new_v4().to_string();
    debug!("[{}] Query for class {}", request_id, query.class_name);

    match app_state.federation.execute(&query).await {
        Ok(outcome) => {
            let elapsed = start_time.elapsed();
            info!(
                "[{}] {} answered with {} instances in {:.2}ms",
                request_id,
                query.class_name,
                outcome.instances.len(),
                elapsed.as_secs_f64() * 1000.0
            );
            let body = QueryResponse {
                request_id: request_id.clone(),
                class_name: query.class_name.clone(),
                instance_count: outcome.total_count,
                instances: outcome.instances,
            };
            let mut response = Json(body).into_response();
            let headers = response.headers_mut();
            if let Ok(value) =
                HeaderValue::try_from(format!("{:.3}ms", elapsed.as_secs_f64() * 1000.0))
            {
                headers.insert("X-Query-Total-Time", value);
            }
            if let Ok(value) = HeaderValue::try_from(request_id.as_str()) {
                headers.insert("X-Request-Id", value);
            }
            response
        }
        Err(error) => error_response(error, Some(&request_id)),
    }
}

/// Compile an abstract query and return the statement without
/// executing it
pub async fn sql_handler(
    State(app_state): State<Arc<AppState>>,
    Json(query): Json<AbstractQuery>,
) -> Response {
    let compiler = QueryCompiler::new(&app_state.catalog, app_state.compiler_options.clone());
    match compiler.compile(&query, BindingMode::Live) {
        Ok(compiled) => Json(CompileResponse {
            class_name: query.class_name.clone(),
            sql: compiled.sql,
            count_sql: compiled.count_sql,
            parameters: compiled.params.params().to_vec(),
        })
        .into_response(),
        Err(error) => error_response(FederationError::from(error), None),
    }
}

/// Summaries of every class the catalog declares
pub async fn list_classes_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    let classes: Vec<ClassSummary> = app_state
        .catalog
        .class_names()
        .into_iter()
        .filter_map(|name| app_state.catalog.class_schema(name).ok())
        .map(ClassSummary::from_schema)
        .collect();
    Json(classes)
}

/// Full schema of one class
pub async fn get_class_handler(
    State(app_state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Response {
    match app_state.catalog.class_schema(&name) {
        Ok(schema) => Json(schema.clone()).into_response(),
        Err(CatalogError::Class { .. }) => (
            StatusCode::NOT_FOUND,
            Json(ErrorBody {
                error: format!("No class named `{}` in the catalog", name),
                kind: "not_found".to_string(),
                request_id: None,
            }),
        )
            .into_response(),
        Err(error) => error_response(FederationError::from(error), None),
    }
}

/// Map a federation failure onto a status code and body. Caller input
/// problems surface verbatim; upstream and internal failures get a
/// generic body and keep their detail in the log.
fn error_response(error: FederationError, request_id: Option<&str>) -> Response {
    let kind = error.kind();
    let (status, kind_name) = match kind {
        ErrorKind::UserFriendly => (StatusCode::BAD_REQUEST, "bad_request"),
        ErrorKind::NotFound => (StatusCode::NOT_FOUND, "not_found"),
        ErrorKind::Environmental => (StatusCode::BAD_GATEWAY, "upstream"),
        ErrorKind::Programmer => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    };
    let message = match kind {
        ErrorKind::UserFriendly | ErrorKind::NotFound => error.to_string(),
        ErrorKind::Environmental => {
            warn!("Upstream failure: {}", error);
            "Upstream dependency failure".to_string()
        }
        ErrorKind::Programmer => {
            log::error!("Internal error: {}", error);
            "Internal error".to_string()
        }
    };
    (
        status,
        Json(ErrorBody {
            error: message,
            kind: kind_name.to_string(),
            request_id: request_id.map(str::to_string),
        }),
    )
        .into_response()
}
