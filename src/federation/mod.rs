//! Federation layer. Routes abstract queries to the object sources a
//! class is served by, blends multi-source results into one outcome
//! and reconciles the blend against the mimic cache.

pub mod cache;
pub mod errors;
pub mod fanout;
pub mod overrides;
pub mod source;
pub mod sql_source;
pub mod sub_api;
pub mod write_queue;

pub use cache::InstanceCache;
pub use errors::{ErrorKind, FederationError};
pub use source::{ObjectSource, QueryContext, QueryOutcome, MAX_RELATED_DEPTH};
pub use sql_source::{SqlObjectSource, SQL_SOURCE_TAG};
pub use sub_api::SubApiSource;
pub use write_queue::{CacheWriteQueue, CacheWriter, WriteQueueStats};

use std::sync::Arc;

use log::debug;

use crate::object_catalog::ObjectCatalog;
use crate::query_model::AbstractQuery;

/// Entry point for query execution. Owns the registered object sources
/// and decides per class which of them to consult.
pub struct FederationService {
    catalog: Arc<ObjectCatalog>,
    sources: Vec<Arc<dyn ObjectSource>>,
    cache: Option<Arc<InstanceCache>>,
}

impl FederationService {
    pub fn new(catalog: Arc<ObjectCatalog>) -> Self {
        FederationService {
            catalog,
            sources: Vec::new(),
            cache: None,
        }
    }

    pub fn register(mut self, source: Arc<dyn ObjectSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Cache consulted after every query to override fetched instances
    /// with reconciled copies.
    pub fn with_override_cache(mut self, cache: Arc<InstanceCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Source tags a class is served by: the first non-empty `sources`
    /// list along its base chain. A class that declares none is served
    /// by the relational store alone.
    fn route_tags(&self, class_name: &str) -> Result<Vec<String>, FederationError> {
        for class in self.catalog.base_chain(class_name)? {
            if !class.sources.is_empty() {
                return Ok(class.sources.clone());
            }
        }
        Ok(Vec::new())
    }

    fn sources_for(
        &self,
        class_name: &str,
    ) -> Result<Vec<Arc<dyn ObjectSource>>, FederationError> {
        let tags = self.route_tags(class_name)?;
        let selected: Vec<Arc<dyn ObjectSource>> = if tags.is_empty() {
            self.sources
                .iter()
                .filter(|s| s.source_tag() == SQL_SOURCE_TAG)
                .cloned()
                .collect()
        } else {
            self.sources
                .iter()
                .filter(|s| tags.iter().any(|tag| tag == s.source_tag()))
                .cloned()
                .collect()
        };
        debug!(
            "Routing {} to {} of {} sources",
            class_name,
            selected.len(),
            self.sources.len()
        );
        Ok(selected)
    }

    /// Execute one abstract query end to end: route, fan out, blend,
    /// then reconcile the blended instances against the cache.
    pub async fn execute(&self, query: &AbstractQuery) -> Result<QueryOutcome, FederationError> {
        let ctx = QueryContext::new();
        let sources = self.sources_for(&query.class_name)?;
        let mut outcome = fanout::query_all_sources(&sources, query, &ctx).await?;
        if let Some(cache) = &self.cache {
            overrides::apply_overrides(cache, &mut outcome.instances).await;
        }
        Ok(outcome)
    }
}
