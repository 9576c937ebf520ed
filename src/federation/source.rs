use async_trait::async_trait;

use crate::providers::FetchCache;
use crate::query_model::{AbstractQuery, ObjectInstance};

use super::errors::FederationError;

/// Ceiling on nested related-instance resolution. Relationship graphs
/// can be cyclic, so every recursive descent carries a depth and stops
/// here.
pub const MAX_RELATED_DEPTH: usize = 4;

/// Per-request state threaded through every source one evaluation
/// touches: the provider fetch memo and the current recursion depth.
#[derive(Clone)]
pub struct QueryContext {
    pub fetch_cache: FetchCache,
    depth: usize,
}

impl QueryContext {
    pub fn new() -> Self {
        QueryContext {
            fetch_cache: FetchCache::new(),
            depth: 0,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Context for one level deeper of related resolution. Shares the
    /// fetch memo with the parent.
    pub fn descend(&self) -> Result<QueryContext, FederationError> {
        if self.depth >= MAX_RELATED_DEPTH {
            return Err(FederationError::RelatedDepthExceeded(MAX_RELATED_DEPTH));
        }
        Ok(QueryContext {
            fetch_cache: self.fetch_cache.clone(),
            depth: self.depth + 1,
        })
    }
}

impl Default for QueryContext {
    fn default() -> Self {
        Self::new()
    }
}

/// What a source hands back for one query: the mapped instances plus
/// the whole-result count when the caller asked for one.
#[derive(Debug, Default)]
pub struct QueryOutcome {
    pub instances: Vec<ObjectInstance>,
    pub total_count: Option<i64>,
}

impl QueryOutcome {
    pub fn from_instances(instances: Vec<ObjectInstance>) -> Self {
        QueryOutcome {
            instances,
            total_count: None,
        }
    }

    /// Fold another source's outcome into this one, preserving arrival
    /// order and summing counts when both sides carry one.
    pub fn merge(&mut self, other: QueryOutcome) {
        self.instances.extend(other.instances);
        self.total_count = match (self.total_count, other.total_count) {
            (Some(a), Some(b)) => Some(a + b),
            (one, None) | (None, one) => one,
        };
    }
}

/// One queryable backend: the relational store, or a sub-API provider
/// fronted by its cache.
#[async_trait]
pub trait ObjectSource: Send + Sync {
    /// Tag matched against a class schema's source list when routing.
    fn source_tag(&self) -> &str;

    async fn query(
        &self,
        query: &AbstractQuery,
        ctx: &QueryContext,
    ) -> Result<QueryOutcome, FederationError>;
}
