//! Relational-store source. Compiles abstract queries into live-schema
//! SQL, walks the result cursor into instances, and resolves related
//! criteria into attached relationship edges with scoped follow-up
//! queries.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use log::debug;

use crate::object_catalog::ObjectCatalog;
use crate::query_model::{AbstractQuery, ObjectInstance, WhereNode};
use crate::row_mapper::map_rows;
use crate::sql_compiler::{BindingMode, CompiledQuery, CompilerOptions, QueryCompiler};
use crate::store::SqlStore;

use super::errors::FederationError;
use super::source::{ObjectSource, QueryContext, QueryOutcome, MAX_RELATED_DEPTH};

/// Routing tag the relational store answers to unless overridden.
pub const SQL_SOURCE_TAG: &str = "store";

/// Source backed by the relational store holding the live schema.
pub struct SqlObjectSource {
    tag: String,
    catalog: Arc<ObjectCatalog>,
    store: Arc<dyn SqlStore>,
    options: CompilerOptions,
}

impl SqlObjectSource {
    pub fn new(
        catalog: Arc<ObjectCatalog>,
        store: Arc<dyn SqlStore>,
        options: CompilerOptions,
    ) -> Self {
        Self::with_tag(SQL_SOURCE_TAG, catalog, store, options)
    }

    pub fn with_tag(
        tag: impl Into<String>,
        catalog: Arc<ObjectCatalog>,
        store: Arc<dyn SqlStore>,
        options: CompilerOptions,
    ) -> Self {
        SqlObjectSource {
            tag: tag.into(),
            catalog,
            store,
            options,
        }
    }

    fn compile(&self, query: &AbstractQuery) -> Result<CompiledQuery, FederationError> {
        let compiler = QueryCompiler::new(&self.catalog, self.options.clone());
        Ok(compiler.compile(query, BindingMode::Live)?)
    }

    async fn fetch(&self, compiled: &CompiledQuery) -> Result<Vec<ObjectInstance>, FederationError> {
        let mut rows = self
            .store
            .query(&compiled.sql, compiled.params.params())
            .await?;
        Ok(map_rows(&compiled.layout, rows.as_mut()).await?)
    }

    /// Resolve every related criterion in `criteria` for every instance:
    /// one follow-up query per instance per criterion, scoped back to
    /// that instance through the inverted relationship, then recursing
    /// into the criterion's own nested related criteria.
    fn attach_related<'a>(
        &'a self,
        instances: &'a mut Vec<ObjectInstance>,
        criteria: &'a WhereNode,
        ctx: &'a QueryContext,
    ) -> BoxFuture<'a, Result<(), FederationError>> {
        async move {
            for criterion in criteria.collect_related() {
                let deeper = match ctx.descend() {
                    Ok(deeper) => deeper,
                    Err(_) => {
                        debug!(
                            "Stopping related resolution of {} at depth {}",
                            criterion.relationship,
                            ctx.depth()
                        );
                        continue;
                    }
                };
                let relationship = self.catalog.relationship(criterion.relationship)?;
                let parent_class = relationship.near_class(criterion.direction).to_string();

                for instance in instances.iter_mut() {
                    // Rows without a key value cannot anchor a join back
                    let Some(id) = instance.id.clone() else {
                        continue;
                    };
                    let back_edge = WhereNode::Related {
                        relationship: criterion.relationship.to_string(),
                        direction: criterion.direction.invert(),
                        related_class: parent_class.clone(),
                        criteria: Box::new(WhereNode::IdSet { ids: vec![id] }),
                    };
                    let mut sub_query = AbstractQuery::new(criterion.related_class);
                    sub_query.criteria = Some(WhereNode::and_group(vec![
                        back_edge,
                        criterion.criteria.clone(),
                    ]));

                    let compiled = self.compile(&sub_query)?;
                    let mut related = self.fetch(&compiled).await?;
                    self.attach_related(&mut related, criterion.criteria, &deeper)
                        .await?;
                    instance.add_relation(criterion.relationship, related);
                }
            }
            Ok(())
        }
        .boxed()
    }

    async fn evaluate(
        &self,
        query: &AbstractQuery,
        ctx: &QueryContext,
    ) -> Result<QueryOutcome, FederationError> {
        if let Some(criteria) = &query.criteria {
            if criteria.related_depth() > MAX_RELATED_DEPTH {
                return Err(FederationError::RelatedDepthExceeded(MAX_RELATED_DEPTH));
            }
        }

        let compiled = self.compile(query)?;
        debug!("Executing for {}: {}", query.class_name, compiled.sql);
        let mut instances = self.fetch(&compiled).await?;

        if let Some(criteria) = &query.criteria {
            self.attach_related(&mut instances, criteria, ctx).await?;
        }

        // The count statement reuses the full parameter set; paging
        // placeholders it never references are bound but unused.
        let total_count = match &compiled.count_sql {
            Some(count_sql) => Some(
                self.store
                    .query_count(count_sql, compiled.params.params())
                    .await?,
            ),
            None => None,
        };

        Ok(QueryOutcome {
            instances,
            total_count,
        })
    }
}

#[async_trait]
impl ObjectSource for SqlObjectSource {
    fn source_tag(&self) -> &str {
        &self.tag
    }

    async fn query(
        &self,
        query: &AbstractQuery,
        ctx: &QueryContext,
    ) -> Result<QueryOutcome, FederationError> {
        self.evaluate(query, ctx).await
    }
}
