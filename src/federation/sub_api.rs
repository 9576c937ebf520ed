//! Sub-API source: one live provider fronted by the mimic cache.
//!
//! Id lookups go cache-first: a complete cached instance answers
//! immediately, anything else asks the provider and falls back to the
//! cached copy only when the provider fails environmentally. Polygon
//! searches go live-first with the cache snapshot as the outage
//! fallback. Every live result is queued for caching before the
//! result list is returned; the queue write itself is not awaited.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};

use crate::geometry::Footprint;
use crate::object_catalog::{EntityKind, ObjectCatalog};
use crate::providers::{InstanceBundle, LiveProvider};
use crate::query_model::{AbstractQuery, ObjectInstance, WhereNode};

use super::cache::InstanceCache;
use super::errors::FederationError;
use super::source::{ObjectSource, QueryContext, QueryOutcome};
use super::write_queue::CacheWriter;

pub struct SubApiSource {
    provider: Arc<dyn LiveProvider>,
    catalog: Arc<ObjectCatalog>,
    cache: Option<Arc<InstanceCache>>,
    writer: Option<CacheWriter>,
    spatial_blacklist: Vec<String>,
}

impl SubApiSource {
    pub fn new(provider: Arc<dyn LiveProvider>, catalog: Arc<ObjectCatalog>) -> Self {
        SubApiSource {
            provider,
            catalog,
            cache: None,
            writer: None,
            spatial_blacklist: Vec::new(),
        }
    }

    /// Attach the mimic cache: lookups, outage fallbacks and queued
    /// writes all require it.
    pub fn with_cache(mut self, cache: Arc<InstanceCache>, writer: CacheWriter) -> Self {
        self.cache = Some(cache);
        self.writer = Some(writer);
        self
    }

    /// Ids never served from the cache snapshot on spatial fallback.
    pub fn with_spatial_blacklist(mut self, ids: Vec<String>) -> Self {
        self.spatial_blacklist = ids;
        self
    }

    async fn cached_instance(&self, class_name: &str, id: &str) -> Option<ObjectInstance> {
        match &self.cache {
            Some(cache) => cache.lookup_by_id(class_name, id).await,
            None => None,
        }
    }

    /// Prepare the cache statements for every instance in the bundle
    /// and hand them to the background writer. Values are bound here,
    /// on the calling task, so later mutation of the instances cannot
    /// affect what gets written.
    fn queue_bundle(&self, bundle: &InstanceBundle) {
        let (Some(cache), Some(writer)) = (&self.cache, &self.writer) else {
            return;
        };
        let mut statements = Vec::new();
        for instance in std::iter::once(&bundle.primary).chain(bundle.satellites.iter()) {
            match cache.prepare_write(instance) {
                Ok(mut batch) => statements.append(&mut batch),
                Err(error) => warn!(
                    "Cache write for {} not prepared: {}",
                    instance.class_name, error
                ),
            }
        }
        writer.enqueue(statements);
    }

    /// Attach bundle satellites as relationship edges for every related
    /// criterion whose class matches the satellite's class.
    fn attach_satellites(
        &self,
        primary: &mut ObjectInstance,
        satellites: &[ObjectInstance],
        criteria: Option<&WhereNode>,
    ) {
        let Some(criteria) = criteria else {
            return;
        };
        for criterion in criteria.collect_related() {
            let matching: Vec<ObjectInstance> = satellites
                .iter()
                .filter(|satellite| {
                    matches!(
                        self.catalog
                            .is_same_or_derived(&satellite.class_name, criterion.related_class),
                        Ok(true)
                    )
                })
                .cloned()
                .collect();
            primary.add_relation(criterion.relationship, matching);
        }
    }

    async fn fetch_one(
        &self,
        class_name: &str,
        id: &str,
        criteria: Option<&WhereNode>,
        ctx: &QueryContext,
    ) -> Result<Option<ObjectInstance>, FederationError> {
        let cached = self.cached_instance(class_name, id).await;
        if let Some(cached) = &cached {
            if cached.is_complete() {
                debug!("Cache answered {} {} complete", class_name, id);
                return Ok(Some(cached.clone()));
            }
        }

        match self
            .provider
            .fetch_by_id(class_name, id, &ctx.fetch_cache)
            .await
        {
            Ok(Some(bundle)) => {
                self.queue_bundle(&bundle);
                let InstanceBundle {
                    mut primary,
                    satellites,
                } = bundle;
                self.attach_satellites(&mut primary, &satellites, criteria);
                Ok(Some(primary))
            }
            // The provider is reachable and says the record is gone; a
            // stale cache placeholder does not resurrect it.
            Ok(None) => Ok(None),
            Err(error) => {
                let failure = FederationError::from(error);
                match cached {
                    Some(cached) if failure.is_environmental() => {
                        warn!(
                            "Live fetch of {} {} failed, serving the cached copy: {}",
                            class_name, id, failure
                        );
                        Ok(Some(cached))
                    }
                    _ => Err(failure),
                }
            }
        }
    }

    async fn lookup_ids(
        &self,
        query: &AbstractQuery,
        ids: &[String],
        ctx: &QueryContext,
    ) -> Result<QueryOutcome, FederationError> {
        let mut instances = Vec::with_capacity(ids.len());
        for id in ids {
            match self
                .fetch_one(&query.class_name, id, query.criteria.as_ref(), ctx)
                .await?
            {
                Some(instance) => instances.push(instance),
                None => return Err(FederationError::not_found(&query.class_name, id)),
            }
        }
        let total_count = query.wants_instance_count().then(|| instances.len() as i64);
        Ok(QueryOutcome {
            instances,
            total_count,
        })
    }

    async fn search_polygon(
        &self,
        query: &AbstractQuery,
        polygon: &serde_json::Value,
        ctx: &QueryContext,
    ) -> Result<QueryOutcome, FederationError> {
        let class = self.catalog.class_schema(&query.class_name)?;
        if class.kind != EntityKind::DetailView {
            return Err(FederationError::bad_request(format!(
                "Class {} does not support polygon search through {}",
                query.class_name,
                self.provider.source_tag()
            )));
        }
        let footprint = Footprint::from_extended_value(polygon)?;
        let wkt = footprint.to_wkt()?;
        let formats = query.requested_formats();

        match self
            .provider
            .search_polygon(&wkt, &footprint.coordinate_system, &formats, &ctx.fetch_cache)
            .await
        {
            Ok(bundles) => {
                let mut instances = Vec::with_capacity(bundles.len());
                for bundle in bundles {
                    self.queue_bundle(&bundle);
                    instances.push(bundle.primary);
                }
                let total_count = query.wants_instance_count().then(|| instances.len() as i64);
                if let Some(limit) = query.limit {
                    instances.truncate(limit as usize);
                }
                Ok(QueryOutcome {
                    instances,
                    total_count,
                })
            }
            Err(error) => {
                let failure = FederationError::from(error);
                if failure.is_environmental() {
                    if let Some(cache) = &self.cache {
                        let snapshot = cache
                            .snapshot_for_polygon(&query.class_name, polygon, &self.spatial_blacklist)
                            .await;
                        if !snapshot.is_empty() {
                            warn!(
                                "Live polygon search failed, serving {} cached instances: {}",
                                snapshot.len(),
                                failure
                            );
                            let total_count =
                                query.wants_instance_count().then(|| snapshot.len() as i64);
                            return Ok(QueryOutcome {
                                instances: snapshot,
                                total_count,
                            });
                        }
                    }
                }
                Err(failure)
            }
        }
    }
}

#[async_trait]
impl ObjectSource for SubApiSource {
    fn source_tag(&self) -> &str {
        self.provider.source_tag()
    }

    async fn query(
        &self,
        query: &AbstractQuery,
        ctx: &QueryContext,
    ) -> Result<QueryOutcome, FederationError> {
        if let Some(ids) = query.criteria.as_ref().and_then(|c| c.find_id_set()) {
            if ids.is_empty() {
                return Err(FederationError::bad_request(
                    "Identifier list is empty (must contain at least one id)",
                ));
            }
            return self.lookup_ids(query, ids, ctx).await;
        }
        if let Some(polygon) = query.polygon_value() {
            return self.search_polygon(query, polygon, ctx).await;
        }
        Err(FederationError::bad_request(format!(
            "Source {} answers id lookups and polygon searches only",
            self.provider.source_tag()
        )))
    }
}
