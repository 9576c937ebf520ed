//! Override reconciliation.
//!
//! Provider fetches leave the freshest copy of an instance in the
//! mimic cache. After a query is answered, the cache is consulted once
//! per distinct class present in the result and every non-null cached
//! property overwrites the fetched one. A cached copy carrying the
//! same source tag as the instance itself is skipped; it cannot be
//! fresher than what was just fetched. Attached relationship edges are
//! reconciled the same way, level by level.

use std::collections::BTreeMap;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::query_model::ObjectInstance;

use super::cache::InstanceCache;

pub fn apply_overrides<'a>(
    cache: &'a InstanceCache,
    instances: &'a mut [ObjectInstance],
) -> BoxFuture<'a, ()> {
    async move {
        let mut ids_by_class: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for instance in instances.iter() {
            if let Some(id) = &instance.id {
                ids_by_class
                    .entry(instance.class_name.clone())
                    .or_default()
                    .push(id.clone());
            }
        }

        for (class_name, ids) in &ids_by_class {
            let cached = cache.lookup_by_ids(class_name, ids).await;
            if cached.is_empty() {
                continue;
            }
            for instance in instances.iter_mut() {
                if &instance.class_name != class_name {
                    continue;
                }
                let Some(id) = &instance.id else {
                    continue;
                };
                let Some(fresher) = cached.get(id) else {
                    continue;
                };
                if fresher.source_tag() == instance.source_tag() {
                    continue;
                }
                instance.apply_override(fresher);
            }
        }

        for instance in instances.iter_mut() {
            for edge in &mut instance.relations {
                apply_overrides(cache, &mut edge.instances).await;
            }
        }
    }
    .boxed()
}
