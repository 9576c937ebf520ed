//! Multi-source fan-out.
//!
//! Every source registered for a class is queried concurrently. One
//! failing source still yields a partial result as long as another
//! source succeeded; when every source fails, the first failure is
//! re-raised in full. Caller-input failures are the exception: a
//! `UserFriendly` error from any source aborts the whole aggregate.

use std::sync::Arc;

use futures_util::future::join_all;
use log::warn;

use crate::query_model::AbstractQuery;

use super::errors::FederationError;
use super::source::{ObjectSource, QueryContext, QueryOutcome};

pub async fn query_all_sources(
    sources: &[Arc<dyn ObjectSource>],
    query: &AbstractQuery,
    ctx: &QueryContext,
) -> Result<QueryOutcome, FederationError> {
    if sources.is_empty() {
        return Err(FederationError::defect(format!(
            "No source is registered for class {}",
            query.class_name
        )));
    }

    let evaluations = sources.iter().map(|source| source.query(query, ctx));
    let results = join_all(evaluations).await;

    let mut merged: Option<QueryOutcome> = None;
    let mut first_failure: Option<FederationError> = None;
    for (source, result) in sources.iter().zip(results) {
        match result {
            Ok(outcome) => match merged.as_mut() {
                Some(all) => all.merge(outcome),
                None => merged = Some(outcome),
            },
            Err(error) if error.is_user_friendly() => return Err(error),
            Err(error) => {
                warn!(
                    "Source {} failed for {}: {}",
                    source.source_tag(),
                    query.class_name,
                    error
                );
                if first_failure.is_none() {
                    first_failure = Some(error);
                }
            }
        }
    }

    match merged {
        Some(outcome) => Ok(outcome),
        None => Err(first_failure.unwrap_or_else(|| {
            FederationError::defect(format!("No source answered for class {}", query.class_name))
        })),
    }
}
