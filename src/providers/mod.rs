//! Live external sources. Each provider fronts one survey or mapping
//! agency web service and reshapes its records into object instances.

pub mod errors;
pub mod http;
pub mod survey_api;

use async_trait::async_trait;

use crate::query_model::ObjectInstance;

pub use errors::ProviderError;
pub use http::{FetchCache, HttpFetch, ReqwestFetcher};
pub use survey_api::{dataset_category, dataset_category_codes, SurveyApiClient, SurveyRecord};

/// What one provider record becomes: the instance of the class the
/// caller asked about, plus placeholder instances of the neighboring
/// classes produced from the same record and destined for the cache.
#[derive(Debug)]
pub struct InstanceBundle {
    pub primary: ObjectInstance,
    pub satellites: Vec<ObjectInstance>,
}

impl InstanceBundle {
    /// Every instance in the bundle, primary first.
    pub fn into_instances(self) -> Vec<ObjectInstance> {
        let mut all = Vec::with_capacity(1 + self.satellites.len());
        all.push(self.primary);
        all.extend(self.satellites);
        all
    }
}

/// A live external source, identified by its source tag. Id lookups
/// answer `None` for a definitive miss; polygon searches return one
/// bundle per matched record.
#[async_trait]
pub trait LiveProvider: Send + Sync {
    fn source_tag(&self) -> &str;

    async fn fetch_by_id(
        &self,
        class_name: &str,
        id: &str,
        fetch_cache: &FetchCache,
    ) -> Result<Option<InstanceBundle>, ProviderError>;

    async fn search_polygon(
        &self,
        wkt: &str,
        srid: &str,
        formats: &[String],
        fetch_cache: &FetchCache,
    ) -> Result<Vec<InstanceBundle>, ProviderError>;
}
