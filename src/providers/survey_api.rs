//! Client for the national survey catalog service. One record in the
//! provider's catalog describes a published dataset sheet (imagery,
//! elevation model, point cloud) with its footprint and lineage; the
//! client reshapes records into object instances the federation layer
//! can return and cache.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::join_all;
use lazy_static::lazy_static;
use log::{debug, warn};
use serde::Deserialize;

use crate::geometry::{extract_bounding_box, footprint_to_json};
use crate::object_catalog::{EntityKind, ObjectCatalog, PropertyType};
use crate::query_model::{ObjectInstance, PropertyValue};

use super::errors::ProviderError;
use super::http::{FetchCache, HttpFetch};
use super::{InstanceBundle, LiveProvider};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};

/// One searchable dataset category on the provider side.
#[derive(Clone)]
pub struct DatasetCategory {
    pub code: &'static str,
    pub label: &'static str,
    /// Payload format tag records of this category carry by default
    pub format: &'static str,
}

// Static dataset category table
lazy_static! {
    static ref DATASET_CATEGORIES: HashMap<&'static str, DatasetCategory> = {
        let mut m = HashMap::new();

        m.insert("ortho", DatasetCategory {
            code: "ortho",
            label: "Orthophoto imagery",
            format: "GeoTIFF",
        });
        m.insert("dtm", DatasetCategory {
            code: "dtm",
            label: "Digital terrain model",
            format: "ArcInfo ASCII Grid",
        });
        m.insert("dsm", DatasetCategory {
            code: "dsm",
            label: "Digital surface model",
            format: "ArcInfo ASCII Grid",
        });
        m.insert("pointcloud", DatasetCategory {
            code: "pointcloud",
            label: "Laser point cloud",
            format: "LAS",
        });

        m
    };
}

/// Get a dataset category by its code
pub fn dataset_category(code: &str) -> Option<&'static DatasetCategory> {
    DATASET_CATEGORIES.get(code.to_lowercase().as_str())
}

/// All known category codes, sorted for deterministic fan-out order
pub fn dataset_category_codes() -> Vec<&'static str> {
    let mut codes: Vec<&'static str> = DATASET_CATEGORIES.keys().copied().collect();
    codes.sort_unstable();
    codes
}

/// Provider-native record shape for both id lookup and polygon search.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyRecord {
    pub record_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub footprint_wkt: Option<String>,
    #[serde(default)]
    pub srid: Option<String>,
    #[serde(default)]
    pub acquisition_date: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub scale: Option<String>,
    #[serde(default)]
    pub agency: Option<String>,
    #[serde(default)]
    pub series_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    #[serde(default)]
    items: Vec<SurveyRecord>,
}

/// Survey service client. Class names for the produced instances are
/// resolved from the catalog once, by entity kind, at construction.
pub struct SurveyApiClient {
    source_tag: String,
    base_url: String,
    fetcher: Arc<dyn HttpFetch>,
    catalog: Arc<ObjectCatalog>,
    detail_class: String,
    entity_class: String,
    metadata_class: String,
    source_class: String,
}

impl SurveyApiClient {
    pub fn new(
        source_tag: impl Into<String>,
        base_url: impl Into<String>,
        fetcher: Arc<dyn HttpFetch>,
        catalog: Arc<ObjectCatalog>,
    ) -> Result<Self, crate::object_catalog::CatalogError> {
        let detail_class = catalog.class_of_kind(EntityKind::DetailView)?.name.clone();
        let entity_class = catalog.class_of_kind(EntityKind::SpatialEntity)?.name.clone();
        let metadata_class = catalog.class_of_kind(EntityKind::Metadata)?.name.clone();
        let source_class = catalog.class_of_kind(EntityKind::DataSource)?.name.clone();
        Ok(SurveyApiClient {
            source_tag: source_tag.into(),
            base_url: base_url.into(),
            fetcher,
            catalog,
            detail_class,
            entity_class,
            metadata_class,
            source_class,
        })
    }

    fn record_url(&self, id: &str) -> Result<String, ProviderError> {
        let base = format!("{}/api/records/{}", self.base_url.trim_end_matches('/'), id);
        reqwest::Url::parse_with_params(&base, &[("format", "json")])
            .map(|u| u.to_string())
            .map_err(|e| ProviderError::transport_with_context(base, e))
    }

    fn search_url(&self, category: &str, wkt: &str, srid: &str) -> Result<String, ProviderError> {
        let base = format!("{}/api/search/{}", self.base_url.trim_end_matches('/'), category);
        reqwest::Url::parse_with_params(&base, &[("geometry", wkt), ("srid", srid)])
            .map(|u| u.to_string())
            .map_err(|e| ProviderError::transport_with_context(base, e))
    }

    /// Categories selected by the caller's format filter; empty filter
    /// means every category.
    fn selected_categories(formats: &[String]) -> Vec<&'static DatasetCategory> {
        if formats.is_empty() {
            return dataset_category_codes()
                .into_iter()
                .filter_map(dataset_category)
                .collect();
        }
        let mut selected = Vec::new();
        for code in dataset_category_codes() {
            if let Some(category) = dataset_category(code) {
                let wanted = formats.iter().any(|f| {
                    f.eq_ignore_ascii_case(category.code) || f.eq_ignore_ascii_case(category.format)
                });
                if wanted {
                    selected.push(category);
                }
            }
        }
        selected
    }

    async fn search_category(
        &self,
        category: &DatasetCategory,
        wkt: &str,
        srid: &str,
        fetch_cache: &FetchCache,
    ) -> Result<Vec<SurveyRecord>, ProviderError> {
        let url = self.search_url(category.code, wkt, srid)?;
        let body = fetch_cache.fetch(self.fetcher.as_ref(), &url).await?;
        let envelope: SearchEnvelope = serde_json::from_str(&body)
            .map_err(|e| ProviderError::payload_with_context(&url, e))?;
        debug!(
            "Survey search in {} returned {} records",
            category.code,
            envelope.items.len()
        );
        Ok(envelope.items)
    }

    /// Build the four-instance view of one record: the detail-view
    /// instance plus placeholder satellites for the spatial entity,
    /// the metadata series and the publishing agency.
    fn build_instances(
        &self,
        record: &SurveyRecord,
        default_format: Option<&str>,
    ) -> Vec<ObjectInstance> {
        let footprint_json = record.footprint_wkt.as_deref().and_then(|wkt| {
            let srid = record.srid.as_deref().unwrap_or("4326");
            match extract_bounding_box(wkt) {
                Ok(bbox) => Some(footprint_to_json(
                    &bbox.min_x,
                    &bbox.min_y,
                    &bbox.max_x,
                    &bbox.max_y,
                    srid,
                )),
                Err(e) => {
                    warn!("Survey record {} has a bad footprint: {}", record.record_id, e);
                    None
                }
            }
        });
        let format = record.format.as_deref().or(default_format);

        let mut detail = ObjectInstance::with_id(&self.detail_class, &record.record_id);
        self.set_if_declared(&mut detail, "Name", record.name.as_deref());
        self.set_if_declared(&mut detail, "AcquisitionDate", record.acquisition_date.as_deref());
        self.set_if_declared(&mut detail, "Format", format);
        self.set_if_declared(&mut detail, "Scale", record.scale.as_deref());
        self.set_if_declared(&mut detail, "Agency", record.agency.as_deref());
        if let Some(json) = &footprint_json {
            self.set_geometry_if_declared(&mut detail, "Footprint", json);
        }
        detail.set_complete(true);
        detail.set_source_tag(&self.source_tag);

        let mut entity = ObjectInstance::with_id(&self.entity_class, &record.record_id);
        self.set_if_declared(&mut entity, "Name", record.name.as_deref());
        if let Some(json) = &footprint_json {
            self.set_geometry_if_declared(&mut entity, "Footprint", json);
        }
        entity.set_complete(false);
        entity.set_source_tag(&self.source_tag);

        let series_id = record
            .series_id
            .clone()
            .unwrap_or_else(|| record.record_id.clone());
        let mut metadata = ObjectInstance::with_id(&self.metadata_class, series_id);
        self.set_if_declared(&mut metadata, "Name", record.name.as_deref());
        self.set_if_declared(
            &mut metadata,
            "AcquisitionDate",
            record.acquisition_date.as_deref(),
        );
        self.set_if_declared(&mut metadata, "Format", format);
        metadata.set_complete(false);
        metadata.set_source_tag(&self.source_tag);

        let agency = record.agency.clone().unwrap_or_else(|| self.source_tag.clone());
        let mut source = ObjectInstance::with_id(&self.source_class, &agency);
        self.set_if_declared(&mut source, "Name", Some(agency.as_str()));
        source.set_complete(false);
        source.set_source_tag(&self.source_tag);

        vec![detail, entity, metadata, source]
    }

    fn bundle_for(
        &self,
        record: &SurveyRecord,
        primary_class: &str,
        default_format: Option<&str>,
    ) -> Option<InstanceBundle> {
        let mut instances = self.build_instances(record, default_format);
        let position = instances.iter().position(|i| i.class_name == primary_class)?;
        let primary = instances.remove(position);
        Some(InstanceBundle {
            primary,
            satellites: instances,
        })
    }

    /// Set a property when the target class declares it, converting
    /// the record's text to the declared type. Values that do not
    /// parse are skipped rather than failing the whole record.
    fn set_if_declared(&self, instance: &mut ObjectInstance, property: &str, text: Option<&str>) {
        let Some(text) = text else { return };
        let Ok((_, schema)) = self.catalog.resolve_property(&instance.class_name, property) else {
            return;
        };
        let value = match schema.value_type {
            PropertyType::String => Some(PropertyValue::Str(text.to_string())),
            PropertyType::Int => text.trim().parse().ok().map(PropertyValue::Int),
            PropertyType::Long => text.trim().parse().ok().map(PropertyValue::Long),
            PropertyType::Double => text.trim().parse().ok().map(PropertyValue::Double),
            PropertyType::Boolean => match text.trim() {
                t if t.eq_ignore_ascii_case("true") => Some(PropertyValue::Bool(true)),
                t if t.eq_ignore_ascii_case("false") => Some(PropertyValue::Bool(false)),
                _ => None,
            },
            PropertyType::DateTime => parse_record_date(text.trim()).map(PropertyValue::DateTime),
            PropertyType::Geometry | PropertyType::Struct | PropertyType::Point => None,
        };
        match value {
            Some(value) => instance.set_property(property, value),
            None => debug!(
                "Skipping property {} on {}: value {:?} does not fit its type",
                property, instance.class_name, text
            ),
        }
    }

    fn set_geometry_if_declared(&self, instance: &mut ObjectInstance, property: &str, json: &str) {
        if self
            .catalog
            .resolve_property(&instance.class_name, property)
            .is_ok()
        {
            instance.set_property(property, PropertyValue::Geometry(json.to_string()));
        }
    }
}

#[async_trait]
impl LiveProvider for SurveyApiClient {
    fn source_tag(&self) -> &str {
        &self.source_tag
    }

    async fn fetch_by_id(
        &self,
        class_name: &str,
        id: &str,
        fetch_cache: &FetchCache,
    ) -> Result<Option<InstanceBundle>, ProviderError> {
        let url = self.record_url(id)?;
        let body = match fetch_cache.fetch(self.fetcher.as_ref(), &url).await {
            Ok(body) => body,
            // The provider answers a missing record with 404; that is a
            // definitive miss, not an outage.
            Err(ProviderError::Status { status: 404, .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        let record: SurveyRecord = serde_json::from_str(&body)
            .map_err(|e| ProviderError::payload_with_context(&url, e))?;
        Ok(self.bundle_for(&record, class_name, None))
    }

    async fn search_polygon(
        &self,
        wkt: &str,
        srid: &str,
        formats: &[String],
        fetch_cache: &FetchCache,
    ) -> Result<Vec<InstanceBundle>, ProviderError> {
        let categories = Self::selected_categories(formats);
        let searches = categories
            .iter()
            .map(|category| self.search_category(category, wkt, srid, fetch_cache));
        let outcomes = join_all(searches).await;

        let mut first_failure: Option<ProviderError> = None;
        let mut by_id: HashMap<String, InstanceBundle> = HashMap::new();
        let mut order: Vec<String> = Vec::new();
        for (category, outcome) in categories.iter().zip(outcomes) {
            match outcome {
                Ok(records) => {
                    for record in &records {
                        if by_id.contains_key(&record.record_id) {
                            continue;
                        }
                        if let Some(bundle) =
                            self.bundle_for(record, &self.detail_class, Some(category.format))
                        {
                            order.push(record.record_id.clone());
                            by_id.insert(record.record_id.clone(), bundle);
                        }
                    }
                }
                Err(e) => {
                    warn!("Survey search in category {} failed: {}", category.code, e);
                    if first_failure.is_none() {
                        first_failure = Some(e);
                    }
                }
            }
        }

        if by_id.is_empty() {
            if let Some(failure) = first_failure {
                return Err(failure);
            }
        }
        Ok(order
            .into_iter()
            .filter_map(|id| by_id.remove(&id))
            .collect())
    }
}

fn parse_record_date(text: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt);
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    None
}
