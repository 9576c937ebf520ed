//! GeoFed - Federated query layer for geospatial object services
//!
//! This crate answers abstract object queries over a class catalog through:
//! - Runtime compilation to parameterized dialect SQL against a relational store
//! - Dispatch to external survey/mapping web services
//! - A cache of mimic tables reconciling live and stored results

pub mod config;
pub mod federation;
pub mod geometry;
pub mod object_catalog;
pub mod providers;
pub mod query_model;
pub mod row_mapper;
pub mod server;
pub mod sql_compiler;
pub mod store;
