//! Integration test target: the federation layer composed the way the
//! server composes it, over scripted stores and providers.

mod cache_pipeline_tests;
mod federation_service_tests;
