use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use crate::config::ServerConfig;
use crate::federation::{
    CacheWriteQueue, CacheWriter, FederationService, InstanceCache, SqlObjectSource, SubApiSource,
};
use crate::object_catalog::ObjectCatalog;
use crate::providers::{ReqwestFetcher, SurveyApiClient};
use crate::sql_compiler::CompilerOptions;
use crate::store::SqlStore;

use gateway::GatewaySqlStore;
use handlers::{
    get_class_handler, health_check, list_classes_handler, query_handler, sql_handler,
};

mod gateway;
pub mod handlers;
mod models;

/// Tag the configured survey provider registers under. Classes route to
/// it by listing this tag in their catalog `sources` entry.
pub const SURVEY_SOURCE_TAG: &str = "survey_api";

/// Request bodies larger than this are rejected with 413. Criteria
/// trees with long id lists stay well under it.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

pub struct AppState {
    pub catalog: Arc<ObjectCatalog>,
    pub federation: Arc<FederationService>,
    pub cache_writer: Option<CacheWriter>,
    pub compiler_options: CompilerOptions,
    pub config: ServerConfig,
}

pub fn build_router(app_state: Arc<AppState>) -> Router {
    let request_timeout = Duration::from_secs(app_state.config.request_timeout_secs);

    Router::new()
        .route("/health", get(health_check))
        .route("/query", post(query_handler))
        .route("/query/sql", post(sql_handler))
        .route("/catalog", get(list_classes_handler))
        .route("/catalog/{name}", get(get_class_handler))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CatchPanicLayer::new())
        .with_state(app_state)
}

pub async fn run() {
    dotenv().ok();

    // Load server configuration from environment variables
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    run_with_config(config).await;
}

pub async fn run_with_config(config: ServerConfig) {
    dotenv().ok();

    log::info!(
        "Server configuration: http={}:{}, catalog={}, store={}, cache={}",
        config.http_host,
        config.http_port,
        config.catalog_path,
        config.store_url,
        if config.cache_enabled { "on" } else { "off" }
    );

    let catalog = match ObjectCatalog::from_yaml_file(&config.catalog_path) {
        Ok(catalog) => Arc::new(catalog),
        Err(e) => {
            log::error!(
                "Failed to load object catalog from {}: {}",
                config.catalog_path,
                e
            );
            log::error!("  Server cannot start without a valid catalog.");
            std::process::exit(1);
        }
    };
    log::info!("Object catalog loaded: {} classes", catalog.class_names().len());

    let store: Arc<dyn SqlStore> = match GatewaySqlStore::new(
        &config.store_url,
        config.store_user.clone(),
        config.store_password.clone(),
        config.request_timeout_secs,
    ) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            log::error!("Failed to create SQL gateway client: {}", e);
            std::process::exit(1);
        }
    };

    let compiler_options = CompilerOptions {
        row_cap: config.row_cap,
    };

    // Cache plumbing. Reads serve overrides and outage fallbacks, all
    // writes go through one bounded queue.
    let (cache, write_queue) = if config.cache_enabled {
        let cache = Arc::new(InstanceCache::new(
            catalog.clone(),
            store.clone(),
            compiler_options.clone(),
        ));
        let queue = CacheWriteQueue::start(
            store.clone(),
            config.cache_queue_capacity,
            config.cache_write_workers,
        );
        log::info!(
            "Cache write queue started: capacity={}, workers={}",
            config.cache_queue_capacity,
            config.cache_write_workers
        );
        (Some(cache), Some(queue))
    } else {
        log::warn!("Mimic cache disabled: no overrides and no outage fallback");
        (None, None)
    };

    let mut federation = FederationService::new(catalog.clone()).register(Arc::new(
        SqlObjectSource::new(catalog.clone(), store.clone(), compiler_options.clone()),
    ));

    if let Some(base_url) = config.provider_base_url.as_deref() {
        let fetcher = match ReqwestFetcher::new(config.provider_timeout_secs) {
            Ok(fetcher) => Arc::new(fetcher),
            Err(e) => {
                log::error!("Failed to create provider HTTP client: {}", e);
                std::process::exit(1);
            }
        };
        let client = match SurveyApiClient::new(
            SURVEY_SOURCE_TAG,
            base_url,
            fetcher,
            catalog.clone(),
        ) {
            Ok(client) => Arc::new(client),
            Err(e) => {
                log::error!("Survey provider cannot be registered: {}", e);
                log::error!("  The catalog is missing a class the provider payloads map to.");
                std::process::exit(1);
            }
        };

        let mut source = SubApiSource::new(client, catalog.clone());
        if let (Some(cache), Some(queue)) = (&cache, &write_queue) {
            source = source.with_cache(cache.clone(), queue.writer());
        }
        source = source.with_spatial_blacklist(config.spatial_blacklist.clone());
        federation = federation.register(Arc::new(source));
        log::info!("Survey provider registered: {}", base_url);
    } else {
        log::info!("No provider URL configured, serving from the relational store only");
    }

    if let Some(cache) = &cache {
        federation = federation.with_override_cache(cache.clone());
    }

    let app_state = Arc::new(AppState {
        catalog,
        federation: Arc::new(federation),
        cache_writer: write_queue.as_ref().map(|queue| queue.writer()),
        compiler_options,
        config: config.clone(),
    });
    let app = build_router(app_state.clone());

    // Start HTTP server
    let http_bind_address = format!("{}:{}", config.http_host, config.http_port);
    log::info!("Starting HTTP server on {}", http_bind_address);

    let http_listener = match TcpListener::bind(&http_bind_address).await {
        Ok(listener) => {
            log::info!("Successfully bound HTTP listener to {}", http_bind_address);
            listener
        }
        Err(e) => {
            log::error!(
                "Failed to bind HTTP listener to {}: {}",
                http_bind_address,
                e
            );
            log::error!("  Is another process using port {}?", config.http_port);
            std::process::exit(1);
        }
    };

    let http_server = axum::serve(http_listener, app);

    println!("geofed server is running");
    println!("  HTTP API: http://{}", http_bind_address);

    if config.daemon {
        println!("Running in daemon mode - press Ctrl+C to stop");

        // Run server and signal handler concurrently
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    log::error!("Failed to register SIGTERM handler: {}. Server will run without graceful shutdown.", e);
                    if let Err(e) = http_server.await {
                        log::error!("HTTP server error: {:?}", e);
                    }
                    return;
                }
            };
            let mut sigint = match signal(SignalKind::interrupt()) {
                Ok(s) => s,
                Err(e) => {
                    log::error!("Failed to register SIGINT handler: {}. Server will run without graceful shutdown.", e);
                    if let Err(e) = http_server.await {
                        log::error!("HTTP server error: {:?}", e);
                    }
                    return;
                }
            };

            tokio::select! {
                result = http_server => {
                    if let Err(e) = result {
                        log::error!("HTTP server error: {:?}", e);
                    }
                }
                _ = sigterm.recv() => println!("Received SIGTERM, shutting down..."),
                _ = sigint.recv() => println!("Received SIGINT, shutting down..."),
            }
        }

        #[cfg(windows)]
        {
            tokio::select! {
                result = http_server => {
                    if let Err(e) = result {
                        log::error!("HTTP server error: {:?}", e);
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    println!("Received shutdown signal, shutting down...");
                }
            }
        }

        println!("Server stopped");
    } else if let Err(e) = http_server.await {
        log::error!("HTTP server fatal error: {:?}", e);
        std::process::exit(1);
    }

    // The queue drains only once every writer handle is gone, and the
    // application state holds one.
    drop(app_state);
    if let Some(queue) = write_queue {
        let stats = queue.shutdown().await;
        log::info!(
            "Cache write queue drained: {} batches applied, {} failed, {} dropped",
            stats.applied,
            stats.failed,
            stats.dropped
        );
    }
}
