use clap::Parser;
use geofed::{config, server};

/// geofed - A federated object query layer for geospatial stores
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// HTTP server host address
    #[arg(long, default_value = "0.0.0.0")]
    http_host: String,

    /// HTTP server port
    #[arg(long, default_value_t = 8080)]
    http_port: u16,

    /// Path of the object catalog YAML file
    #[arg(long, default_value = "catalog.yaml")]
    catalog: String,

    /// Row cap applied to queries without explicit paging
    #[arg(long, default_value_t = 1000)]
    row_cap: u32,

    /// Disable the mimic cache (enabled by default)
    #[arg(long)]
    disable_cache: bool,

    /// Run server in daemon mode (background process)
    #[arg(long)]
    daemon: bool,
}

impl From<Cli> for config::CliConfig {
    fn from(cli: Cli) -> Self {
        config::CliConfig {
            http_host: cli.http_host,
            http_port: cli.http_port,
            catalog_path: cli.catalog,
            row_cap: cli.row_cap,
            disable_cache: cli.disable_cache,
            daemon: cli.daemon,
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize logger - defaults to INFO level, can be overridden with RUST_LOG env var
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    println!("\ngeofed v{}\n", env!("CARGO_PKG_VERSION"));

    // Create configuration from CLI args
    let cli_config: config::CliConfig = cli.into();
    let config = match config::ServerConfig::from_cli(cli_config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    server::run_with_config(config).await;
}
