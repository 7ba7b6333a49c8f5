use bountyledger::ingest::{DepositIngestor, IngestSettings, SqliteUserDirectory, UserDirectory};
use bountyledger::{api, config::Config, db::init_db, Ledger, Repository};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let port = config.port;

    // Initialize database and dependencies
    let pool = match init_db(&config.database_path).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    let repo = Arc::new(Repository::new(pool));
    let ledger = Ledger::new(repo.clone());
    let directory = SqliteUserDirectory::new(repo);
    match directory.seed(&config.address_seeds).await {
        Ok(0) => {}
        Ok(n) => tracing::info!(count = n, "address seeds registered"),
        Err(e) => {
            eprintln!("Failed to register address seeds: {}", e);
            std::process::exit(1);
        }
    }
    let directory: Arc<dyn UserDirectory> = Arc::new(directory);
    let ingestor = Arc::new(DepositIngestor::new(
        ledger.clone(),
        directory,
        IngestSettings::from_config(&config),
    ));

    // Create router
    let app = api::create_router(api::AppState::new(ledger, ingestor, config));

    // Bind to address
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Server listening on {}", addr);

    // Run server
    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
