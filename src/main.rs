use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::error;

use tierlist_api::catalog::{CatalogStore, LibsqlCatalog};
use tierlist_api::config::Config;
use tierlist_api::db::DatabaseManager;
use tierlist_api::icons::IconResolver;
use tierlist_api::logging;
use tierlist_api::server::{start_server, AppContext};

#[derive(Parser)]
#[command(name = "tierlist_api")]
#[command(about = "Monster catalog HTTP API")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the catalog API
    Serve,
    /// Apply the catalog schema to the configured database
    Migrate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    // Initialize logging
    logging::init_logging();

    let cli = Cli::parse();

    // Configuration faults are fatal before any serving starts.
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Startup failed: {}", e);
            return Err(e.into());
        }
    };

    match cli.command {
        Commands::Serve => {
            let db = DatabaseManager::connect(&config).await?;
            let catalog: Arc<dyn CatalogStore> = Arc::new(LibsqlCatalog::new(db));
            let icons = Arc::new(IconResolver::from_config(&config));

            let ctx = AppContext {
                catalog,
                icons,
                public_base_url: config.public_base_url.clone(),
            };

            start_server(ctx, &config.host, config.port).await?;
        }
        Commands::Migrate => {
            let db = DatabaseManager::connect(&config).await?;
            db.run_migrations().await?;
            println!("✅ Migrations applied to {}", config.database_url);
        }
    }

    Ok(())
}
