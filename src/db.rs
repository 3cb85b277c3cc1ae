use crate::config::Config;
use crate::error::{ApiError, Result};
use libsql::{Builder, Connection, Database};
use tracing::info;

pub struct DatabaseManager {
    db: Database,
}

impl DatabaseManager {
    /// Open the catalog database named by the configuration. Remote
    /// libsql/https URLs go through the Turso builder; anything else is
    /// treated as a local database file path.
    pub async fn connect(config: &Config) -> Result<Self> {
        let url = &config.database_url;

        if url.starts_with("libsql://") || url.starts_with("http://") || url.starts_with("https://")
        {
            info!("Connecting to remote catalog database at {}", url);

            let db = Builder::new_remote(url.clone(), config.database_auth_token.clone())
                .build()
                .await
                .map_err(|e| ApiError::Database {
                    message: format!("Failed to connect to database: {e}"),
                })?;

            Ok(Self { db })
        } else {
            Self::open_local(url).await
        }
    }

    /// Open a local database file directly. Also used by tests.
    pub async fn open_local(path: &str) -> Result<Self> {
        info!("Opening local catalog database at {}", path);

        let db = Builder::new_local(path)
            .build()
            .await
            .map_err(|e| ApiError::Database {
                message: format!("Failed to open database '{path}': {e}"),
            })?;

        Ok(Self { db })
    }

    /// Get a connection to the database. Connections are acquired per
    /// query and dropped when the caller is done with them.
    pub async fn get_connection(&self) -> Result<Connection> {
        self.db.connect().map_err(|e| ApiError::Database {
            message: format!("Failed to get database connection: {e}"),
        })
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations...");

        let conn = self.get_connection().await?;

        let migration_sql = include_str!("../migrations/001_create_monsters.sql");

        conn.execute_batch(migration_sql)
            .await
            .map_err(|e| ApiError::Database {
                message: format!("Failed to run migrations: {e}"),
            })?;

        info!("Database migrations completed successfully");
        Ok(())
    }
}
