//! Command-line interface.
//!
//! `relaykit` with no subcommand starts the server. Flags override the
//! matching environment variables.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::app::{AppState, build_app};
use crate::blog;
use crate::config::{Config, LogFormat};
use crate::db::Database;

#[derive(Parser, Debug)]
#[command(name = "relaykit")]
#[command(author, version, about = "Relay-style GraphQL resolvers over SQLite", long_about = None)]
pub struct Cli {
    /// SQLite URL (overrides DATABASE_URL)
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    /// Log output format (overrides LOG_FORMAT)
    #[arg(long, value_enum, global = true)]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Migrate, then serve GraphQL and REST over HTTP
    Serve {
        /// Port to listen on (overrides PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Insert sample rows into an empty database first
        #[arg(long)]
        seed: bool,
    },

    /// Create or extend the tables
    Migrate,

    /// Insert sample posts and comments into an empty database
    Seed,

    /// Print the GraphQL schema (SDL)
    Schema {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl Cli {
    /// Apply command-line overrides to the loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        if let Some(url) = &self.database_url {
            config.database_url = url.clone();
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        if let Some(Commands::Serve { port: Some(port), .. }) = &self.command {
            config.port = *port;
        }
    }
}

async fn open(config: &Config) -> Result<Database> {
    let db = Database::connect(&config.database_url).await?;
    let result = blog::migrate(db.pool())
        .await
        .context("Failed to migrate database")?;
    if !result.errors.is_empty() {
        anyhow::bail!("Schema sync failed: {}", result.errors.join("; "));
    }
    tracing::info!(
        tables_created = result.tables_created.len(),
        columns_added = result.columns_added.len(),
        "Database schema in sync"
    );
    Ok(db)
}

/// Execute the parsed command.
pub async fn run(cli: Cli, config: Config) -> Result<()> {
    match cli.command.unwrap_or(Commands::Serve {
        port: None,
        seed: false,
    }) {
        Commands::Serve { seed, .. } => {
            let db = open(&config).await?;
            if seed {
                blog::seed(db.pool()).await.context("Failed to seed database")?;
            }
            serve(config, db).await
        }
        Commands::Migrate => {
            let db = open(&config).await?;
            db.close().await;
            Ok(())
        }
        Commands::Seed => {
            let db = open(&config).await?;
            let result = blog::seed(db.pool()).await.context("Failed to seed database")?;
            println!("Seeded {} posts, {} comments", result.posts, result.comments);
            db.close().await;
            Ok(())
        }
        Commands::Schema { output } => {
            let db = Database::connect("sqlite::memory:").await?;
            let sdl = blog::build_schema(db, config.page_limit).sdl();
            match output {
                Some(path) => std::fs::write(&path, sdl)
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => print!("{}", sdl),
            }
            Ok(())
        }
    }
}

async fn serve(config: Config, db: Database) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(config, db);
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Listening on {}", addr);
    tracing::info!("GraphQL playground: http://{}/graphql", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["relaykit"]).unwrap();
        assert_eq!(cli.command, None);
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from([
            "relaykit",
            "--database-url",
            "sqlite::memory:",
            "--log-format",
            "json",
            "serve",
            "--port",
            "9000",
        ])
        .unwrap();
        let mut config = Config::default();
        cli.apply(&mut config);

        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.port, 9000);
    }

    #[test]
    fn test_unknown_command_fails() {
        assert!(Cli::try_parse_from(["relaykit", "explode"]).is_err());
    }

    #[tokio::test]
    async fn test_schema_command_writes_sdl() {
        let path = std::env::temp_dir().join(format!("relaykit-schema-{}.graphql", std::process::id()));
        let cli = Cli {
            database_url: None,
            log_format: None,
            command: Some(Commands::Schema {
                output: Some(path.clone()),
            }),
        };
        run(cli, Config::default()).await.unwrap();

        let sdl = std::fs::read_to_string(&path).unwrap();
        assert!(sdl.contains("postConnection"));
        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_seed_against_memory_database() {
        let cli = Cli::try_parse_from(["relaykit", "--database-url", "sqlite::memory:", "seed"]).unwrap();
        let mut config = Config::default();
        cli.apply(&mut config);
        run(cli, config).await.unwrap();
    }
}
