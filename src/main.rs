//! Synced Fields CLI
//!
//! Inspect and maintain the secondary store configured through
//! `SYNCED_FIELDS_*` variables (a `.env` file is read when present).
//!
//! # Usage
//!
//! ```bash
//! # Where does field `body` of post 123456 live?
//! synced-fields path posts 123456 body
//!
//! # Print stored fields as JSON
//! synced-fields show posts 1 body summary
//!
//! # Remove stored fields
//! synced-fields purge posts 1 body summary
//! ```

use clap::{Parser, Subcommand};
use synced_fields::storage;
use synced_fields::{Entity, FieldSet, ShardingScheme, SyncConfig};

// =============================================================================
// CLI
// =============================================================================

/// Inspect and maintain synchronized fields
#[derive(Parser, Debug)]
#[command(name = "synced-fields")]
#[command(about = "Inspect and maintain synchronized fields", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the sharded file path of a field
    Path {
        /// Entity table
        table: String,
        /// Primary key
        key: u64,
        /// Field name
        field: String,
    },
    /// Print stored fields of an entity as JSON
    Show {
        /// Entity table
        table: String,
        /// Primary key
        key: u64,
        /// Field names
        #[arg(required = true)]
        fields: Vec<String>,
        /// Primary key attribute name
        #[arg(long, default_value = synced_fields::constants::KEY_NAME_DEFAULT)]
        key_name: String,
    },
    /// Delete stored fields of an entity
    Purge {
        /// Entity table
        table: String,
        /// Primary key
        key: u64,
        /// Field names
        #[arg(required = true)]
        fields: Vec<String>,
        /// Primary key attribute name
        #[arg(long, default_value = synced_fields::constants::KEY_NAME_DEFAULT)]
        key_name: String,
    },
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn,synced_fields=info",
        1 => "debug,sqlx=info,aws_config=info",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = SyncConfig::from_env()?;
    tracing::debug!(driver = ?config.driver, "loaded configuration");

    match cli.command {
        Commands::Path { table, key, field } => {
            let scheme = ShardingScheme::new(config.filesystem.files_per_folder);
            let table = storage::validate_identifier(&table)?;
            let field = storage::validate_identifier(&field)?;
            let relative = scheme.path(table, key, field);
            println!("{}", config.filesystem.root.join(relative).display());
        }
        Commands::Show {
            table,
            key,
            fields,
            key_name,
        } => {
            let backend = storage::connect(&config).await?;
            let entity = Entity::new(table, key).with_key_name(key_name);
            let fields: FieldSet = fields.into_iter().collect();

            let values = backend.retrieve(&entity, &fields).await?;
            println!("{}", serde_json::to_string_pretty(&values)?);
        }
        Commands::Purge {
            table,
            key,
            fields,
            key_name,
        } => {
            let backend = storage::connect(&config).await?;
            let entity = Entity::new(table, key).with_key_name(key_name);
            let fields: FieldSet = fields.into_iter().collect();

            backend.delete(&entity, &fields).await?;
            tracing::info!(table = entity.table(), key = entity.key(), fields = %fields, "purged fields");
        }
    }

    Ok(())
}
