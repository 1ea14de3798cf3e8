use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::import::ImportArgs;

#[derive(Parser)]
#[command(name = "temba-migrate", version)]
#[command(about = "Migrate a RapidPro/TextIt workspace into a fresh destination database", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import every entity from a source instance's API
    Import(ImportArgs),
    /// Point stored attachment URLs at a new host
    FixAttachmentPath {
        /// Host currently stored in attachment URLs
        old_host: String,
        /// Host to write instead
        new_host: String,
        #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
        database_url: String,
    },
    /// Load administrative boundaries from GeoJSON files
    ImportGeo {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
        database_url: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Import(args) => commands::import::run(args).await,
        Commands::FixAttachmentPath { old_host, new_host, database_url } => {
            commands::fixup::run_fix_attachment_path(&old_host, &new_host, &database_url).await?;
            Ok(ExitCode::SUCCESS)
        },
        Commands::ImportGeo { files, database_url } => {
            commands::fixup::run_import_geo(&files, &database_url).await?;
            Ok(ExitCode::SUCCESS)
        },
    }
}
