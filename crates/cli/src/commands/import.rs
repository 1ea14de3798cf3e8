//! `import` command: the full ordered import from a source instance.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Args;
use temba_migrate_client::{ApiClient, ClientConfig};
use temba_migrate_core::{
    DEFAULT_CHANNEL_TYPE, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_MAX_RETRIES, MANUAL_GROUP_TYPE,
    env_parse_with_default,
};
use temba_migrate_importer::{ImportOptions, Orchestrator, RunReport};
use temba_migrate_storage::StorageBackend;

#[derive(Args)]
pub(crate) struct ImportArgs {
    /// Base URL of the source instance, e.g. `https://rapidpro.example.com`
    pub source_url: String,
    /// API token of a source workspace administrator
    pub api_key: String,
    /// Delete everything but the destination organization and admin first
    #[arg(long)]
    pub flush: bool,
    /// Minimum pause between source API requests, in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 0)]
    pub throttle: u64,
    #[arg(
        long,
        env = "DATABASE_URL",
        hide_env_values = true,
        required_unless_present = "dry_run"
    )]
    pub database_url: Option<String>,
    /// Channel type written for every channel
    #[arg(long, default_value = DEFAULT_CHANNEL_TYPE)]
    pub channel_type: String,
    /// Group type written for every group
    #[arg(long, default_value = MANUAL_GROUP_TYPE)]
    pub group_type: String,
    /// Import into a throwaway in-memory destination and print the counts
    #[arg(long)]
    pub dry_run: bool,
}

fn client_config(args: &ImportArgs) -> Result<ClientConfig> {
    let timeout: u64 =
        env_parse_with_default("TEMBA_MIGRATE_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS);
    let max_retries: u32 = env_parse_with_default("TEMBA_MIGRATE_MAX_RETRIES", DEFAULT_MAX_RETRIES);
    let config = ClientConfig::new(&args.source_url, &args.api_key)
        .with_throttle(Duration::from_millis(args.throttle))
        .with_timeout(Duration::from_secs(timeout))
        .with_max_retries(max_retries);

    if config.api_key.is_empty() {
        bail!("source API key is empty");
    }
    url::Url::parse(&config.base_url)
        .with_context(|| format!("invalid source URL `{}`", args.source_url))?;
    Ok(config)
}

fn print_report(report: &RunReport, dry_run: bool) -> Result<()> {
    if let Some(removed) = report.flushed {
        println!("flushed {removed} rows");
    }
    println!("{}", serde_json::to_string_pretty(&report.stats)?);
    if dry_run {
        println!("dry run: nothing was written to a database");
    }
    Ok(())
}

pub(crate) async fn run(args: ImportArgs) -> Result<ExitCode> {
    let config = client_config(&args)?;
    tracing::info!(source = %config.base_url, throttle_ms = args.throttle, "starting import");
    let client = ApiClient::new(config)?;

    let store = if args.dry_run {
        StorageBackend::new_memory()
    } else {
        let database_url = args.database_url.as_deref().context("DATABASE_URL is not set")?;
        StorageBackend::new_postgres(database_url)
            .await
            .context("failed to connect to the destination database")?
    };

    let options = ImportOptions {
        flush: args.flush,
        channel_type: args.channel_type,
        group_type: args.group_type,
    };
    let mut orchestrator = Orchestrator::new(client, store, options);
    match orchestrator.run().await {
        Ok(report) => {
            print_report(&report, args.dry_run)?;
            Ok(ExitCode::SUCCESS)
        },
        Err(failure) => {
            eprintln!("{failure}");
            Ok(ExitCode::FAILURE)
        },
    }
}
