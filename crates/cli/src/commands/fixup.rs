//! Standalone commands that run against an already-populated destination.

use std::path::PathBuf;

use anyhow::{Context, Result};
use temba_migrate_importer::{import_geo_files, rewrite_attachment_hosts};
use temba_migrate_storage::StorageBackend;

async fn connect(database_url: &str) -> Result<StorageBackend> {
    StorageBackend::new_postgres(database_url)
        .await
        .context("failed to connect to the destination database")
}

pub(crate) async fn run_fix_attachment_path(
    old_host: &str,
    new_host: &str,
    database_url: &str,
) -> Result<()> {
    let store = connect(database_url).await?;
    let modified = rewrite_attachment_hosts(&store, old_host, new_host).await?;
    println!("{modified}");
    Ok(())
}

pub(crate) async fn run_import_geo(files: &[PathBuf], database_url: &str) -> Result<()> {
    let store = connect(database_url).await?;
    let written = import_geo_files(&store, files).await?;
    println!("{written}");
    Ok(())
}
